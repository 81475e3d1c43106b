use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    Plain,
    List,
}

/// A block of statute text, either free-running prose or a numbered
/// list clause.
///
/// List blocks always carry the publisher's node guid and the visible
/// list number (e.g. `"1)"`); construction and deserialization both
/// reject a list block missing either one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StructuredTextWire")]
pub struct StructuredText {
    #[serde(rename = "type")]
    pub kind: TextKind,
    pub text: String,
    pub guid: Option<String>,
    pub reference: Option<String>,
}

impl StructuredText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: TextKind::Plain,
            text: text.into(),
            guid: None,
            reference: None,
        }
    }

    pub fn list(
        text: impl Into<String>,
        guid: Option<String>,
        reference: Option<String>,
    ) -> Result<Self, ModelError> {
        let (Some(guid), Some(reference)) = (guid, reference) else {
            return Err(ModelError::InvalidStructuredText);
        };
        Ok(Self {
            kind: TextKind::List,
            text: text.into(),
            guid: Some(guid),
            reference: Some(reference),
        })
    }
}

#[derive(Deserialize)]
struct StructuredTextWire {
    #[serde(rename = "type")]
    kind: TextKind,
    text: String,
    #[serde(default)]
    guid: Option<String>,
    #[serde(default)]
    reference: Option<String>,
}

impl TryFrom<StructuredTextWire> for StructuredText {
    type Error = ModelError;

    fn try_from(wire: StructuredTextWire) -> Result<Self, Self::Error> {
        if wire.kind == TextKind::List && (wire.guid.is_none() || wire.reference.is_none()) {
            return Err(ModelError::InvalidStructuredText);
        }
        Ok(Self {
            kind: wire.kind,
            text: wire.text,
            guid: wire.guid,
            reference: wire.reference,
        })
    }
}

/// A subsection ("Stk.") within a paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatuteSection {
    pub guid: String,
    /// Human-readable citation, e.g. `"Stk. 2"`.
    pub reference: String,
    #[serde(default)]
    pub texts: Vec<StructuredText>,
}

/// A numbered legal provision ("§"), the main addressable unit of a statute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatuteParagraph {
    pub guid: String,
    /// The publisher's stable paragraph identifier (e.g. `"Par5"`), distinct
    /// from the guid. Expected to be unique within a statute; downstream
    /// consumers key lookups off it. The parser extracts it verbatim and
    /// does not verify uniqueness.
    pub id: String,
    /// Human-readable citation, e.g. `"§ 5"`.
    pub reference: String,
    #[serde(default)]
    pub texts: Vec<StructuredText>,
    #[serde(default)]
    pub sections: Vec<StatuteSection>,
}

/// A numbered, titled grouping of paragraphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatuteChapter {
    pub number: u32,
    pub title: String,
    pub guid: String,
    #[serde(default)]
    pub paragraphs: Vec<StatuteParagraph>,
}

/// The root of a parsed statutory order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statute {
    pub number: u32,
    pub date: NaiveDate,
    pub title: String,
    #[serde(default)]
    pub chapters: Vec<StatuteChapter>,
}

impl Statute {
    /// Loads a previously serialized statute from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Ground-truth record for one paragraph, as stored in the reference
/// fixture files consumed by the test suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParagraphRef {
    pub guid: String,
    pub id: String,
    #[serde(rename = "ref")]
    pub reference: String,
}

/// Loads an ordered list of [`ParagraphRef`] records from a JSON fixture.
pub fn load_paragraph_refs(path: &Path) -> Result<Vec<ParagraphRef>, ModelError> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
