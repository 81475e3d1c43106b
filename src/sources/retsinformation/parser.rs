use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use tl::NodeHandle;

use crate::error::ParseError;
use crate::types::{Statute, StatuteChapter, StatuteParagraph, StatuteSection, StructuredText};

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static ID_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"LBK\s+nr\s+(\d{1,10})\s+af\s+(\d{2})/(\d{2})/(\d{4})").unwrap());

/// Semantic role of one flat `<p>` element inside the document content,
/// as tagged by the publisher's class markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    ChapterStart,
    ParagraphStart,
    SectionStart,
    ListItem,
    EndOfContent,
}

fn classify_marker(classes: &HashSet<String>) -> Option<Marker> {
    if classes.contains("Kapitel") {
        return Some(Marker::ChapterStart);
    }
    if classes.contains("Paragraf") {
        return Some(Marker::ParagraphStart);
    }
    if classes.contains("Stk2") {
        return Some(Marker::SectionStart);
    }
    if classes.contains("Liste1") {
        return Some(Marker::ListItem);
    }
    if classes.contains("IkraftTekst") {
        return Some(Marker::EndOfContent);
    }

    None
}

/// Insertion-point state threaded through the flat walk. The source lists
/// chapters, paragraphs, subsections and list items as siblings; nesting is
/// reconstructed by tracking the most recently opened node at each level,
/// held as indices into the owned vectors.
#[derive(Debug)]
struct WalkState {
    chapters: Vec<StatuteChapter>,
    chapter: Option<usize>,
    paragraph: Option<usize>,
    section: Option<usize>,
}

impl WalkState {
    fn new() -> Self {
        Self {
            chapters: Vec::new(),
            chapter: None,
            paragraph: None,
            section: None,
        }
    }

    fn open_chapter(&mut self, chapter: StatuteChapter) {
        self.chapter = Some(self.chapters.len());
        self.chapters.push(chapter);
        self.paragraph = None;
        self.section = None;
    }

    fn open_paragraph(&mut self, paragraph: StatuteParagraph) {
        let Some(chapter) = self.chapter.and_then(|i| self.chapters.get_mut(i)) else {
            return;
        };
        self.paragraph = Some(chapter.paragraphs.len());
        chapter.paragraphs.push(paragraph);
        self.section = None;
    }

    fn open_section(&mut self, section: StatuteSection) {
        let Some(paragraph) = self.paragraph_mut() else {
            return;
        };
        let index = paragraph.sections.len();
        paragraph.sections.push(section);
        self.section = Some(index);
    }

    /// Appends a text block to the deepest open container: the current
    /// section if one is open, otherwise the current paragraph.
    fn append_text(&mut self, block: StructuredText) {
        let section = self.section;
        let Some(paragraph) = self.paragraph_mut() else {
            return;
        };
        match section.and_then(|i| paragraph.sections.get_mut(i)) {
            Some(section) => section.texts.push(block),
            None => paragraph.texts.push(block),
        }
    }

    fn paragraph_mut(&mut self) -> Option<&mut StatuteParagraph> {
        let chapter = self.chapter.and_then(|i| self.chapters.get_mut(i))?;
        self.paragraph.and_then(|i| chapter.paragraphs.get_mut(i))
    }
}

/// Parses a statutory order from an HTML file fetched from Retsinformation.
///
/// Pre-checks that the file exists before touching the walk, then reads it
/// once and hands the text to [`parse_statute_html`].
pub fn parse_statute_file(path: &Path) -> Result<Statute, ParseError> {
    if !path.exists() {
        return Err(ParseError::InputNotFound(path.to_path_buf()));
    }
    let html = std::fs::read_to_string(path)?;
    parse_statute_html(&html)
}

/// Parses a statutory order from Retsinformation HTML text.
pub fn parse_statute_html(html: &str) -> Result<Statute, ParseError> {
    let dom = tl::parse(html, tl::ParserOptions::default())
        .map_err(|e| ParseError::Html(e.to_string()))?;
    let parser = dom.parser();

    let (number, date) = extract_id_and_date(&dom)?;
    let content = content_paragraphs(&dom)?;
    let title = extract_title(parser, &content)?;
    let chapters = parse_chapters(parser, &content)?;

    tracing::debug!(
        number,
        chapters = chapters.len(),
        "parsed statutory order document"
    );

    Ok(Statute {
        number,
        date,
        title,
        chapters,
    })
}

/// Reads the statute's order number and publication date from the
/// identification heading, e.g. `"LBK nr 1180 af 21/09/2023"`.
fn extract_id_and_date(dom: &tl::VDom) -> Result<(u32, NaiveDate), ParseError> {
    let parser = dom.parser();
    for node in dom.nodes() {
        let Some(tag) = node.as_tag() else {
            continue;
        };
        if tag.name().as_utf8_str().as_ref() != "h5" {
            continue;
        }
        let classes = class_set(tag);
        if !classes.contains("d-sm-inline") || !classes.contains("m-0") || !classes.contains("mr-sm-2")
        {
            continue;
        }

        let text = visible_text(parser, tag);
        let caps = ID_DATE_RE
            .captures(&text)
            .ok_or(ParseError::MalformedField("id_and_date"))?;
        let number = caps[1]
            .parse::<u32>()
            .map_err(|_| ParseError::MalformedField("id_and_date"))?;
        let day: u32 = caps[2]
            .parse()
            .map_err(|_| ParseError::MalformedField("id_and_date"))?;
        let month: u32 = caps[3]
            .parse()
            .map_err(|_| ParseError::MalformedField("id_and_date"))?;
        let year: i32 = caps[4]
            .parse()
            .map_err(|_| ParseError::MalformedField("id_and_date"))?;
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or(ParseError::MalformedField("id_and_date"))?;
        return Ok((number, date));
    }

    Err(ParseError::MissingField("id_and_date"))
}

/// Collects every `<p>` descendant of `div.document-content` in document
/// order. These are the flat elements the main walk reduces over.
fn content_paragraphs(dom: &tl::VDom) -> Result<Vec<NodeHandle>, ParseError> {
    let parser = dom.parser();
    for (index, node) in dom.nodes().iter().enumerate() {
        let Some(tag) = node.as_tag() else {
            continue;
        };
        if tag.name().as_utf8_str().as_ref() != "div" {
            continue;
        }
        if !class_set(tag).contains("document-content") {
            continue;
        }

        let mut handles = Vec::new();
        collect_paragraph_handles(parser, NodeHandle::new(index as u32), &mut handles);
        return Ok(handles);
    }

    Err(ParseError::MissingField("document content"))
}

fn collect_paragraph_handles(parser: &tl::Parser, handle: NodeHandle, out: &mut Vec<NodeHandle>) {
    let Some(tag) = tag_at(parser, handle) else {
        return;
    };
    if tag.name().as_utf8_str().as_ref() == "p" {
        out.push(handle);
    }
    for child in tag.children().top().iter() {
        collect_paragraph_handles(parser, *child, out);
    }
}

fn extract_title(parser: &tl::Parser, content: &[NodeHandle]) -> Result<String, ParseError> {
    for handle in content {
        let Some(tag) = tag_at(parser, *handle) else {
            continue;
        };
        if class_set(tag).contains("Titel2") {
            return Ok(own_text(parser, tag));
        }
    }

    Err(ParseError::MissingField("title"))
}

/// The main walk: a single linear reduction over the flat `<p>` sequence,
/// dispatching on each element's semantic marker. Elements after the first
/// end-of-content marker are never visited.
fn parse_chapters(
    parser: &tl::Parser,
    content: &[NodeHandle],
) -> Result<Vec<StatuteChapter>, ParseError> {
    let mut state = WalkState::new();

    for (index, handle) in content.iter().enumerate() {
        let Some(tag) = tag_at(parser, *handle) else {
            continue;
        };
        let Some(marker) = classify_marker(&class_set(tag)) else {
            continue;
        };

        match marker {
            Marker::ChapterStart => {
                let chapter = parse_chapter(parser, tag, &content[index + 1..])?;
                state.open_chapter(chapter);
            }
            Marker::ParagraphStart => {
                if state.chapter.is_none() {
                    return Err(ParseError::Structural("paragraph outside chapter"));
                }
                let paragraph = parse_paragraph(parser, tag)?;
                state.open_paragraph(paragraph);
            }
            Marker::SectionStart => {
                if state.paragraph.is_none() {
                    return Err(ParseError::Structural("section outside paragraph"));
                }
                let section = parse_section(parser, tag)?;
                state.open_section(section);
            }
            Marker::ListItem => {
                if state.paragraph.is_none() {
                    return Err(ParseError::Structural("list outside paragraph"));
                }
                let block = parse_list_block(parser, tag)?;
                state.append_text(block);
            }
            Marker::EndOfContent => break,
        }
    }

    Ok(state.chapters)
}

/// Parses a chapter-start element. The chapter number lives in a nested
/// `<span>` whose id carries a `Kap` prefix; the title lives in the next
/// `p.KapitelOverskrift2` element in document order.
fn parse_chapter(
    parser: &tl::Parser,
    tag: &tl::HTMLTag,
    following: &[NodeHandle],
) -> Result<StatuteChapter, ParseError> {
    let guid = id_attr(tag).ok_or(ParseError::MissingField("chapter guid"))?;
    let marker = find_span_with_id_prefix(parser, tag, "Kap")
        .ok_or(ParseError::MissingField("chapter number"))?;
    let marker_id = id_attr(marker).ok_or(ParseError::MissingField("chapter number"))?;
    let digits = marker_id
        .strip_prefix("Kap")
        .ok_or(ParseError::MissingField("chapter number"))?;
    let number = digits
        .parse::<u32>()
        .map_err(|_| ParseError::MalformedField("chapter number"))?;
    let title = chapter_title(parser, following)?;

    Ok(StatuteChapter {
        number,
        title,
        guid,
        paragraphs: Vec::new(),
    })
}

fn chapter_title(parser: &tl::Parser, following: &[NodeHandle]) -> Result<String, ParseError> {
    for handle in following {
        let Some(tag) = tag_at(parser, *handle) else {
            continue;
        };
        if !class_set(tag).contains("KapitelOverskrift2") {
            continue;
        }
        let span = find_first_span(parser, tag).ok_or(ParseError::MissingField("chapter title"))?;
        return Ok(own_text(parser, span));
    }

    Err(ParseError::MissingField("chapter title"))
}

/// Parses a paragraph-start element. The `span.ParagrafNr` marker carries
/// the stable paragraph id and the visible citation; the element's own text
/// (marker excluded) becomes the paragraph's introductory plain block.
fn parse_paragraph(parser: &tl::Parser, tag: &tl::HTMLTag) -> Result<StatuteParagraph, ParseError> {
    let guid = id_attr(tag).ok_or(ParseError::MissingField("paragraph guid"))?;
    let span = find_span_with_class(parser, tag, "ParagrafNr")
        .ok_or(ParseError::MissingField("paragraph number"))?;
    let id = id_attr(span).ok_or(ParseError::MissingField("paragraph id"))?;
    let reference = visible_text(parser, span).trim_end_matches('.').to_string();
    let text = own_text(parser, tag);

    Ok(StatuteParagraph {
        guid,
        id,
        reference,
        texts: vec![StructuredText::plain(text)],
        sections: Vec::new(),
    })
}

/// Parses a subsection-start element ("Stk."). The citation drops the
/// marker's single trailing character (conventionally a period after the
/// subsection number).
fn parse_section(parser: &tl::Parser, tag: &tl::HTMLTag) -> Result<StatuteSection, ParseError> {
    let span = find_span_with_class(parser, tag, "StkNr")
        .ok_or(ParseError::MissingField("section number"))?;
    let guid = id_attr(span).ok_or(ParseError::MissingField("section guid"))?;
    let reference = strip_last_char(&visible_text(parser, span));
    let text = own_text(parser, tag);

    Ok(StatuteSection {
        guid,
        reference,
        texts: vec![StructuredText::plain(text)],
    })
}

fn parse_list_block(parser: &tl::Parser, tag: &tl::HTMLTag) -> Result<StructuredText, ParseError> {
    let span = find_span_with_class(parser, tag, "Liste1Nr")
        .ok_or(ParseError::MissingField("list number"))?;
    let guid = id_attr(span).ok_or(ParseError::MissingField("list guid"))?;
    let reference = visible_text(parser, span);
    let text = own_text(parser, tag);

    Ok(StructuredText::list(text, Some(guid), Some(reference))?)
}

fn tag_at<'p, 'a>(parser: &'p tl::Parser<'a>, handle: NodeHandle) -> Option<&'p tl::HTMLTag<'a>> {
    handle.get(parser)?.as_tag()
}

fn class_set(tag: &tl::HTMLTag) -> HashSet<String> {
    tag.attributes()
        .class()
        .map(|c| c.as_utf8_str())
        .unwrap_or_default()
        .split_whitespace()
        .map(ToString::to_string)
        .collect()
}

fn id_attr(tag: &tl::HTMLTag) -> Option<String> {
    tag.attributes().id().map(|id| id.as_utf8_str().to_string())
}

fn find_span_with_class<'p, 'a>(
    parser: &'p tl::Parser<'a>,
    root: &'p tl::HTMLTag<'a>,
    class: &str,
) -> Option<&'p tl::HTMLTag<'a>> {
    for child in root.children().top().iter() {
        let Some(tag) = tag_at(parser, *child) else {
            continue;
        };
        if tag.name().as_utf8_str().as_ref() == "span" && class_set(tag).contains(class) {
            return Some(tag);
        }
        if let Some(found) = find_span_with_class(parser, tag, class) {
            return Some(found);
        }
    }
    None
}

fn find_span_with_id_prefix<'p, 'a>(
    parser: &'p tl::Parser<'a>,
    root: &'p tl::HTMLTag<'a>,
    prefix: &str,
) -> Option<&'p tl::HTMLTag<'a>> {
    for child in root.children().top().iter() {
        let Some(tag) = tag_at(parser, *child) else {
            continue;
        };
        if tag.name().as_utf8_str().as_ref() == "span"
            && id_attr(tag).is_some_and(|id| id.starts_with(prefix))
        {
            return Some(tag);
        }
        if let Some(found) = find_span_with_id_prefix(parser, tag, prefix) {
            return Some(found);
        }
    }
    None
}

fn find_first_span<'p, 'a>(
    parser: &'p tl::Parser<'a>,
    root: &'p tl::HTMLTag<'a>,
) -> Option<&'p tl::HTMLTag<'a>> {
    for child in root.children().top().iter() {
        let Some(tag) = tag_at(parser, *child) else {
            continue;
        };
        if tag.name().as_utf8_str().as_ref() == "span" {
            return Some(tag);
        }
        if let Some(found) = find_first_span(parser, tag) {
            return Some(found);
        }
    }
    None
}

/// Cleaned text of the element's own text nodes. Descendant tags (marker
/// spans, inline styling) contribute nothing, so extracted text never
/// contains embedded markup.
fn own_text(parser: &tl::Parser, tag: &tl::HTMLTag) -> String {
    let mut out = String::new();
    for child in tag.children().top().iter() {
        let Some(node) = child.get(parser) else {
            continue;
        };
        if let Some(raw) = node.as_raw() {
            out.push_str(raw.as_utf8_str().as_ref());
        }
    }
    normalize_text(&out)
}

/// Cleaned text of the element including descendants.
fn visible_text(parser: &tl::Parser, tag: &tl::HTMLTag) -> String {
    normalize_text(&tag.inner_text(parser))
}

/// Decodes non-breaking spaces and collapses whitespace runs to single
/// spaces, trimming both ends. Idempotent.
pub fn normalize_text(input: &str) -> String {
    let decoded = input.replace("&nbsp;", " ").replace('\u{00A0}', " ");
    WHITESPACE_RE
        .replace_all(decoded.trim(), " ")
        .trim()
        .to_string()
}

fn strip_last_char(value: &str) -> String {
    let mut chars = value.chars();
    chars.next_back();
    chars.as_str().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_collapses_runs() {
        assert_eq!(
            normalize_text("  Ret til\n   barselsdagpenge\t m.v.  "),
            "Ret til barselsdagpenge m.v."
        );
        assert_eq!(normalize_text("a&nbsp;b"), "a b");
        assert_eq!(normalize_text("a\u{00A0}b"), "a b");
    }

    #[test]
    fn test_normalize_text_is_idempotent() {
        let once = normalize_text("  Stk.   2.\nHerefter ");
        assert_eq!(normalize_text(&once), once);
    }

    #[test]
    fn test_strip_last_char() {
        assert_eq!(strip_last_char("Stk. 2."), "Stk. 2");
        assert_eq!(strip_last_char("§"), "");
        assert_eq!(strip_last_char(""), "");
    }

    #[test]
    fn test_classify_marker() {
        let classes = |c: &str| -> HashSet<String> {
            c.split_whitespace().map(ToString::to_string).collect()
        };
        assert_eq!(
            classify_marker(&classes("Kapitel")),
            Some(Marker::ChapterStart)
        );
        assert_eq!(
            classify_marker(&classes("Paragraf")),
            Some(Marker::ParagraphStart)
        );
        assert_eq!(classify_marker(&classes("Stk2")), Some(Marker::SectionStart));
        assert_eq!(classify_marker(&classes("Liste1")), Some(Marker::ListItem));
        assert_eq!(
            classify_marker(&classes("IkraftTekst")),
            Some(Marker::EndOfContent)
        );
        assert_eq!(classify_marker(&classes("KapitelOverskrift2")), None);
        assert_eq!(classify_marker(&classes("Titel2")), None);
    }
}
