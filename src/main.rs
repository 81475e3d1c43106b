use retsinfo_ingest::sources::retsinformation::parser::parse_statute_file;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let Some(input) = args.next() else {
        eprintln!("Usage: parse_statute <input.html> [output.json]");
        return ExitCode::FAILURE;
    };
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(&input).with_extension("json"));

    match run(Path::new(&input), &output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("parse failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("parsing {}", input.display());
    let statute = parse_statute_file(input)?;
    tracing::info!(
        chapters = statute.chapters.len(),
        "parsed statutory order {} of {}",
        statute.number,
        statute.date
    );

    let json = serde_json::to_string_pretty(&statute)?;
    std::fs::write(output, json)?;
    tracing::info!("wrote {}", output.display());
    Ok(())
}
