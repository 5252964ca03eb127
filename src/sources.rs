use anyhow::Result;

use crate::config::LibraryConfig;
use crate::library::Library;

/// One row of the `clips sources` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatus {
    pub name: String,
    pub clips: usize,
    pub json: bool,
    pub exact: bool,
    pub fullpage: bool,
    pub error: Option<String>,
}

pub fn source_statuses(library: &Library, config: &LibraryConfig) -> Vec<SourceStatus> {
    library
        .sources
        .iter()
        .zip(&library.reports)
        .map(|(source, report)| {
            let dir = library.source_dir(&source.name);
            SourceStatus {
                name: source.name.clone(),
                clips: source.clips.len(),
                json: dir.join(&config.json_dir).is_dir(),
                exact: dir.join(&config.exact_dir).is_dir(),
                fullpage: dir.join(&config.fullpage_dir).is_dir(),
                error: report.error.clone(),
            }
        })
        .collect()
}

pub fn list_sources(library: &Library, config: &LibraryConfig) -> Result<()> {
    let mark = |present: bool| if present { "yes" } else { "-" };

    println!(
        "{:<32} {:>6} {:<6} {:<6} {:<9} ERROR",
        "SOURCE", "CLIPS", "JSON", "CLIPS", "FULLPAGES"
    );
    for status in source_statuses(library, config) {
        println!(
            "{:<32} {:>6} {:<6} {:<6} {:<9} {}",
            status.name,
            status.clips,
            mark(status.json),
            mark(status.exact),
            mark(status.fullpage),
            status.error.as_deref().unwrap_or("-")
        );
    }
    println!(
        "\n{} sources, {} clips",
        library.sources.len(),
        library.clip_count()
    );

    Ok(())
}
