//! Library scanning: discover sources under a root and load their clips.
//!
//! Layout:
//!
//! ```text
//! <root>/<source>/json/*.json       metadata
//! <root>/<source>/clips/*.pdf       exact per-pointer artifacts
//! <root>/<source>/fullpages/*       full-page scans (pdf, jpg)
//! ```
//!
//! Every source's metadata loads as its own task; one source failing never
//! affects another.

use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use walkdir::WalkDir;

use crate::config::LibraryConfig;
use crate::error::ClipError;
use crate::metadata::load_metadata_dir;
use crate::models::{Clip, Source};

/// All sources found under one root, with their clips loaded.
#[derive(Debug, Clone)]
pub struct Library {
    pub root: PathBuf,
    pub sources: Vec<Source>,
    pub reports: Vec<SourceReport>,
}

/// How loading one source's metadata went.
#[derive(Debug, Clone, Default)]
pub struct SourceReport {
    pub name: String,
    pub clips: usize,
    /// Metadata files or entries that were skipped.
    pub skipped: usize,
    /// Set when the whole source could not be loaded (e.g. no `json` folder).
    pub error: Option<String>,
}

impl Library {
    pub fn source(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn clip_count(&self) -> usize {
        self.sources.iter().map(|s| s.clips.len()).sum()
    }

    pub fn source_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

/// List the sources under `root`: every immediate subdirectory, in
/// directory enumeration order.
pub fn scan_sources(root: &Path) -> Result<Vec<Source>, ClipError> {
    if !root.is_dir() {
        return Err(ClipError::io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "library root is not a directory"),
        ));
    }
    let mut sources = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            ClipError::io(path, e.into())
        })?;
        if entry.file_type().is_dir() {
            sources.push(Source::new(entry.file_name().to_string_lossy()));
        }
    }
    tracing::info!(root = %root.display(), sources = sources.len(), "scanned library root");
    Ok(sources)
}

/// Scan `root` and load every source's clips concurrently.
pub async fn load_library(root: &Path, config: &LibraryConfig) -> Result<Library, ClipError> {
    let mut sources = scan_sources(root)?;

    let mut tasks = JoinSet::new();
    for (index, source) in sources.iter().enumerate() {
        let json_dir = root.join(&source.name).join(&config.json_dir);
        tasks.spawn(async move { (index, load_metadata_dir(&json_dir).await) });
    }

    let mut reports: Vec<SourceReport> = sources
        .iter()
        .map(|s| SourceReport {
            name: s.name.clone(),
            ..SourceReport::default()
        })
        .collect();

    while let Some(joined) = tasks.join_next().await {
        let (index, result) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!("metadata task failed: {}", e);
                continue;
            }
        };
        let report = &mut reports[index];
        match result {
            Ok(outcome) => {
                report.clips = outcome.success_count();
                report.skipped = outcome.skip_count();
                sources[index].clips = outcome.succeeded;
            }
            Err(err) => {
                tracing::warn!(source = %report.name, "{}", err);
                report.error = Some(err.to_string());
            }
        }
    }

    Ok(Library {
        root: root.to_path_buf(),
        sources,
        reports,
    })
}

/// Find a clip by id, or by its 1-based position in the source.
pub fn find_clip<'a>(source: &'a Source, key: &str) -> Option<&'a Clip> {
    source.clip(key).or_else(|| {
        key.trim_start_matches('#')
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .and_then(|n| source.clips.get(n - 1))
    })
}

/// Clips whose title or id contains `term`, case-insensitively, with their
/// 0-based positions. An empty term keeps everything.
pub fn filter_clips<'a>(clips: &'a [Clip], term: &str) -> Vec<(usize, &'a Clip)> {
    let needle = term.trim().to_lowercase();
    clips
        .iter()
        .enumerate()
        .filter(|(_, clip)| {
            needle.is_empty()
                || [clip.title.as_deref(), clip.id.as_deref()]
                    .into_iter()
                    .flatten()
                    .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}
