//! Error taxonomy for the browsing pipeline.
//!
//! Per-item failures (one metadata file, one pointer token, one merge input)
//! are recorded as [`ClipError`] values inside an
//! [`Outcome`](crate::outcome::Outcome) and logged where they happen. Only
//! whole-operation failures are returned as `Err` to the caller.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    /// The user backed out of choosing a folder. Not a failure.
    #[error("no directory selected")]
    SelectionAborted,

    #[error("no clip '{id}' in {source_name}")]
    UnknownClip { source_name: String, id: String },

    #[error("folder \"{folder}\" not found in {}", parent.display())]
    MissingSubfolder { parent: PathBuf, folder: String },

    #[error("malformed metadata in {}: {reason}", file.display())]
    MalformedMetadata { file: PathBuf, reason: String },

    #[error("no file found for pointer '{token}' (tried: {})", tried.join(", "))]
    UnresolvedPointer { token: String, tried: Vec<String> },

    #[error("skipped merge input {}: {reason}", input.display())]
    PartialMergeFailure { input: PathBuf, reason: String },

    #[error("failed to produce merged document: {0}")]
    TotalMergeFailure(String),

    #[error("failed to render page {page}: {reason}")]
    RenderFailure { page: String, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClipError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ClipError::Io {
            path: path.into(),
            source,
        }
    }
}
