//! # Clip Harness
//!
//! Browse a library of scanned-newspaper clippings.
//!
//! A library root holds one folder per source. Each source carries JSON
//! metadata describing its clips, and two artifact folders: per-article
//! PDFs (`clips/`) and full-page scans (`fullpages/`). Clip Harness turns a
//! clip's pointer list into files, merges them into one document, and
//! draws annotated crop regions over page scans.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌──────────┐
//! │ metadata │──▶│ resolver │──▶│ assemble  │──▶│ handles  │
//! │ JSON→Clip│   │ ptr→file │   │ PDF merge │   │ blob:... │
//! └──────────┘   └──────────┘   └───────────┘   └────┬─────┘
//!                                                    │
//!      ┌──────────────────┐                    ┌─────┴─────┐
//!      │ overlay          │                    │ session   │
//!      │ areas→PNG pages  │                    │ (Browser) │
//!      └──────────────────┘                    └───────────┘
//! ```
//!
//! Per-item failures (a bad metadata file, a pointer with no file, a
//! corrupt PDF) are skipped and recorded in an [`outcome::Outcome`]; the
//! operation keeps going.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`outcome`] | Success/skip accumulator |
//! | [`models`] | Core data types |
//! | [`metadata`] | JSON shape detection and normalization |
//! | [`library`] | Source discovery and loading |
//! | [`sources`] | Source status table |
//! | [`container`] | File container abstraction |
//! | [`resolver`] | Pointer to file resolution |
//! | [`assemble`] | Best-effort PDF merge |
//! | [`handles`] | Scoped document handles |
//! | [`session`] | Sessions and stale-result suppression |
//! | [`overlay`] | Crop-area overlay rendering and viewer |
//! | [`logging`] | Tracing subscriber setup |

pub mod assemble;
pub mod config;
pub mod container;
pub mod error;
pub mod handles;
pub mod library;
pub mod logging;
pub mod metadata;
pub mod models;
pub mod outcome;
pub mod overlay;
pub mod resolver;
pub mod session;
pub mod sources;
