//! Pointer resolution: from a clip's pointer list to physical files.
//!
//! Each pointer token is resolved independently and in order. A token that
//! matches nothing is skipped and recorded; the call still succeeds.
//!
//! Exact artifacts are pointer-named, so candidate filenames are built from
//! the token and tried in a fixed order. Full-page artifacts are named after
//! the page scan, so the page number is matched as a substring of the
//! container's file names instead.

use std::path::PathBuf;

use crate::container::{is_plain_name, FileContainer};
use crate::error::ClipError;
use crate::models::{Category, Clip};
use crate::outcome::Outcome;

/// One pointer token matched to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub token: String,
    pub name: String,
    pub path: PathBuf,
}

/// Naming context for a source's artifacts.
#[derive(Debug, Clone)]
pub struct Resolver {
    source_name: String,
    strip_suffix: String,
}

impl Resolver {
    pub fn new(source_name: impl Into<String>, strip_suffix: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            strip_suffix: strip_suffix.into(),
        }
    }

    /// Resolve every pointer token of `clip` against `container`.
    pub async fn resolve(
        &self,
        clip: &Clip,
        category: Category,
        container: &dyn FileContainer,
    ) -> Result<Outcome<ResolvedFile>, ClipError> {
        let tokens = clip.pointer_tokens();
        tracing::debug!(
            source = %self.source_name,
            %category,
            pointers = ?tokens,
            "resolving pointers"
        );
        let outcome = match category {
            Category::Exact => self.resolve_exact(&tokens, container).await,
            Category::FullPage => self.resolve_fullpage(&tokens, container).await?,
        };
        tracing::info!(
            source = %self.source_name,
            %category,
            found = outcome.success_count(),
            skipped = outcome.skip_count(),
            "resolved pointers"
        );
        Ok(outcome)
    }

    /// Candidate filenames for one exact-mode token, in lookup order.
    pub fn exact_candidates(&self, token: &str) -> Vec<String> {
        let stripped = if self.strip_suffix.is_empty() {
            self.source_name.clone()
        } else {
            self.source_name.replacen(&self.strip_suffix, "", 1)
        };
        let mut candidates = Vec::with_capacity(3);
        for name in [
            format!("{}-{}.pdf", stripped, token),
            format!("{}.pdf", token),
            format!("{}-{}.pdf", self.source_name, token),
        ] {
            if !candidates.contains(&name) {
                candidates.push(name);
            }
        }
        candidates
    }

    async fn resolve_exact(
        &self,
        tokens: &[&str],
        container: &dyn FileContainer,
    ) -> Outcome<ResolvedFile> {
        let mut outcome = Outcome::new();
        for token in tokens {
            let candidates = self.exact_candidates(token);
            let mut found = None;
            for name in &candidates {
                if !is_plain_name(name) {
                    tracing::debug!(file = %name, "skipping candidate outside the folder");
                    continue;
                }
                tracing::debug!(file = %name, "checking candidate");
                if container.contains(name).await {
                    found = Some(name.clone());
                    break;
                }
            }
            match found {
                Some(name) => outcome.push(ResolvedFile {
                    token: token.to_string(),
                    path: container.locate(&name),
                    name,
                }),
                None => outcome.skip(
                    *token,
                    ClipError::UnresolvedPointer {
                        token: token.to_string(),
                        tried: candidates,
                    },
                ),
            }
        }
        outcome
    }

    async fn resolve_fullpage(
        &self,
        tokens: &[&str],
        container: &dyn FileContainer,
    ) -> Result<Outcome<ResolvedFile>, ClipError> {
        let documents: Vec<String> = container
            .names()
            .await?
            .into_iter()
            .filter(|n| n.to_ascii_lowercase().ends_with(".pdf"))
            .collect();

        let mut outcome = Outcome::new();
        for token in tokens {
            let page = page_number(token);
            let matched = if page.is_empty() {
                None
            } else {
                documents.iter().find(|name| name.contains(page))
            };
            match matched {
                Some(name) => outcome.push(ResolvedFile {
                    token: token.to_string(),
                    name: name.clone(),
                    path: container.locate(name),
                }),
                None => outcome.skip(
                    *token,
                    ClipError::UnresolvedPointer {
                        token: token.to_string(),
                        tried: vec![format!("*{}*.pdf in {}", page, container.label())],
                    },
                ),
            }
        }
        Ok(outcome)
    }
}

/// Page component of a full-page pointer: everything before the first `-`.
pub fn page_number(token: &str) -> &str {
    token.split('-').next().unwrap_or(token)
}

/// Raster scan filename for a page: `<domain>-<page padded to 3>.jpg`.
pub fn fullpage_image_name(domain: &str, page: &str) -> String {
    format!("{}-{:0>3}.jpg", domain, page.trim())
}
