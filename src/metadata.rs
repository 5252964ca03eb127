//! Metadata normalization.
//!
//! A source's `json/` folder holds any number of metadata documents, each in
//! one of three shapes. [`classify`] decides the shape up front and
//! [`normalize`] turns the document into an ordered list of [`Clip`]s:
//!
//! | Shape | Example | Clips |
//! |-------|---------|-------|
//! | [`Shape::Sequence`] | `[{...}, {...}]` | each element |
//! | [`Shape::Wrapped`] | `{"clips": [{...}]}` | each element of `clips` |
//! | [`Shape::IdentifierMap`] | `{"A1": {...}}` | one per key, id = key |

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ClipError;
use crate::models::Clip;
use crate::outcome::Outcome;

/// Shape of one parsed metadata document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Sequence,
    Wrapped,
    IdentifierMap,
}

/// Inspect a parsed document and report its shape. Checks run in priority
/// order; anything that is neither a sequence nor a `clips` wrapper is an
/// identifier map.
pub fn classify(doc: &Value) -> Shape {
    match doc {
        Value::Array(_) => Shape::Sequence,
        Value::Object(map) if matches!(map.get("clips"), Some(Value::Array(_))) => Shape::Wrapped,
        _ => Shape::IdentifierMap,
    }
}

/// Normalize one document into clips. `origin` labels skipped entries.
pub fn normalize(doc: &Value, origin: &str) -> Outcome<Clip> {
    let mut outcome = Outcome::new();
    match classify(doc) {
        Shape::Sequence => {
            if let Value::Array(items) = doc {
                collect_elements(items, origin, &mut outcome);
            }
        }
        Shape::Wrapped => {
            if let Some(Value::Array(items)) = doc.get("clips") {
                collect_elements(items, origin, &mut outcome);
            }
        }
        Shape::IdentifierMap => {
            if let Value::Object(map) = doc {
                collect_identifier_map(map, origin, &mut outcome);
            }
        }
    }
    outcome
}

fn collect_elements(items: &[Value], origin: &str, outcome: &mut Outcome<Clip>) {
    for (index, item) in items.iter().enumerate() {
        match item.as_object().and_then(Clip::from_object) {
            Some(clip) => outcome.push(clip),
            None => outcome.skip(
                format!("{}[{}]", origin, index),
                ClipError::MalformedMetadata {
                    file: PathBuf::from(origin),
                    reason: format!("entry {} is not a clip with pointers", index),
                },
            ),
        }
    }
}

fn collect_identifier_map(map: &Map<String, Value>, origin: &str, outcome: &mut Outcome<Clip>) {
    for (key, body) in map {
        let Value::Object(fields) = body else {
            tracing::debug!(origin, key = %key, "ignoring non-object metadata entry");
            continue;
        };
        let mut fields = fields.clone();
        fields.insert("id".to_string(), Value::String(key.clone()));
        let clip = Clip::from_object(&fields).or_else(|| {
            fields.insert("pointers".to_string(), Value::String(key.clone()));
            Clip::from_object(&fields)
        });
        match clip {
            Some(clip) => outcome.push(clip),
            None => outcome.skip(
                format!("{}:{}", origin, key),
                ClipError::MalformedMetadata {
                    file: PathBuf::from(origin),
                    reason: format!("entry '{}' has no usable pointers", key),
                },
            ),
        }
    }
}

/// Parse raw JSON text and normalize it. A parse failure costs the whole
/// document and is returned as [`ClipError::MalformedMetadata`].
pub fn parse_document(text: &str, file: &Path) -> Result<Outcome<Clip>, ClipError> {
    let doc: Value = serde_json::from_str(text).map_err(|e| ClipError::MalformedMetadata {
        file: file.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(normalize(&doc, &file.display().to_string()))
}

/// List `*.json` files directly inside `dir`, in directory enumeration order.
pub fn json_files(dir: &Path) -> Result<Vec<PathBuf>, ClipError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            ClipError::io(path, e.into())
        })?;
        if entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Load and concatenate the clips of every metadata file in `json_dir`.
///
/// A file that cannot be read or parsed is logged and contributes zero
/// clips; its siblings are still processed.
pub async fn load_metadata_dir(json_dir: &Path) -> Result<Outcome<Clip>, ClipError> {
    if !json_dir.is_dir() {
        return Err(missing_subfolder(json_dir));
    }
    let mut outcome = Outcome::new();
    for file in json_files(json_dir)? {
        let text = match tokio::fs::read_to_string(&file).await {
            Ok(text) => text,
            Err(e) => {
                outcome.skip(file.display().to_string(), ClipError::io(&file, e));
                continue;
            }
        };
        match parse_document(&text, &file) {
            Ok(clips) => {
                tracing::debug!(
                    file = %file.display(),
                    clips = clips.success_count(),
                    "parsed metadata file"
                );
                outcome.extend(clips);
            }
            Err(err) => outcome.skip(file.display().to_string(), err),
        }
    }
    Ok(outcome)
}

pub(crate) fn missing_subfolder(path: &Path) -> ClipError {
    ClipError::MissingSubfolder {
        parent: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        folder: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn classify_follows_priority_order() {
        assert_eq!(classify(&json!([])), Shape::Sequence);
        assert_eq!(classify(&json!({"clips": []})), Shape::Wrapped);
        // `clips` that is not a sequence falls through to the identifier map
        assert_eq!(classify(&json!({"clips": {"pointers": "x"}})), Shape::IdentifierMap);
        assert_eq!(classify(&json!({"A1": {}})), Shape::IdentifierMap);
    }

    #[test]
    fn sequence_elements_become_clips() {
        let doc = json!([
            {"title": "One", "pointers": "001-01"},
            {"title": "Two", "pointers": "002-01, 002-02"}
        ]);
        let outcome = normalize(&doc, "a.json");
        assert_eq!(outcome.success_count(), 2);
        assert_eq!(outcome.succeeded[1].pointer_tokens(), vec!["002-01", "002-02"]);
    }

    #[test]
    fn wrapped_sequence_skips_entries_without_pointers() {
        let doc = json!({"clips": [{"pointers": "p1"}, {"title": "no pointers"}, 7]});
        let outcome = normalize(&doc, "w.json");
        assert_eq!(outcome.success_count(), 1);
        assert_eq!(outcome.skip_count(), 2);
    }

    #[test]
    fn identifier_map_uses_keys() {
        let doc = json!({
            "k1": {"pointers": "p1"},
            "k2": {"title": "  ", "pointers": "p2"}
        });
        let outcome = normalize(&doc, "m.json");
        let clips = &outcome.succeeded;
        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].id.as_deref(), Some("k1"));
        assert_eq!(clips[1].id.as_deref(), Some("k2"));
        assert_eq!(clips[1].title, None);
        assert_eq!(clips[1].pointers, "p2");
    }

    #[test]
    fn identifier_map_defaults_pointers_to_key() {
        let doc = json!({"001-03": {"title": "Headline"}});
        let outcome = normalize(&doc, "m.json");
        assert_eq!(outcome.succeeded[0].pointers, "001-03");
        assert_eq!(outcome.succeeded[0].title.as_deref(), Some("Headline"));
    }

    #[test]
    fn key_overrides_body_id() {
        let doc = json!({"key": {"id": "other", "pointers": "p"}});
        let outcome = normalize(&doc, "m.json");
        assert_eq!(outcome.succeeded[0].id.as_deref(), Some("key"));
    }

    #[test]
    fn parse_error_is_malformed_metadata() {
        let err = parse_document("{not json", Path::new("bad.json")).unwrap_err();
        assert!(matches!(err, ClipError::MalformedMetadata { .. }));
    }

    #[tokio::test]
    async fn malformed_file_does_not_abort_siblings() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("json");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("good.json"), r#"[{"pointers": "001-01"}]"#).unwrap();
        fs::write(dir.join("bad.json"), "{ oops").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let outcome = load_metadata_dir(&dir).await.unwrap();
        assert_eq!(outcome.success_count(), 1);
        assert_eq!(outcome.skip_count(), 1);
        assert!(matches!(
            outcome.skipped[0].reason,
            ClipError::MalformedMetadata { .. }
        ));
    }

    #[tokio::test]
    async fn missing_json_dir_is_reported() {
        let tmp = TempDir::new().unwrap();
        let err = load_metadata_dir(&tmp.path().join("json")).await.unwrap_err();
        match err {
            ClipError::MissingSubfolder { folder, .. } => assert_eq!(folder, "json"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
