//! Document assembly: merge resolved PDFs into one document.
//!
//! Assembly is best-effort. With zero inputs there is no document; with one
//! input its bytes are handed back untouched; with more, every input that
//! can be read and parsed contributes all of its pages, in input order, and
//! the rest are skipped and recorded. Only a failure to serialize the
//! merged document fails the call.

use lopdf::{dictionary, Document, Object, ObjectId};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ClipError;
use crate::outcome::Outcome;
use crate::resolver::ResolvedFile;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Bounds the walk up a (possibly cyclic) page tree.
const MAX_TREE_DEPTH: usize = 64;

/// One input document's bytes and where they came from.
#[derive(Debug, Clone)]
pub struct AssemblyInput {
    pub origin: PathBuf,
    pub bytes: Arc<[u8]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyKind {
    /// No inputs; the caller shows nothing.
    Nothing,
    /// Exactly one input, returned as-is.
    Passthrough,
    /// Two or more inputs merged page by page.
    Merged,
}

#[derive(Debug)]
pub struct Assembly {
    pub kind: AssemblyKind,
    pub bytes: Option<Arc<[u8]>>,
    /// Page count of a merged document. Passthrough documents are not parsed.
    pub page_count: Option<usize>,
    /// Inputs that made it into the output, and those that were skipped.
    pub inputs: Outcome<PathBuf>,
}

impl Assembly {
    fn nothing(inputs: Outcome<PathBuf>) -> Self {
        Self {
            kind: AssemblyKind::Nothing,
            bytes: None,
            page_count: None,
            inputs,
        }
    }
}

/// Read the resolved files and assemble them.
pub async fn assemble(files: &[ResolvedFile], pdf_version: &str) -> Result<Assembly, ClipError> {
    let mut inputs = Outcome::new();
    let mut loaded = Vec::with_capacity(files.len());
    for file in files {
        match tokio::fs::read(&file.path).await {
            Ok(bytes) => loaded.push(AssemblyInput {
                origin: file.path.clone(),
                bytes: bytes.into(),
            }),
            Err(e) => inputs.skip(
                file.path.display().to_string(),
                ClipError::PartialMergeFailure {
                    input: file.path.clone(),
                    reason: e.to_string(),
                },
            ),
        }
    }

    if files.len() <= 1 {
        return Ok(match loaded.pop() {
            Some(input) => passthrough(input, inputs),
            None => Assembly::nothing(inputs),
        });
    }

    let version = pdf_version.to_string();
    tokio::task::spawn_blocking(move || merge_inputs(loaded, &version, inputs))
        .await
        .map_err(|e| ClipError::TotalMergeFailure(e.to_string()))?
}

/// Assemble already-loaded inputs.
pub fn assemble_inputs(
    mut inputs: Vec<AssemblyInput>,
    pdf_version: &str,
) -> Result<Assembly, ClipError> {
    match inputs.len() {
        0 => Ok(Assembly::nothing(Outcome::new())),
        1 => Ok(passthrough(inputs.remove(0), Outcome::new())),
        _ => merge_inputs(inputs, pdf_version, Outcome::new()),
    }
}

fn passthrough(input: AssemblyInput, mut record: Outcome<PathBuf>) -> Assembly {
    record.push(input.origin);
    Assembly {
        kind: AssemblyKind::Passthrough,
        bytes: Some(input.bytes),
        page_count: None,
        inputs: record,
    }
}

fn merge_inputs(
    inputs: Vec<AssemblyInput>,
    pdf_version: &str,
    mut record: Outcome<PathBuf>,
) -> Result<Assembly, ClipError> {
    let total = inputs.len();
    let mut merger = Merger::new(pdf_version);
    for (i, input) in inputs.into_iter().enumerate() {
        match merger.append(&input.bytes) {
            Ok(pages) => {
                tracing::debug!(
                    input = %input.origin.display(),
                    pages,
                    "merged input {}/{}",
                    i + 1,
                    total
                );
                record.push(input.origin);
            }
            Err(e) => record.skip(
                input.origin.display().to_string(),
                ClipError::PartialMergeFailure {
                    input: input.origin.clone(),
                    reason: e.to_string(),
                },
            ),
        }
    }
    let page_count = merger.page_count();
    let bytes = merger.finish()?;
    tracing::info!(
        pages = page_count,
        merged = record.success_count(),
        skipped = record.skip_count(),
        "assembled document"
    );
    Ok(Assembly {
        kind: AssemblyKind::Merged,
        bytes: Some(bytes.into()),
        page_count: Some(page_count),
        inputs: record,
    })
}

/// Builds one PDF out of the pages of several others.
pub struct Merger {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl Merger {
    pub fn new(pdf_version: &str) -> Self {
        let mut doc = Document::with_version(pdf_version);
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Parse `bytes` and append all of its pages. Returns the number of
    /// pages added. On error nothing is added.
    pub fn append(&mut self, bytes: &[u8]) -> Result<usize, lopdf::Error> {
        let src = Document::load_mem(bytes)?;
        Ok(self.append_document(src))
    }

    /// Append every page of `src`, in its own page order.
    pub fn append_document(&mut self, mut src: Document) -> usize {
        let original_pages: Vec<ObjectId> = src.get_pages().into_values().collect();
        for &page_id in &original_pages {
            inherit_attributes(&mut src, page_id);
        }

        src.renumber_objects_with(self.doc.max_id + 1);
        let page_ids: Vec<ObjectId> = src.get_pages().into_values().collect();
        let src_max = src
            .objects
            .keys()
            .map(|(id, _)| *id)
            .max()
            .unwrap_or(src.max_id);

        for (id, object) in src.objects {
            if is_type(&object, b"Catalog") || is_type(&object, b"Pages") {
                continue;
            }
            self.doc.objects.insert(id, object);
        }
        self.doc.max_id = self.doc.max_id.max(src_max);

        for &page_id in &page_ids {
            if let Ok(page) = self
                .doc
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
            {
                page.set("Parent", Object::Reference(self.pages_id));
            }
            self.kids.push(Object::Reference(page_id));
        }
        page_ids.len()
    }

    /// Write the page tree and catalog, then serialize.
    pub fn finish(mut self) -> Result<Vec<u8>, ClipError> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| ClipError::TotalMergeFailure(e.to_string()))?;
        Ok(out)
    }
}

fn is_type(object: &Object, type_name: &[u8]) -> bool {
    object
        .as_dict()
        .ok()
        .and_then(|d| d.get(b"Type").ok())
        .and_then(|t| t.as_name().ok())
        .is_some_and(|name| name == type_name)
}

/// Copy attributes the page inherits from its ancestors onto the page
/// itself, so it keeps them once re-parented under a new page tree.
fn inherit_attributes(doc: &mut Document, page_id: ObjectId) {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return;
    };
    let mut missing: Vec<&[u8]> = INHERITABLE
        .iter()
        .copied()
        .filter(|key| !page.has(key))
        .collect();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    let mut inherited: Vec<(&[u8], Object)> = Vec::new();
    let mut depth = 0;
    while let Some(node_id) = parent {
        if missing.is_empty() || depth >= MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = doc.get_dictionary(node_id) else {
            break;
        };
        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                inherited.push((*key, value.clone()));
                false
            }
            Err(_) => true,
        });
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    if inherited.is_empty() {
        return;
    }
    if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
        for (key, value) in inherited {
            page.set(key.to_vec(), value);
        }
    }
}
