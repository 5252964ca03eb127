//! Core data models for clipping archives.
//!
//! These types represent the sources, clips, and crop areas that flow from
//! the metadata normalizer into the resolver, assembler, and overlay renderer.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A named collection point: one folder under the library root.
#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    pub clips: Vec<Clip>,
}

impl Source {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clips: Vec::new(),
        }
    }

    /// Find a clip by its identifier.
    pub fn clip(&self, id: &str) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id.as_deref() == Some(id))
    }
}

/// One newspaper article record. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Clip {
    /// `None` when the metadata title is absent or blank.
    pub title: Option<String>,
    /// Comma-separated pointer tokens; order is page order.
    pub pointers: String,
    pub date: Option<String>,
    pub author: Option<String>,
    pub section: Option<String>,
    pub fulltext: Option<String>,
    pub url: Option<String>,
    pub id: Option<String>,
}

impl Clip {
    /// Build a clip from one JSON object. Returns `None` when the object
    /// has no usable `pointers` field.
    pub fn from_object(body: &Map<String, Value>) -> Option<Clip> {
        let pointers = text_field(body, "pointers")?;
        if pointer_tokens(&pointers).is_empty() {
            return None;
        }
        Some(Clip {
            title: text_field(body, "title").filter(|t| !t.trim().is_empty()),
            pointers,
            date: text_field(body, "date"),
            author: text_field(body, "author"),
            section: text_field(body, "section"),
            fulltext: text_field(body, "fulltext"),
            url: text_field(body, "url"),
            id: text_field(body, "id"),
        })
    }

    pub fn pointer_tokens(&self) -> Vec<&str> {
        pointer_tokens(&self.pointers)
    }

    /// Title shown in listings: the title, else the id, else `Clip <n>`
    /// where `position` is the 0-based index in its source.
    pub fn display_title(&self, position: usize) -> String {
        self.title
            .clone()
            .or_else(|| self.id.clone())
            .unwrap_or_else(|| format!("Clip {}", position + 1))
    }
}

/// Split a pointer string on commas, trimming and dropping empty tokens.
pub fn pointer_tokens(pointers: &str) -> Vec<&str> {
    pointers
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Read a field as text. Strings pass through, numbers are rendered, and
/// arrays of scalars are joined with `", "`.
fn text_field(body: &Map<String, Value>, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        _ => None,
    }
}

/// Artifact category with its own filename-resolution rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Per-pointer clip artifacts in the `clips` folder.
    Exact,
    /// Full-page scans in the `fullpages` folder.
    FullPage,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Exact => f.write_str("exact"),
            Category::FullPage => f.write_str("fullpage"),
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exact" | "clips" => Ok(Category::Exact),
            "fullpage" | "fullpages" => Ok(Category::FullPage),
            other => Err(format!(
                "unknown category '{}'. Must be exact or fullpage.",
                other
            )),
        }
    }
}

/// One annotated rectangle on one page of a clip.
///
/// Coordinates are fractions of the page size with a bottom-left origin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CropArea {
    #[serde(deserialize_with = "de_text")]
    pub page: String,
    #[serde(deserialize_with = "de_fraction")]
    pub x: f64,
    #[serde(deserialize_with = "de_fraction")]
    pub y: f64,
    #[serde(deserialize_with = "de_fraction")]
    pub width: f64,
    #[serde(deserialize_with = "de_fraction")]
    pub height: f64,
    #[serde(default)]
    pub order: Option<i64>,
}

/// The richer per-article record used by the crop-area viewer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClipData {
    pub title: Option<String>,
    pub fulltitle: Option<String>,
    pub pointers: Option<String>,
    pub domain: String,
    pub paper: Option<String>,
    pub pages: Option<String>,
    pub author: Vec<String>,
    pub section: Vec<Option<String>>,
    pub fulltext: Option<String>,
    pub clip_name: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "cropAreas")]
    pub crop_areas: Vec<CropArea>,
}

impl ClipData {
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => "Untitled",
        }
    }

    pub fn authors(&self) -> String {
        self.author.join(", ")
    }

    pub fn sections(&self) -> String {
        self.section
            .iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Title, authors, sections, paper, pages and area count on one line.
    pub fn summary(&self) -> String {
        let mut parts = vec![self.display_title().to_string()];
        for value in [self.authors(), self.sections()] {
            if !value.is_empty() {
                parts.push(value);
            }
        }
        for value in [&self.paper, &self.pages].into_iter().flatten() {
            if !value.trim().is_empty() {
                parts.push(value.clone());
            }
        }
        parts.push(format!("{} areas", self.crop_areas.len()));
        parts.join(" | ")
    }

    /// Unique page identifiers referenced by the crop areas, in numeric
    /// page order (non-numeric pages sort after, lexically).
    pub fn pages_with_areas(&self) -> Vec<String> {
        let mut pages: Vec<String> = Vec::new();
        for area in &self.crop_areas {
            if !pages.contains(&area.page) {
                pages.push(area.page.clone());
            }
        }
        pages.sort_by(|a, b| {
            match (a.trim().parse::<u32>(), b.trim().parse::<u32>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                (Err(_), Err(_)) => a.cmp(b),
            }
        });
        pages
    }

    /// Crop areas for one page, in stored array order.
    pub fn areas_for_page(&self, page: &str) -> Vec<&CropArea> {
        self.crop_areas.iter().filter(|a| a.page == page).collect()
    }
}

fn de_fraction<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom("coordinate out of range")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| D::Error::custom(format!("bad coordinate '{}': {}", s, e))),
        other => Err(D::Error::custom(format!(
            "coordinate must be a number or string, got {}",
            other
        ))),
    }
}

fn de_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}
