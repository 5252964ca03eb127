use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::Category;
use crate::overlay::{MAX_ZOOM, MIN_ZOOM};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub assembly: AssemblyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LibraryConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_json_dir")]
    pub json_dir: String,
    #[serde(default = "default_exact_dir")]
    pub exact_dir: String,
    #[serde(default = "default_fullpage_dir")]
    pub fullpage_dir: String,
    #[serde(default = "default_strip_suffix")]
    pub strip_suffix: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: None,
            json_dir: default_json_dir(),
            exact_dir: default_exact_dir(),
            fullpage_dir: default_fullpage_dir(),
            strip_suffix: default_strip_suffix(),
        }
    }
}

fn default_json_dir() -> String {
    "json".to_string()
}
fn default_exact_dir() -> String {
    "clips".to_string()
}
fn default_fullpage_dir() -> String {
    "fullpages".to_string()
}
fn default_strip_suffix() -> String {
    ".com.br-info".to_string()
}

impl LibraryConfig {
    /// Folder name holding the artifacts of `category`.
    pub fn category_dir(&self, category: Category) -> &str {
        match category {
            Category::Exact => &self.exact_dir,
            Category::FullPage => &self.fullpage_dir,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OverlayConfig {
    #[serde(default = "default_zoom")]
    pub zoom: f64,
    #[serde(default = "default_density")]
    pub density: f64,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    #[serde(default = "default_fill_alpha")]
    pub fill_alpha: f64,
    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            zoom: default_zoom(),
            density: default_density(),
            stroke_width: default_stroke_width(),
            fill_alpha: default_fill_alpha(),
            color: default_color(),
        }
    }
}

fn default_zoom() -> f64 {
    1.0
}
fn default_density() -> f64 {
    1.0
}
fn default_stroke_width() -> f64 {
    3.0
}
fn default_fill_alpha() -> f64 {
    0.1
}
fn default_color() -> String {
    "#ff0000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssemblyConfig {
    #[serde(default = "default_pdf_version")]
    pub pdf_version: String,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            pdf_version: default_pdf_version(),
        }
    }
}

fn default_pdf_version() -> String {
    "1.5".to_string()
}

impl Config {
    /// Defaults only; used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Library root, if one has been configured.
    pub fn root(&self) -> Option<&Path> {
        self.library.root.as_deref()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_minimal(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

fn validate(config: &Config) -> Result<()> {
    let overlay = &config.overlay;
    if !(MIN_ZOOM..=MAX_ZOOM).contains(&overlay.zoom) {
        anyhow::bail!("overlay.zoom must be in [{}, {}]", MIN_ZOOM, MAX_ZOOM);
    }
    if overlay.density <= 0.0 || !overlay.density.is_finite() {
        anyhow::bail!("overlay.density must be > 0");
    }
    if overlay.stroke_width <= 0.0 {
        anyhow::bail!("overlay.stroke_width must be > 0");
    }
    if !(0.0..=1.0).contains(&overlay.fill_alpha) {
        anyhow::bail!("overlay.fill_alpha must be in [0.0, 1.0]");
    }
    crate::overlay::parse_hex_color(&overlay.color)
        .with_context(|| format!("overlay.color is not a #rrggbb color: {}", overlay.color))?;

    let library = &config.library;
    for (key, value) in [
        ("library.json_dir", &library.json_dir),
        ("library.exact_dir", &library.exact_dir),
        ("library.fullpage_dir", &library.fullpage_dir),
    ] {
        if value.trim().is_empty() {
            anyhow::bail!("{} must not be empty", key);
        }
    }

    match config.assembly.pdf_version.as_str() {
        "1.3" | "1.4" | "1.5" | "1.6" | "1.7" => {}
        other => anyhow::bail!(
            "Unknown assembly.pdf_version: '{}'. Must be one of 1.3 to 1.7.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(content: &str) -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("clips.toml");
        fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn empty_file_yields_defaults() {
        let (_tmp, path) = write("");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.library.exact_dir, "clips");
        assert_eq!(cfg.library.category_dir(Category::FullPage), "fullpages");
        assert_eq!(cfg.overlay.stroke_width, 3.0);
        assert_eq!(cfg.assembly.pdf_version, "1.5");
        assert!(cfg.root().is_none());
    }

    #[test]
    fn root_and_overlay_overrides() {
        let (_tmp, path) = write(
            r##"
[library]
root = "/data/archive"
strip_suffix = ".info"

[overlay]
zoom = 2.0
density = 2.0
color = "#00ff00"
"##,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.root(), Some(Path::new("/data/archive")));
        assert_eq!(cfg.library.strip_suffix, ".info");
        assert_eq!(cfg.overlay.zoom, 2.0);
        assert_eq!(cfg.overlay.color, "#00ff00");
    }

    #[test]
    fn out_of_range_zoom_is_rejected() {
        let (_tmp, path) = write("[overlay]\nzoom = 8.0\n");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("overlay.zoom"));
    }

    #[test]
    fn bad_color_is_rejected() {
        let (_tmp, path) = write("[overlay]\ncolor = \"red\"\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn missing_file_falls_back_to_minimal() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_or_minimal(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.library.json_dir, "json");
    }
}
