//! Crop-area viewer: browse a folder of page scans with their annotations.
//!
//! ```text
//! <folder>/json/*.json      first file: { "<id>": ClipData, ... }
//! <folder>/fullpages/*.jpg  <domain>-<page padded to 3>.jpg
//! ```

use image::DynamicImage;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{encode_png, render_overlay, OverlayStyle, Zoom};
use crate::config::{LibraryConfig, OverlayConfig};
use crate::container::{DirContainer, FileContainer};
use crate::error::ClipError;
use crate::handles::{HandleRegistry, HandleToken, MediaType, Slot, SlotTable};
use crate::metadata::{json_files, missing_subfolder};
use crate::models::{ClipData, CropArea};
use crate::outcome::Outcome;
use crate::resolver::fullpage_image_name;

/// An opened viewer folder with its clip records.
#[derive(Debug)]
pub struct CropViewer {
    folder: PathBuf,
    clips: Vec<(String, ClipData)>,
    skipped: usize,
    pages: DirContainer,
}

/// A decoded page scan and the areas drawn on it.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub page: String,
    pub image: Arc<DynamicImage>,
    pub areas: Vec<CropArea>,
}

impl CropViewer {
    pub async fn open(folder: &Path, config: &LibraryConfig) -> Result<Self, ClipError> {
        let json_dir = folder.join(&config.json_dir);
        if !json_dir.is_dir() {
            return Err(missing_subfolder(&json_dir));
        }
        let pages = DirContainer::open(folder.join(&config.fullpage_dir))?;

        let metadata_file = json_files(&json_dir)?
            .into_iter()
            .next()
            .ok_or_else(|| ClipError::MissingSubfolder {
                parent: json_dir.clone(),
                folder: "*.json".to_string(),
            })?;
        let text = tokio::fs::read_to_string(&metadata_file)
            .await
            .map_err(|e| ClipError::io(&metadata_file, e))?;
        let records = parse_records(&text, &metadata_file)?;

        tracing::info!(
            folder = %folder.display(),
            file = %metadata_file.display(),
            clips = records.success_count(),
            skipped = records.skip_count(),
            "opened crop viewer"
        );
        Ok(Self {
            folder: folder.to_path_buf(),
            skipped: records.skip_count(),
            clips: records.succeeded,
            pages,
        })
    }

    /// Clip records in file order.
    pub fn clips(&self) -> &[(String, ClipData)] {
        &self.clips
    }

    /// Records that could not be read as clip data.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn clip(&self, id: &str) -> Option<&ClipData> {
        self.clips.iter().find(|(k, _)| k == id).map(|(_, c)| c)
    }

    /// Decode the page scan of every page the clip's areas touch, in page
    /// order. Pages without a scan are skipped.
    pub async fn load_pages(&self, clip: &ClipData) -> Outcome<LoadedPage> {
        let mut outcome = Outcome::new();
        for page in clip.pages_with_areas() {
            let name = fullpage_image_name(&clip.domain, &page);
            if !self.pages.contains(&name).await {
                outcome.skip(
                    page.clone(),
                    ClipError::UnresolvedPointer {
                        token: page,
                        tried: vec![name],
                    },
                );
                continue;
            }
            let bytes = match self.pages.read(&name).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    outcome.skip(page, err);
                    continue;
                }
            };
            let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
                .await
                .map_err(|e| e.to_string())
                .and_then(|r| r.map_err(|e| e.to_string()));
            match decoded {
                Ok(image) => {
                    let areas = clip.areas_for_page(&page).into_iter().cloned().collect();
                    outcome.push(LoadedPage {
                        page,
                        image: Arc::new(image),
                        areas,
                    });
                }
                Err(reason) => outcome.skip(page.clone(), ClipError::RenderFailure { page, reason }),
            }
        }
        outcome
    }
}

/// Read an identifier -> ClipData mapping, keeping file order. Entries that
/// are not valid clip records are skipped.
fn parse_records(text: &str, file: &Path) -> Result<Outcome<(String, ClipData)>, ClipError> {
    let map: Map<String, Value> =
        serde_json::from_str(text).map_err(|e| ClipError::MalformedMetadata {
            file: file.to_path_buf(),
            reason: e.to_string(),
        })?;
    let mut records = Outcome::new();
    for (id, value) in map {
        match serde_json::from_value::<ClipData>(value) {
            Ok(data) => records.push((id, data)),
            Err(e) => records.skip(
                id,
                ClipError::MalformedMetadata {
                    file: file.to_path_buf(),
                    reason: e.to_string(),
                },
            ),
        }
    }
    Ok(records)
}

/// One rendered page as exposed to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub page: String,
    pub token: HandleToken,
    pub width: u32,
    pub height: u32,
    pub areas: usize,
}

struct Selection {
    id: String,
    pages: Vec<LoadedPage>,
}

/// Stateful viewer: the selected clip, the zoom level and the rendered page
/// handles. Changing either the clip or the zoom re-renders every page and
/// replaces the page handles.
pub struct OverlayView {
    viewer: CropViewer,
    style: OverlayStyle,
    density: f64,
    zoom: Zoom,
    selection: Option<Selection>,
    slots: SlotTable,
}

impl OverlayView {
    pub fn new(
        viewer: CropViewer,
        registry: HandleRegistry,
        config: &OverlayConfig,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            viewer,
            style: OverlayStyle::from_config(config)?,
            density: config.density,
            zoom: Zoom::new(config.zoom),
            selection: None,
            slots: SlotTable::new(registry),
        })
    }

    pub fn viewer(&self) -> &CropViewer {
        &self.viewer
    }

    pub fn zoom(&self) -> Zoom {
        self.zoom
    }

    pub fn selected(&self) -> Option<&str> {
        self.selection.as_ref().map(|s| s.id.as_str())
    }

    pub fn set_density(&mut self, density: f64) {
        if density.is_finite() && density > 0.0 {
            self.density = density;
        }
    }

    /// Select a clip, load its page scans and render them.
    pub async fn select(&mut self, id: &str) -> Result<Outcome<PageView>, ClipError> {
        let clip = self.viewer.clip(id).ok_or_else(|| ClipError::UnknownClip {
            source_name: self.viewer.folder.display().to_string(),
            id: id.to_string(),
        })?;
        let loaded = self.viewer.load_pages(clip).await;
        self.selection = Some(Selection {
            id: id.to_string(),
            pages: loaded.succeeded,
        });
        let mut views = self.render().await;
        let mut skipped = loaded.skipped;
        skipped.append(&mut views.skipped);
        views.skipped = skipped;
        Ok(views)
    }

    /// Change the zoom level, re-rendering the current clip if it changed.
    pub async fn set_zoom(&mut self, zoom: Zoom) -> Outcome<PageView> {
        if zoom == self.zoom {
            return self.current_views();
        }
        self.zoom = zoom;
        self.render().await
    }

    pub async fn zoom_in(&mut self) -> Outcome<PageView> {
        self.set_zoom(self.zoom.zoom_in()).await
    }

    pub async fn zoom_out(&mut self) -> Outcome<PageView> {
        self.set_zoom(self.zoom.zoom_out()).await
    }

    /// Bytes of a rendered page, while its handle is live.
    pub fn page_png(&self, page: &str) -> Option<Arc<[u8]>> {
        let token = self.slots.get(&Slot::PageImage(page.to_string()))?;
        self.slots.registry().get(token)
    }

    fn current_views(&self) -> Outcome<PageView> {
        let mut outcome = Outcome::new();
        let Some(selection) = &self.selection else {
            return outcome;
        };
        for loaded in &selection.pages {
            let Some(token) = self.slots.get(&Slot::PageImage(loaded.page.clone())) else {
                continue;
            };
            let surface = super::Surface::new(
                loaded.image.width(),
                loaded.image.height(),
                self.zoom,
                self.density,
            );
            outcome.push(PageView {
                page: loaded.page.clone(),
                token: token.clone(),
                width: surface.physical.0,
                height: surface.physical.1,
                areas: loaded.areas.len(),
            });
        }
        outcome
    }

    async fn render(&mut self) -> Outcome<PageView> {
        self.slots.clear_page_images();
        let mut outcome = Outcome::new();
        let Some(selection) = &self.selection else {
            return outcome;
        };

        let pages = selection.pages.clone();
        let (zoom, density, style) = (self.zoom, self.density, self.style.clone());
        let rendered = tokio::task::spawn_blocking(move || {
            pages
                .into_iter()
                .map(|p| {
                    let rendered = render_overlay(&p.image, &p.page, &p.areas, zoom, density, &style)
                        .and_then(|img| Ok((img.dimensions(), encode_png(&img, &p.page)?)));
                    (p.page, p.areas.len(), rendered)
                })
                .collect::<Vec<_>>()
        })
        .await;

        let rendered = match rendered {
            Ok(rendered) => rendered,
            Err(e) => {
                for p in &selection.pages {
                    outcome.skip(
                        p.page.clone(),
                        ClipError::RenderFailure {
                            page: p.page.clone(),
                            reason: e.to_string(),
                        },
                    );
                }
                return outcome;
            }
        };

        for (page, areas, result) in rendered {
            match result {
                Ok(((width, height), bytes)) => {
                    let token = self.slots.registry().acquire(bytes.into(), MediaType::Png);
                    self.slots.install(Slot::PageImage(page.clone()), token.clone());
                    outcome.push(PageView {
                        page,
                        token,
                        width,
                        height,
                        areas,
                    });
                }
                Err(err) => outcome.skip(page, err),
            }
        }
        tracing::debug!(
            zoom = zoom.percent(),
            pages = outcome.success_count(),
            "rendered overlays"
        );
        outcome
    }
}
