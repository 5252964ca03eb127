//! # Clip Harness CLI (`clips`)
//!
//! The `clips` binary browses a library of newspaper clippings: it lists
//! sources and clips, resolves a clip's pointers to files, assembles them
//! into one PDF, and renders crop-area overlays on page scans.
//!
//! ## Usage
//!
//! ```bash
//! clips --config ./config/clips.toml --root /data/clippings <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `clips sources` | List sources with clip counts and subfolder status |
//! | `clips list <source>` | List a source's clips, optionally filtered |
//! | `clips resolve <source> <clip>` | Show which files a clip's pointers resolve to |
//! | `clips assemble <source> <clip> --out FILE` | Write the clip's assembled PDF |
//! | `clips overlay <folder> <clip> --out-dir DIR` | Render crop-area overlays to PNG |
//!
//! ## Examples
//!
//! ```bash
//! # Which sources are there, and are they complete?
//! clips sources --root /data/clippings
//!
//! # Clips mentioning "eleição"
//! clips list jornal.com.br-info --filter eleição --root /data/clippings
//!
//! # Full-page PDF of the first clip
//! clips assemble jornal.com.br-info 1 --category fullpage --out page.pdf
//!
//! # Overlays at 150%, 2x density
//! clips overlay ./viewer A1 --out-dir ./out --zoom 1.5 --density 2
//! ```

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};

use clip_harness::assemble::AssemblyKind;
use clip_harness::config::{self, Config};
use clip_harness::handles::HandleRegistry;
use clip_harness::library::filter_clips;
use clip_harness::logging;
use clip_harness::models::Category;
use clip_harness::overlay::{CropViewer, OverlayView};
use clip_harness::session::{Applied, Browser};
use clip_harness::sources;

/// Clip Harness CLI: browse scanned-newspaper clippings.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file and a `--root` flag naming the library folder.
#[derive(Parser)]
#[command(
    name = "clips",
    about = "Clip Harness: browse, resolve and assemble scanned-newspaper clippings",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/clips.toml`. A missing file means defaults.
    #[arg(long, global = true, default_value = "./config/clips.toml")]
    config: PathBuf,

    /// Library root folder. Overrides `[library] root`.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// More diagnostics on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// List sources and their status.
    ///
    /// Every subfolder of the root is a source. Shows how many clips its
    /// metadata yields and which artifact folders it has.
    Sources,

    /// List the clips of one source.
    List {
        /// Source name (folder under the root).
        source: String,

        /// Keep only clips whose title or id contains this text.
        #[arg(long)]
        filter: Option<String>,
    },

    /// Resolve a clip's pointers to files.
    ///
    /// Prints one line per resolved pointer, then the pointers that matched
    /// nothing.
    Resolve {
        source: String,

        /// Clip id, or its 1-based position in `clips list`.
        clip: String,

        /// Artifact category: `exact` or `fullpage`.
        #[arg(long, default_value = "exact")]
        category: Category,
    },

    /// Assemble a clip's files into one PDF.
    ///
    /// A single file is copied unchanged; several are merged page by page.
    /// Unreadable inputs are skipped.
    Assemble {
        source: String,

        /// Clip id, or its 1-based position in `clips list`.
        clip: String,

        /// Artifact category: `exact` or `fullpage`.
        #[arg(long, default_value = "exact")]
        category: Category,

        /// Output PDF path.
        #[arg(long)]
        out: PathBuf,
    },

    /// Render crop-area overlays for one clip of a viewer folder.
    ///
    /// The folder holds `json/` (clip records) and `fullpages/` (page
    /// scans). Writes `page-<page>.png` per page into the output directory.
    Overlay {
        folder: PathBuf,

        /// Clip identifier from the folder's JSON mapping.
        clip: String,

        #[arg(long)]
        out_dir: PathBuf,

        /// Zoom level, 0.25 to 4.0 in steps of 0.25.
        #[arg(long)]
        zoom: Option<f64>,

        /// Output pixel density.
        #[arg(long)]
        density: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_or_minimal(&cli.config)?;

    match cli.command {
        Commands::Sources => {
            let browser = open(&cfg, cli.root.as_deref()).await?;
            let session = current_session(&browser)?;
            sources::list_sources(session.library(), &cfg.library)?;
        }
        Commands::List { source, filter } => {
            let browser = open(&cfg, cli.root.as_deref()).await?;
            let session = current_session(&browser)?;
            let source = session.source(&source)?;
            let term = filter.unwrap_or_default();
            let hits = filter_clips(&source.clips, &term);
            for (index, clip) in &hits {
                println!(
                    "{:>4}  {:<16} {}",
                    index + 1,
                    clip.id.as_deref().unwrap_or("-"),
                    clip.display_title(*index)
                );
            }
            println!("\n{} of {} clips", hits.len(), source.clips.len());
        }
        Commands::Resolve {
            source,
            clip,
            category,
        } => {
            let browser = open(&cfg, cli.root.as_deref()).await?;
            let session = current_session(&browser)?;
            let clip = session.clip(&source, &clip)?;
            let outcome = session
                .resolve(&cfg.library, &source, clip, category)
                .await?;
            for file in &outcome.succeeded {
                println!("{:<16} {}", file.token, file.path.display());
            }
            for skipped in &outcome.skipped {
                println!("{:<16} (unresolved) {}", skipped.item, skipped.reason);
            }
            println!(
                "\n{} resolved, {} unresolved",
                outcome.success_count(),
                outcome.skip_count()
            );
        }
        Commands::Assemble {
            source,
            clip,
            category,
            out,
        } => {
            let browser = open(&cfg, cli.root.as_deref()).await?;
            let loaded = match browser.select_clip(&source, &clip).await? {
                Applied::Current(loaded) => loaded,
                Applied::Stale { request } => bail!("selection {} was superseded", request),
            };
            let view = loaded.view(category);
            if let Some(err) = &view.error {
                bail!("{} assembly failed: {}", category, err);
            }
            for skipped in view.unresolved.iter().chain(&view.merge_skipped) {
                eprintln!("skipped {}: {}", skipped.item, skipped.reason);
            }
            let Some((_, bytes)) = browser.document(category) else {
                println!("no document: no {} file matched {}", category, clip);
                return Ok(());
            };
            std::fs::write(&out, &bytes[..])
                .with_context(|| format!("Failed to write {}", out.display()))?;
            match view.kind {
                AssemblyKind::Merged => println!(
                    "wrote {} ({} pages from {} of {} files)",
                    out.display(),
                    view.page_count.unwrap_or(0),
                    view.files.len() - view.merge_skipped.len(),
                    view.files.len()
                ),
                _ => println!("wrote {} (single file, unchanged)", out.display()),
            }
        }
        Commands::Overlay {
            folder,
            clip,
            out_dir,
            zoom,
            density,
        } => {
            let mut overlay_cfg = cfg.overlay.clone();
            if let Some(zoom) = zoom {
                overlay_cfg.zoom = zoom;
            }
            let viewer = CropViewer::open(&folder, &cfg.library).await?;
            let mut view = OverlayView::new(viewer, HandleRegistry::new(), &overlay_cfg)?;
            if let Some(density) = density {
                view.set_density(density);
            }
            let pages = view.select(&clip).await?;
            if let Some(data) = view.viewer().clip(&clip) {
                println!("{}\n", data.summary());
            }
            if view.viewer().skipped() > 0 {
                eprintln!(
                    "{} of {} records in {} could not be read",
                    view.viewer().skipped(),
                    view.viewer().skipped() + view.viewer().clips().len(),
                    folder.display()
                );
            }
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("Failed to create {}", out_dir.display()))?;
            for page in &pages.succeeded {
                let Some(png) = view.page_png(&page.page) else {
                    continue;
                };
                let path = out_dir.join(format!("page-{}.png", page.page));
                std::fs::write(&path, &png[..])
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!(
                    "{}  {}x{}  {} areas",
                    path.display(),
                    page.width,
                    page.height,
                    page.areas
                );
            }
            for skipped in &pages.skipped {
                eprintln!("skipped page {}: {}", skipped.item, skipped.reason);
            }
            println!(
                "\n{} pages rendered at {}%",
                pages.success_count(),
                view.zoom().percent()
            );
        }
    }

    Ok(())
}

async fn open(cfg: &Config, root: Option<&Path>) -> anyhow::Result<Browser> {
    let root = root
        .or(cfg.root())
        .map(Path::to_path_buf)
        .context("No library root: pass --root or set [library] root in the config")?;
    let browser = Browser::new(cfg.clone(), HandleRegistry::new());
    browser
        .open_root(Some(root.clone()))
        .await
        .with_context(|| format!("Failed to open library {}", root.display()))?;
    Ok(browser)
}

fn current_session(
    browser: &Browser,
) -> anyhow::Result<std::sync::Arc<clip_harness::session::Session>> {
    browser.session().context("No open session")
}
