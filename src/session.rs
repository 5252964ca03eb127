//! Browsing sessions and stale-result suppression.
//!
//! A [`Session`] is everything derived from one opened root folder. The
//! [`Browser`] holds the current session and replaces it wholesale when a
//! new root is opened.
//!
//! Selecting a clip runs in three steps:
//!
//! 1. [`Browser::begin`] issues a [`Ticket`]: a fresh request id plus the
//!    generation of the session it runs against.
//! 2. [`Browser::load`] resolves and assembles both artifact categories
//!    concurrently and acquires a handle for each document produced.
//! 3. [`Browser::apply`] installs the documents into the display slots,
//!    but only if the ticket is still the latest request and its session is
//!    still open. Otherwise its handles are released and the load is
//!    reported as [`Applied::Stale`].
//!
//! [`Browser::select_clip`] runs all three.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::assemble::{assemble, AssemblyKind};
use crate::config::{Config, LibraryConfig};
use crate::container::DirContainer;
use crate::error::ClipError;
use crate::handles::{HandleRegistry, HandleToken, MediaType, Slot, SlotTable};
use crate::library::{find_clip, load_library, Library};
use crate::models::{Category, Clip, Source};
use crate::outcome::{Outcome, Skipped};
use crate::resolver::{ResolvedFile, Resolver};

/// State derived from one opened root folder.
#[derive(Debug)]
pub struct Session {
    generation: u64,
    library: Library,
}

impl Session {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn root(&self) -> &Path {
        &self.library.root
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn source(&self, name: &str) -> Result<&Source, ClipError> {
        self.library
            .source(name)
            .ok_or_else(|| ClipError::MissingSubfolder {
                parent: self.library.root.clone(),
                folder: name.to_string(),
            })
    }

    /// Look a clip up by id or 1-based position.
    pub fn clip(&self, source: &str, key: &str) -> Result<&Clip, ClipError> {
        find_clip(self.source(source)?, key).ok_or_else(|| ClipError::UnknownClip {
            source_name: source.to_string(),
            id: key.to_string(),
        })
    }

    /// Resolve `clip`'s pointers against the source's `category` folder.
    pub async fn resolve(
        &self,
        config: &LibraryConfig,
        source: &str,
        clip: &Clip,
        category: Category,
    ) -> Result<Outcome<ResolvedFile>, ClipError> {
        let dir = self
            .library
            .source_dir(source)
            .join(config.category_dir(category));
        let container = DirContainer::open(dir)?;
        Resolver::new(source, &config.strip_suffix)
            .resolve(clip, category, &container)
            .await
    }
}

/// Identifies one selection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub request: u64,
    pub generation: u64,
}

/// One category's result for a selection.
#[derive(Debug)]
pub struct CategoryView {
    pub category: Category,
    pub files: Vec<ResolvedFile>,
    pub unresolved: Vec<Skipped>,
    pub merge_skipped: Vec<Skipped>,
    pub kind: AssemblyKind,
    pub page_count: Option<usize>,
    pub token: Option<HandleToken>,
    /// Set when this category failed as a whole; the other category is
    /// unaffected.
    pub error: Option<ClipError>,
}

impl CategoryView {
    fn failed(category: Category, error: ClipError) -> Self {
        Self {
            category,
            files: Vec::new(),
            unresolved: Vec::new(),
            merge_skipped: Vec::new(),
            kind: AssemblyKind::Nothing,
            page_count: None,
            token: None,
            error: Some(error),
        }
    }

    fn slot(&self) -> Slot {
        match self.category {
            Category::Exact => Slot::Exact,
            Category::FullPage => Slot::FullPage,
        }
    }
}

/// Both categories loaded for one clip, not yet installed.
#[derive(Debug)]
pub struct Loaded {
    pub ticket: Ticket,
    pub source: String,
    pub clip: Clip,
    pub exact: CategoryView,
    pub fullpage: CategoryView,
}

impl Loaded {
    pub fn view(&self, category: Category) -> &CategoryView {
        match category {
            Category::Exact => &self.exact,
            Category::FullPage => &self.fullpage,
        }
    }

    fn tokens(&self) -> impl Iterator<Item = &HandleToken> {
        [&self.exact, &self.fullpage]
            .into_iter()
            .filter_map(|v| v.token.as_ref())
    }
}

#[derive(Debug)]
pub enum Applied {
    Current(Loaded),
    /// A newer request or a new session superseded this one; its documents
    /// were released.
    Stale { request: u64 },
}

struct State {
    session: Option<Arc<Session>>,
    latest_request: u64,
    latest_open: u64,
    slots: SlotTable,
}

/// Holds the open session and the documents currently on display.
pub struct Browser {
    config: Config,
    registry: HandleRegistry,
    requests: AtomicU64,
    opens: AtomicU64,
    generations: AtomicU64,
    state: Mutex<State>,
}

impl Browser {
    pub fn new(config: Config, registry: HandleRegistry) -> Self {
        let slots = SlotTable::new(registry.clone());
        Self {
            config,
            registry,
            requests: AtomicU64::new(0),
            opens: AtomicU64::new(0),
            generations: AtomicU64::new(0),
            state: Mutex::new(State {
                session: None,
                latest_request: 0,
                latest_open: 0,
                slots,
            }),
        }
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.lock().session.clone()
    }

    /// Open `root` as a new session. `None` means the user backed out of
    /// choosing a folder; the current session is kept.
    ///
    /// Only the most recently issued open is installed. An earlier open that
    /// finishes loading after a later one returns
    /// [`ClipError::SelectionAborted`] and leaves the session alone.
    pub async fn open_root(&self, root: Option<PathBuf>) -> Result<Arc<Session>, ClipError> {
        let root = root.ok_or(ClipError::SelectionAborted)?;
        let open = {
            let mut state = self.lock();
            let open = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
            state.latest_open = open;
            open
        };
        let library = load_library(&root, &self.config.library).await?;

        let mut state = self.lock();
        if state.latest_open != open {
            tracing::debug!(root = %root.display(), open, "discarded superseded open");
            return Err(ClipError::SelectionAborted);
        }
        let session = Arc::new(Session {
            generation: self.generations.fetch_add(1, Ordering::SeqCst) + 1,
            library,
        });
        state.slots.clear_all();
        state.session = Some(Arc::clone(&session));
        tracing::info!(
            root = %root.display(),
            generation = session.generation,
            sources = session.library.sources.len(),
            clips = session.library.clip_count(),
            "opened session"
        );
        Ok(session)
    }

    /// End the session and release every displayed document. Opens still
    /// loading are superseded too.
    pub fn close(&self) {
        self.generations.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        state.latest_open = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
        state.slots.clear_all();
        state.session = None;
    }

    /// Issue a ticket against the current session.
    pub fn begin(&self) -> Result<(Ticket, Arc<Session>), ClipError> {
        let mut state = self.lock();
        let session = state.session.clone().ok_or(ClipError::SelectionAborted)?;
        let request = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        state.latest_request = request;
        Ok((
            Ticket {
                request,
                generation: session.generation,
            },
            session,
        ))
    }

    /// Resolve and assemble both categories of a clip.
    pub async fn load(
        &self,
        ticket: Ticket,
        session: &Session,
        source: &str,
        clip_key: &str,
    ) -> Result<Loaded, ClipError> {
        let clip = session.clip(source, clip_key)?.clone();
        tracing::debug!(request = ticket.request, source, clip = ?clip.id, "loading selection");
        let (exact, fullpage) = tokio::join!(
            self.load_category(session, source, &clip, Category::Exact),
            self.load_category(session, source, &clip, Category::FullPage),
        );
        Ok(Loaded {
            ticket,
            source: source.to_string(),
            clip,
            exact,
            fullpage,
        })
    }

    async fn load_category(
        &self,
        session: &Session,
        source: &str,
        clip: &Clip,
        category: Category,
    ) -> CategoryView {
        let resolved = match session
            .resolve(&self.config.library, source, clip, category)
            .await
        {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::warn!(source, %category, "{}", err);
                return CategoryView::failed(category, err);
            }
        };
        let assembly = match assemble(&resolved.succeeded, &self.config.assembly.pdf_version).await {
            Ok(assembly) => assembly,
            Err(err) => {
                tracing::error!(source, %category, "{}", err);
                let mut view = CategoryView::failed(category, err);
                view.files = resolved.succeeded;
                view.unresolved = resolved.skipped;
                return view;
            }
        };
        let token = assembly
            .bytes
            .map(|bytes| self.registry.acquire(bytes, MediaType::Pdf));
        CategoryView {
            category,
            files: resolved.succeeded,
            unresolved: resolved.skipped,
            merge_skipped: assembly.inputs.skipped,
            kind: assembly.kind,
            page_count: assembly.page_count,
            token,
            error: None,
        }
    }

    /// Install a load if it is still current; release it otherwise.
    pub fn apply(&self, loaded: Loaded) -> Applied {
        let mut state = self.lock();
        let current_generation = state.session.as_ref().map(|s| s.generation);
        let is_current = loaded.ticket.request == state.latest_request
            && current_generation == Some(loaded.ticket.generation);

        if !is_current {
            for token in loaded.tokens() {
                self.registry.release(token);
            }
            tracing::debug!(request = loaded.ticket.request, "discarded stale selection");
            return Applied::Stale {
                request: loaded.ticket.request,
            };
        }

        for view in [&loaded.exact, &loaded.fullpage] {
            match &view.token {
                Some(token) => state.slots.install(view.slot(), token.clone()),
                None => {
                    state.slots.clear(&view.slot());
                }
            }
        }
        Applied::Current(loaded)
    }

    /// Select a clip: issue a ticket, load both categories, and apply.
    pub async fn select_clip(&self, source: &str, clip_key: &str) -> Result<Applied, ClipError> {
        let (ticket, session) = self.begin()?;
        let loaded = self.load(ticket, &session, source, clip_key).await?;
        Ok(self.apply(loaded))
    }

    /// The document currently displayed for `category`.
    pub fn document(&self, category: Category) -> Option<(HandleToken, Arc<[u8]>)> {
        let state = self.lock();
        let slot = match category {
            Category::Exact => Slot::Exact,
            Category::FullPage => Slot::FullPage,
        };
        let token = state.slots.get(&slot)?.clone();
        let bytes = self.registry.get(&token)?;
        Some((token, bytes))
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
