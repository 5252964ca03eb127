//! Scoped in-memory document handles.
//!
//! Assembled documents and decoded page images are exposed to callers as
//! opaque `blob:<uuid>` tokens. A token resolves until it is released. The
//! [`SlotTable`] ties each token to the UI slot that shows it and releases
//! the previous token whenever a slot is refilled, so a superseded document
//! never outlives its replacement.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Opaque, URL-like token naming one buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandleToken(String);

impl HandleToken {
    fn fresh() -> Self {
        Self(format!("blob:{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a handle holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Pdf,
    Png,
}

impl MediaType {
    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Png => "image/png",
        }
    }
}

/// Process-wide table of live handles. Cloning shares the table.
#[derive(Debug, Clone, Default)]
pub struct HandleRegistry {
    entries: Arc<Mutex<HashMap<HandleToken, Arc<[u8]>>>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a buffer and return its new token.
    pub fn acquire(&self, bytes: Arc<[u8]>, media: MediaType) -> HandleToken {
        let token = HandleToken::fresh();
        self.lock().insert(token.clone(), bytes);
        tracing::debug!(%token, media = media.mime(), "acquired handle");
        token
    }

    /// Bytes behind `token`, if it has not been released.
    pub fn get(&self, token: &HandleToken) -> Option<Arc<[u8]>> {
        self.lock().get(token).map(Arc::clone)
    }

    /// Drop the buffer behind `token`. Returns false if it was already gone.
    pub fn release(&self, token: &HandleToken) -> bool {
        let released = self.lock().remove(token).is_some();
        if released {
            tracing::debug!(%token, "released handle");
        }
        released
    }

    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<HandleToken, Arc<[u8]>>> {
        // A poisoned table still holds valid entries.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Display slot a handle is shown in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Assembled exact-mode clip document.
    Exact,
    /// Assembled full-page document.
    FullPage,
    /// Rendered overlay for one page of the crop-area viewer.
    PageImage(String),
}

/// One handle per slot; refilling a slot releases what it held.
#[derive(Debug)]
pub struct SlotTable {
    registry: HandleRegistry,
    slots: HashMap<Slot, HandleToken>,
}

impl SlotTable {
    pub fn new(registry: HandleRegistry) -> Self {
        Self {
            registry,
            slots: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    /// Put `token` in `slot`, releasing the token it replaces.
    pub fn install(&mut self, slot: Slot, token: HandleToken) {
        if let Some(previous) = self.slots.insert(slot, token) {
            self.registry.release(&previous);
        }
    }

    /// Empty `slot`, releasing its token. Returns whether it held one.
    pub fn clear(&mut self, slot: &Slot) -> bool {
        match self.slots.remove(slot) {
            Some(token) => self.registry.release(&token),
            None => false,
        }
    }

    /// Release every slot's token (session teardown).
    pub fn clear_all(&mut self) {
        for (_, token) in self.slots.drain() {
            self.registry.release(&token);
        }
    }

    /// Release all page-image slots, keeping document slots.
    pub fn clear_page_images(&mut self) {
        let pages: Vec<Slot> = self
            .slots
            .keys()
            .filter(|s| matches!(s, Slot::PageImage(_)))
            .cloned()
            .collect();
        for slot in pages {
            self.clear(&slot);
        }
    }

    pub fn get(&self, slot: &Slot) -> Option<&HandleToken> {
        self.slots.get(slot)
    }
}

impl Drop for SlotTable {
    fn drop(&mut self) {
        self.clear_all();
    }
}
