//! Buffer readers.
//!
//! The detector never talks to the platform directly; it reads through a
//! [`ClipboardSource`]. Three outcomes are distinct:
//! - `Ok(Some(text))`: the buffer holds text
//! - `Ok(None)`: the buffer is empty or holds no text
//! - `Err(AccessDenied)`: the platform refused the read right now

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::AccessDenied;

/// Reads the current buffer text.
pub trait ClipboardSource: Send + Sync {
    /// Snapshot-in-time read of the buffer.
    fn read_text(&self) -> Result<Option<String>, AccessDenied>;
}

impl<T: ClipboardSource + ?Sized> ClipboardSource for Arc<T> {
    fn read_text(&self) -> Result<Option<String>, AccessDenied> {
        (**self).read_text()
    }
}

#[derive(Debug, Clone)]
enum BufferState {
    Text(Option<String>),
    Denied(String),
}

/// In-process buffer that a host (or a test) writes into.
///
/// Clones share the same buffer, so one clone can be handed to the observer
/// while the host keeps another to publish reads from its platform callback.
#[derive(Debug, Clone)]
pub struct SharedBuffer {
    state: Arc<Mutex<BufferState>>,
}

impl Default for SharedBuffer {
    fn default() -> Self {
        Self::empty()
    }
}

impl SharedBuffer {
    /// An empty buffer.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            state: Arc::new(Mutex::new(BufferState::Text(None))),
        }
    }

    /// A buffer holding `text`.
    #[must_use]
    pub fn with_text(text: impl Into<String>) -> Self {
        let buffer = Self::empty();
        buffer.set_text(text);
        buffer
    }

    /// Replace the buffer contents. Empty text reads as an empty buffer, the
    /// same as the system clipboard.
    pub fn set_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.set(BufferState::Text((!text.is_empty()).then_some(text)));
    }

    /// Empty the buffer.
    pub fn clear(&self) {
        self.set(BufferState::Text(None));
    }

    /// Make subsequent reads fail with `reason` until the next `set_text`/`clear`.
    pub fn deny(&self, reason: impl Into<String>) {
        self.set(BufferState::Denied(reason.into()));
    }

    fn set(&self, next: BufferState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

impl ClipboardSource for SharedBuffer {
    fn read_text(&self) -> Result<Option<String>, AccessDenied> {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            BufferState::Text(text) => Ok(text.clone()),
            BufferState::Denied(reason) => Err(AccessDenied::new(reason.clone())),
        }
    }
}

/// Reads the OS clipboard through `arboard`.
///
/// A fresh `arboard::Clipboard` is opened per read so a long-lived handle
/// never pins stale data.
#[cfg(feature = "system-clipboard")]
#[derive(Debug, Default, Clone, Copy)]
pub struct ArboardSource;

#[cfg(feature = "system-clipboard")]
impl ClipboardSource for ArboardSource {
    fn read_text(&self) -> Result<Option<String>, AccessDenied> {
        let mut clipboard = arboard::Clipboard::new().map_err(|e| AccessDenied::new(e.to_string()))?;
        match clipboard.get_text() {
            Ok(text) if text.is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(AccessDenied::new(e.to_string())),
        }
    }
}
