//! Clipboard seam with the two write paths.

use async_trait::async_trait;
use markcopy_core::{Error, Result};
use parking_lot::RwLock;
use tracing::{debug, warn};

/// Platform clipboard.
#[async_trait]
pub trait Clipboard: Send + Sync {
    /// Primary path: the asynchronous clipboard write API.
    async fn write_text(&self, text: &str) -> Result<()>;

    /// Fallback path: an off-screen editable element plus the legacy copy
    /// command.
    fn exec_copy(&self, text: &str) -> Result<()>;
}

/// Which path ended up writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardPath {
    Primary,
    Fallback,
}

/// Write `text`, trying the fallback only once the primary path rejected.
pub async fn copy_to_clipboard(clipboard: &dyn Clipboard, text: &str) -> Result<ClipboardPath> {
    match clipboard.write_text(text).await {
        Ok(()) => Ok(ClipboardPath::Primary),
        Err(primary) => {
            debug!("Clipboard write rejected, trying fallback: {}", primary);
            clipboard.exec_copy(text).map(|_| ClipboardPath::Fallback).map_err(|fallback| {
                warn!("Clipboard fallback failed: {}", fallback);
                Error::ClipboardWrite(format!("{}; fallback: {}", primary, fallback))
            })
        }
    }
}

/// In-memory clipboard whose paths can be made to fail.
#[derive(Default)]
pub struct MemoryClipboard {
    contents: RwLock<Option<String>>,
    reject_primary: bool,
    reject_fallback: bool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Primary path rejects; the fallback still works.
    pub fn without_async_api() -> Self {
        Self {
            reject_primary: true,
            ..Self::default()
        }
    }

    /// Both paths reject.
    pub fn denied() -> Self {
        Self {
            reject_primary: true,
            reject_fallback: true,
            ..Self::default()
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.read().clone()
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> Result<()> {
        if self.reject_primary {
            return Err(Error::ClipboardWrite("write permission denied".into()));
        }
        *self.contents.write() = Some(text.to_string());
        Ok(())
    }

    fn exec_copy(&self, text: &str) -> Result<()> {
        if self.reject_fallback {
            return Err(Error::ClipboardWrite("copy command returned false".into()));
        }
        *self.contents.write() = Some(text.to_string());
        Ok(())
    }
}
