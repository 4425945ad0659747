//! Error types for Markcopy.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Restricted page: {0}")]
    RestrictedPage(String),

    #[error("Agent unreachable: {0}")]
    AgentUnreachable(String),

    #[error("Injection failed: {0}")]
    InjectionFailed(String),

    #[error("No content found")]
    NoContent,

    #[error("Clipboard write failed: {0}")]
    ClipboardWrite(String),

    #[error("Delivery failed after {attempts} attempts")]
    DeliveryExhausted { attempts: u32 },

    #[error("No active tab")]
    NoActiveTab,

    #[error("Delivery already in progress for tab {0}")]
    DeliveryInProgress(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the delivery retry loop may try again after this error.
    ///
    /// A restricted page is final: no amount of re-injection changes the
    /// page's scheme.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::AgentUnreachable(_) | Error::InjectionFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::AgentUnreachable("no listener".into()).is_recoverable());
        assert!(Error::InjectionFailed("frame detached".into()).is_recoverable());
        assert!(!Error::RestrictedPage("chrome://settings".into()).is_recoverable());
        assert!(!Error::DeliveryExhausted { attempts: 3 }.is_recoverable());
        assert!(!Error::NoContent.is_recoverable());
    }
}
