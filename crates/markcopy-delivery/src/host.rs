//! Browser-side collaborators of the coordinator.

use async_trait::async_trait;
use markcopy_core::{AgentRequest, AgentResponse, Result, TabId};
use parking_lot::RwLock;
use tracing::info;

/// Tabs, messaging and script injection.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Current URL of `tab`; `None` when the tab is gone or has no URL.
    async fn tab_url(&self, tab: TabId) -> Option<String>;

    /// Active tab of the current window.
    async fn active_tab(&self) -> Option<TabId>;

    /// Send a message to the agents in `tab`. Fails with
    /// `AgentUnreachable` when nothing answered.
    async fn send_message(&self, tab: TabId, request: &AgentRequest) -> Result<AgentResponse>;

    /// Load `scripts`, in order, into every frame of `tab`.
    async fn inject_agent(&self, tab: TabId, scripts: &[String]) -> Result<()>;
}

/// Fire-and-forget user-visible alerts.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

/// Writes notifications to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) {
        info!("{}: {}", title, message);
    }
}

/// Keeps every notification, for inspection.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: RwLock<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// (title, message) pairs in the order sent.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.read().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.read().iter().map(|(_, m)| m.clone()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, message: &str) {
        self.sent
            .write()
            .push((title.to_string(), message.to_string()));
    }
}
