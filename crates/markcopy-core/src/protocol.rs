//! Message types exchanged between the coordinator, the settings panel and
//! the per-page agent. Field names match the extension's JSON wire format.

use serde::{Deserialize, Serialize};

/// Context-menu entry registered by the coordinator.
pub const CONTEXT_MENU_ID: &str = "copy-as-markdown";

/// Context-menu title shown to the user.
pub const CONTEXT_MENU_TITLE: &str = "Copy as Markdown";

/// Keyboard command bound to a conversion.
pub const COPY_COMMAND: &str = "copy_markdown";

/// Browser tab identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u32);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a conversion request originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntentSource {
    ContextMenu,
    Command,
    Popup,
}

impl IntentSource {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ContextMenu => "contextMenu",
            Self::Command => "command",
            Self::Popup => "popup",
        }
    }
}

impl std::fmt::Display for IntentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A "convert now" request, created at the trigger point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionIntent {
    pub source: IntentSource,
}

impl ConversionIntent {
    pub fn new(source: IntentSource) -> Self {
        Self { source }
    }

    /// The command message carrying this intent to the agent.
    pub fn to_request(&self) -> AgentRequest {
        AgentRequest::CopyMarkdown {
            source: self.source,
        }
    }
}

/// Coordinator → agent messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentRequest {
    /// Readiness probe.
    Ping,
    /// Run a conversion and write the result to the clipboard.
    CopyMarkdown { source: IntentSource },
}

/// Agent reply status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Ready,
    Ok,
    Error,
}

/// Agent → coordinator reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AgentResponse {
    pub fn ready() -> Self {
        Self {
            status: AgentStatus::Ready,
            message: None,
        }
    }

    pub fn ok() -> Self {
        Self {
            status: AgentStatus::Ok,
            message: None,
        }
    }

    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            status: AgentStatus::Ok,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: AgentStatus::Error,
            message: Some(message.into()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == AgentStatus::Ready
    }
}

/// Settings panel → coordinator messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinatorRequest {
    CopyFromPopup,
}

/// Reply sent back on the settings panel's open callback channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestResult {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}
