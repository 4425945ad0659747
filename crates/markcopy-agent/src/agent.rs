//! The per-frame agent runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use markcopy_convert::html_to_markdown;
use markcopy_core::{AgentRequest, AgentResponse, ConversionOptions, Error, Result, SettingsStore};
use tracing::{debug, info, warn};

use crate::clipboard::{copy_to_clipboard, Clipboard};
use crate::frame::Frame;
use crate::locator::{ContentLocator, LocatorConfig};
use crate::readability::ReadabilityExtractor;

/// Page-global marker set by the first agent in a frame.
pub const AGENT_MARKER: &str = "__markdownCopyLoaded";

pub const TOAST_COPIED: &str = "✓ Markdown copied to clipboard!";
pub const TOAST_COPY_FAILED: &str = "✗ Failed to copy to clipboard";
pub const TOAST_NO_SELECTION: &str =
    "⚠️ No selection found. Please select text or enable article extraction.";
pub const TOAST_DURATION: Duration = Duration::from_millis(1800);

/// Outcome of one conversion command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    Copied { markdown: String },
    NothingToCopy,
}

/// Content Agent for one frame.
pub struct ContentAgent {
    frame: Arc<dyn Frame>,
    settings: Arc<dyn SettingsStore>,
    clipboard: Arc<dyn Clipboard>,
    readability: Option<Arc<dyn ReadabilityExtractor>>,
    locator: ContentLocator,
    /// Set once the initialization guard has passed.
    ready: AtomicBool,
}

impl ContentAgent {
    pub fn new(
        frame: Arc<dyn Frame>,
        settings: Arc<dyn SettingsStore>,
        clipboard: Arc<dyn Clipboard>,
    ) -> Self {
        Self {
            frame,
            settings,
            clipboard,
            readability: None,
            locator: ContentLocator::default(),
            ready: AtomicBool::new(false),
        }
    }

    pub fn with_readability(mut self, extractor: Arc<dyn ReadabilityExtractor>) -> Self {
        self.readability = Some(extractor);
        self
    }

    pub fn with_locator(mut self, config: LocatorConfig) -> Self {
        self.locator = ContentLocator::new(config);
        self
    }

    /// Run the initialization guard. Returns `None` when an agent already
    /// lives in this frame; the duplicate does nothing further.
    pub fn install(self) -> Option<Arc<Self>> {
        if !self.frame.claim_global(AGENT_MARKER) {
            debug!("Agent already installed in {}", self.frame.url());
            return None;
        }
        self.ready.store(true, Ordering::SeqCst);
        info!("Markdown copy agent loaded in {}", self.frame.url());
        Some(Arc::new(self))
    }

    pub fn on_readiness_probe(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Dispatch one protocol message. `None` means no reply: the message
    /// is not for us, or the guard has not passed yet.
    pub async fn handle_message(&self, request: &AgentRequest) -> Option<AgentResponse> {
        if !self.on_readiness_probe() {
            return None;
        }
        match request {
            AgentRequest::Ping => Some(AgentResponse::ready()),
            AgentRequest::CopyMarkdown { source } => {
                debug!("Conversion requested via {}", source);
                Some(self.on_conversion_command().await)
            }
        }
    }

    /// Run a conversion and report it as a protocol status. Never fails:
    /// every error becomes an `error` status.
    pub async fn on_conversion_command(&self) -> AgentResponse {
        let options = self.load_options().await;
        match self.convert_and_copy(&options).await {
            Ok(Conversion::Copied { markdown }) => {
                info!("Copied {} bytes of Markdown", markdown.len());
                self.notify(&options, TOAST_COPIED);
                AgentResponse::ok()
            }
            Ok(Conversion::NothingToCopy) => {
                self.notify(&options, TOAST_NO_SELECTION);
                AgentResponse::ok_with(Error::NoContent.to_string())
            }
            Err(Error::ClipboardWrite(e)) => {
                warn!("Clipboard write failed: {}", e);
                self.notify(&options, TOAST_COPY_FAILED);
                AgentResponse::error(Error::ClipboardWrite(e).to_string())
            }
            Err(e) => {
                warn!("Conversion failed: {}", e);
                self.notify(&options, &format!("✗ Error: {}", e));
                AgentResponse::error(e.to_string())
            }
        }
    }

    /// Locate, convert and write to the clipboard.
    pub async fn convert_and_copy(&self, options: &ConversionOptions) -> Result<Conversion> {
        let Some(html) = self.capture(options) else {
            return Ok(Conversion::NothingToCopy);
        };

        // A wrapper keeps top-level inline nodes in block context.
        let markdown = html_to_markdown(&format!("<div>{}</div>", html), options);
        if markdown.is_empty() {
            return Ok(Conversion::NothingToCopy);
        }

        let path = copy_to_clipboard(self.clipboard.as_ref(), &markdown).await?;
        debug!("Clipboard written via {:?}", path);
        Ok(Conversion::Copied { markdown })
    }

    fn capture(&self, options: &ConversionOptions) -> Option<String> {
        if let Some(fragment) = self.locator.locate(self.frame.as_ref()) {
            if !fragment.html.trim().is_empty() {
                return Some(fragment.html);
            }
        }
        if !options.auto_readability {
            return None;
        }
        let extractor = self.readability.as_ref()?;
        let article = extractor.extract(&self.frame.document_html(), &self.frame.url())?;
        debug!(
            "Falling back to article extraction: {}",
            article.title.as_deref().unwrap_or("untitled")
        );
        Some(article.content).filter(|content| !content.trim().is_empty())
    }

    async fn load_options(&self) -> ConversionOptions {
        match self.settings.conversion_options().await {
            Ok(options) => options,
            Err(e) => {
                warn!("Settings unavailable, using defaults: {}", e);
                ConversionOptions::default()
            }
        }
    }

    fn notify(&self, options: &ConversionOptions, message: &str) {
        if options.notify {
            self.frame.show_toast(message, TOAST_DURATION);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::frame::{Selection, StaticFrame};
    use crate::readability::{Article, ReadabilityExtractor};
    use markcopy_core::{IntentSource, LineBreaks, MemorySettingsStore};

    struct Fixture {
        frame: Arc<StaticFrame>,
        clipboard: Arc<MemoryClipboard>,
        settings: Arc<MemorySettingsStore>,
    }

    impl Fixture {
        fn new(page: &str, clipboard: MemoryClipboard) -> Self {
            Self {
                frame: Arc::new(StaticFrame::new("https://example.com/post", page)),
                clipboard: Arc::new(clipboard),
                settings: Arc::new(MemorySettingsStore::new(ConversionOptions::default())),
            }
        }

        fn agent(&self) -> ContentAgent {
            ContentAgent::new(
                self.frame.clone(),
                self.settings.clone(),
                self.clipboard.clone(),
            )
        }
    }

    struct FixedArticle;

    impl ReadabilityExtractor for FixedArticle {
        fn extract(&self, _: &str, _: &str) -> Option<Article> {
            Some(Article {
                content: "<p>From the article</p>".into(),
                title: None,
            })
        }
    }

    #[tokio::test]
    async fn test_ping_unanswered_before_install() {
        let fixture = Fixture::new("<body><p>x</p></body>", MemoryClipboard::new());
        let agent = fixture.agent();
        assert!(!agent.on_readiness_probe());
        assert!(agent.handle_message(&AgentRequest::Ping).await.is_none());

        let agent = agent.install().unwrap();
        assert_eq!(
            agent.handle_message(&AgentRequest::Ping).await,
            Some(AgentResponse::ready())
        );
    }

    #[test]
    fn test_second_install_is_noop() {
        let fixture = Fixture::new("<body></body>", MemoryClipboard::new());
        assert!(fixture.agent().install().is_some());
        assert!(fixture.agent().install().is_none());
    }

    #[tokio::test]
    async fn test_copies_selection_as_markdown() {
        let fixture = Fixture::new("<body><p>ignored</p></body>", MemoryClipboard::new());
        fixture.frame.select(Selection::new(
            "<h2>Notes</h2><p>Selected <em>text</em> here</p>",
            "Notes Selected text here",
        ));
        let agent = fixture.agent().install().unwrap();

        let response = agent
            .handle_message(&AgentRequest::CopyMarkdown {
                source: IntentSource::Command,
            })
            .await
            .unwrap();
        assert_eq!(response, AgentResponse::ok());
        assert_eq!(
            fixture.clipboard.contents().as_deref(),
            Some("## Notes\n\nSelected *text* here")
        );
        assert_eq!(fixture.frame.last_toast().as_deref(), Some(TOAST_COPIED));
    }

    #[tokio::test]
    async fn test_line_break_option_reaches_converter() {
        let fixture = Fixture::new("<body></body>", MemoryClipboard::new());
        fixture.settings.set(ConversionOptions {
            line_breaks: LineBreaks::OnePerParagraph,
            ..Default::default()
        });
        fixture
            .frame
            .select(Selection::new("<p>first one</p><p>second one</p>", "first one second one"));
        let agent = fixture.agent().install().unwrap();
        agent.on_conversion_command().await;
        assert_eq!(
            fixture.clipboard.contents().as_deref(),
            Some("first one\nsecond one")
        );
    }

    #[tokio::test]
    async fn test_empty_page_reports_benign_noop() {
        let fixture = Fixture::new("<body></body>", MemoryClipboard::new());
        let agent = fixture.agent().install().unwrap();
        let response = agent.on_conversion_command().await;
        assert_eq!(response.status, markcopy_core::AgentStatus::Ok);
        assert_eq!(fixture.frame.last_toast().as_deref(), Some(TOAST_NO_SELECTION));
        assert!(fixture.clipboard.contents().is_none());
    }

    #[tokio::test]
    async fn test_readability_fallback_only_when_enabled() {
        let fixture = Fixture::new("<body></body>", MemoryClipboard::new());
        let agent = fixture
            .agent()
            .with_readability(Arc::new(FixedArticle))
            .install()
            .unwrap();
        agent.on_conversion_command().await;
        assert_eq!(fixture.clipboard.contents().as_deref(), Some("From the article"));

        let fixture = Fixture::new("<body></body>", MemoryClipboard::new());
        fixture.settings.set(ConversionOptions {
            auto_readability: false,
            ..Default::default()
        });
        let agent = fixture
            .agent()
            .with_readability(Arc::new(FixedArticle))
            .install()
            .unwrap();
        agent.on_conversion_command().await;
        assert!(fixture.clipboard.contents().is_none());
    }

    #[tokio::test]
    async fn test_clipboard_failure_is_reported_not_raised() {
        let fixture = Fixture::new("<body><p>Some page text</p></body>", MemoryClipboard::denied());
        let agent = fixture.agent().install().unwrap();
        let response = agent.on_conversion_command().await;
        assert_eq!(response.status, markcopy_core::AgentStatus::Error);
        assert_eq!(fixture.frame.last_toast().as_deref(), Some(TOAST_COPY_FAILED));
    }

    #[tokio::test]
    async fn test_toasts_respect_notify() {
        let fixture = Fixture::new("<body><p>Some page text</p></body>", MemoryClipboard::new());
        fixture.settings.set(ConversionOptions {
            notify: false,
            ..Default::default()
        });
        let agent = fixture.agent().install().unwrap();
        assert_eq!(agent.on_conversion_command().await, AgentResponse::ok());
        assert!(fixture.frame.toasts().is_empty());
        assert_eq!(fixture.clipboard.contents().as_deref(), Some("Some page text"));
    }
}
