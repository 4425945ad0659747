//! The page seam: everything the agent reads from or does to its frame.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::{Captures, Regex};
use tracing::debug;

use crate::unblock::ListenerFilter;

/// An element start tag. Quoted attribute values may contain `>`.
static START_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"<[A-Za-z][A-Za-z0-9-]*(?:\s+[^\s"'<>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'<>`]+))?)*\s*/?>"#,
    )
    .unwrap()
});

/// A live selection: its HTML and rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub html: String,
    pub text: String,
}

impl Selection {
    pub fn new(html: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            text: text.into(),
        }
    }

    /// Rendered length, ignoring surrounding whitespace.
    pub fn text_len(&self) -> usize {
        self.text.trim().chars().count()
    }
}

/// A transient on-page message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub duration: Duration,
}

/// One top-level frame of a loaded page.
///
/// Methods take `&self`: a frame is shared between the agent and the page
/// and owns its own interior state.
pub trait Frame: Send + Sync {
    fn url(&self) -> String;

    /// Serialised document. Callers get a copy; nothing they do to it
    /// reaches the live page.
    fn document_html(&self) -> String;

    /// Current non-collapsed selection, if any.
    fn selection(&self) -> Option<Selection>;

    /// Replace the live selection with one spanning an element's contents.
    fn force_selection(&self, selection: Selection);

    /// Drop the live selection after `delay`.
    fn clear_selection_after(&self, delay: Duration);

    fn has_style(&self, id: &str) -> bool;

    /// Add a style element with a fixed id that removes itself after `ttl`.
    fn inject_style(&self, id: &str, css: &str, ttl: Duration);

    /// Strip the named inline handler attributes everywhere. Returns how
    /// many were removed.
    fn clear_inline_handlers(&self, attributes: &[&str]) -> usize;

    /// Route future listener registrations through `filter`.
    fn install_listener_filter(&self, filter: ListenerFilter);

    fn show_toast(&self, message: &str, duration: Duration);

    /// Check-and-set a page-global marker. True when this call set it.
    fn claim_global(&self, marker: &str) -> bool;
}

#[derive(Default)]
struct FrameState {
    document: String,
    selection: Option<Selection>,
    /// When the current selection goes away, if scheduled.
    selection_clears_at: Option<Instant>,
    /// Injected style elements by id: css and removal time.
    styles: HashMap<String, (String, Instant)>,
    listener_filter: Option<ListenerFilter>,
    /// Registered (event type, handler source) pairs.
    listeners: Vec<(String, String)>,
    toasts: Vec<Toast>,
    globals: HashSet<String>,
}

/// In-memory frame over a fixed document. Timed cleanups are applied
/// lazily on the next read.
pub struct StaticFrame {
    url: String,
    state: RwLock<FrameState>,
}

impl StaticFrame {
    pub fn new(url: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: RwLock::new(FrameState {
                document: document.into(),
                ..Default::default()
            }),
        }
    }

    /// Simulate the user selecting something.
    pub fn select(&self, selection: Selection) {
        let mut state = self.state.write();
        state.selection = Some(selection);
        state.selection_clears_at = None;
    }

    /// Simulate the page registering an event listener. Returns false when
    /// the installed filter refused it.
    pub fn add_event_listener(&self, event: &str, handler_source: &str) -> bool {
        let mut state = self.state.write();
        if let Some(filter) = &state.listener_filter {
            if filter.should_block(event, handler_source) {
                debug!("Blocked {} listener registration", event);
                return false;
            }
        }
        state
            .listeners
            .push((event.to_string(), handler_source.to_string()));
        true
    }

    pub fn listeners(&self) -> Vec<(String, String)> {
        self.state.read().listeners.clone()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.state.read().toasts.clone()
    }

    pub fn last_toast(&self) -> Option<String> {
        self.state.read().toasts.last().map(|t| t.message.clone())
    }

    /// Simulate navigation: the document changes and page globals reset.
    pub fn navigate(&self, document: impl Into<String>) {
        let mut state = self.state.write();
        *state = FrameState {
            document: document.into(),
            ..Default::default()
        };
    }
}

impl Frame for StaticFrame {
    fn url(&self) -> String {
        self.url.clone()
    }

    fn document_html(&self) -> String {
        self.state.read().document.clone()
    }

    fn selection(&self) -> Option<Selection> {
        let mut state = self.state.write();
        if state
            .selection_clears_at
            .is_some_and(|at| Instant::now() >= at)
        {
            state.selection = None;
            state.selection_clears_at = None;
        }
        state.selection.clone()
    }

    fn force_selection(&self, selection: Selection) {
        let mut state = self.state.write();
        state.selection = Some(selection);
        state.selection_clears_at = None;
    }

    fn clear_selection_after(&self, delay: Duration) {
        self.state.write().selection_clears_at = Some(Instant::now() + delay);
    }

    fn has_style(&self, id: &str) -> bool {
        let mut state = self.state.write();
        let now = Instant::now();
        state.styles.retain(|_, (_, removed_at)| *removed_at > now);
        state.styles.contains_key(id)
    }

    fn inject_style(&self, id: &str, css: &str, ttl: Duration) {
        self.state
            .write()
            .styles
            .insert(id.to_string(), (css.to_string(), Instant::now() + ttl));
    }

    fn clear_inline_handlers(&self, attributes: &[&str]) -> usize {
        if attributes.is_empty() {
            return 0;
        }
        let names: Vec<String> = attributes.iter().map(|a| regex::escape(a)).collect();
        let pattern = format!(
            r#"(?i)\s(?:{})\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#,
            names.join("|")
        );
        let Ok(handler_attr) = Regex::new(&pattern) else {
            return 0;
        };

        // Only start tags carry attributes; text that merely shows markup
        // is escaped and never matches.
        let mut state = self.state.write();
        let mut removed = 0;
        let rewritten = START_TAG
            .replace_all(&state.document, |caps: &Captures<'_>| {
                let tag = &caps[0];
                let hits = handler_attr.find_iter(tag).count();
                if hits == 0 {
                    return tag.to_string();
                }
                removed += hits;
                handler_attr.replace_all(tag, "").into_owned()
            })
            .into_owned();
        if removed > 0 {
            state.document = rewritten;
        }
        removed
    }

    fn install_listener_filter(&self, filter: ListenerFilter) {
        self.state.write().listener_filter = Some(filter);
    }

    fn show_toast(&self, message: &str, duration: Duration) {
        self.state.write().toasts.push(Toast {
            message: message.to_string(),
            duration,
        });
    }

    fn claim_global(&self, marker: &str) -> bool {
        self.state.write().globals.insert(marker.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_global_is_check_and_set() {
        let frame = StaticFrame::new("https://example.com", "<body></body>");
        assert!(frame.claim_global("agent"));
        assert!(!frame.claim_global("agent"));
        frame.navigate("<body>next</body>");
        assert!(frame.claim_global("agent"));
    }

    #[test]
    fn test_style_expires() {
        let frame = StaticFrame::new("https://example.com", "<body></body>");
        frame.inject_style("s", "* {}", Duration::from_secs(60));
        assert!(frame.has_style("s"));
        frame.inject_style("t", "* {}", Duration::ZERO);
        assert!(!frame.has_style("t"));
    }

    #[test]
    fn test_clear_inline_handlers() {
        let frame = StaticFrame::new(
            "https://example.com",
            r#"<body oncopy="return false"><div onselectstart='no()' onclick="go()">x</div></body>"#,
        );
        assert_eq!(frame.clear_inline_handlers(&["oncopy", "onselectstart"]), 2);
        let html = frame.document_html();
        assert!(!html.contains("oncopy"));
        assert!(!html.contains("onselectstart"));
        assert!(html.contains("onclick"));
    }

    #[test]
    fn test_handler_text_in_content_survives() {
        let frame = StaticFrame::new(
            "https://example.com",
            concat!(
                r#"<body><pre>&lt;body oncopy="return false"&gt;</pre>"#,
                r#"<p title="a > b" oncopy="return false">Use oncopy="x" sparingly</p></body>"#
            ),
        );
        assert_eq!(frame.clear_inline_handlers(&["oncopy"]), 1);
        let html = frame.document_html();
        assert!(html.contains(r#"<pre>&lt;body oncopy="return false"&gt;</pre>"#));
        assert!(html.contains(r#"<p title="a > b">Use oncopy="x" sparingly</p>"#));
    }

    #[test]
    fn test_scheduled_selection_clear() {
        let frame = StaticFrame::new("https://example.com", "<body></body>");
        frame.force_selection(Selection::new("<p>x</p>", "x"));
        assert!(frame.selection().is_some());
        frame.clear_selection_after(Duration::ZERO);
        assert!(frame.selection().is_none());
    }
}
