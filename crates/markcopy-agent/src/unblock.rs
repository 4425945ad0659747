//! Selection unblock: undo the usual copy-protection tricks before reading
//! the page. Best effort only; a determined page can still win.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::frame::Frame;

/// Id of the injected override style.
pub const UNBLOCK_STYLE_ID: &str = "markdown-copy-enable-selection";

pub const UNBLOCK_CSS: &str = "\
* {
  -webkit-user-select: text !important;
  -moz-user-select: text !important;
  -ms-user-select: text !important;
  user-select: text !important;
  -webkit-touch-callout: default !important;
}
body {
  -webkit-user-select: text !important;
  -moz-user-select: text !important;
  -ms-user-select: text !important;
  user-select: text !important;
}
";

/// Event types pages block to prevent copying.
pub const BLOCKING_EVENTS: &[&str] = &["copy", "cut", "selectstart", "contextmenu"];

/// Inline handler attributes cleared everywhere in the document.
pub const BLOCKING_HANDLER_ATTRIBUTES: &[&str] =
    &["oncopy", "oncut", "onselectstart", "oncontextmenu"];

static BLOCKING_SOURCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"preventDefault\s*\(|stopPropagation\s*\(|stopImmediatePropagation\s*\(|returnValue\s*=\s*false|return\s+false",
    )
    .unwrap()
});

/// Refuses listener registrations for blocking event types whose handler
/// source looks like it cancels the event.
#[derive(Debug, Clone)]
pub struct ListenerFilter {
    events: Vec<String>,
}

impl Default for ListenerFilter {
    fn default() -> Self {
        Self {
            events: BLOCKING_EVENTS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl ListenerFilter {
    pub fn should_block(&self, event: &str, handler_source: &str) -> bool {
        self.events.iter().any(|e| e.eq_ignore_ascii_case(event))
            && BLOCKING_SOURCE.is_match(handler_source)
    }
}

/// Apply every unblock step to `frame`. The style is only added when
/// absent and removes itself after `style_ttl`.
pub fn enable_selection(frame: &dyn Frame, style_ttl: Duration) {
    if !frame.has_style(UNBLOCK_STYLE_ID) {
        frame.inject_style(UNBLOCK_STYLE_ID, UNBLOCK_CSS, style_ttl);
    }
    let cleared = frame.clear_inline_handlers(BLOCKING_HANDLER_ATTRIBUTES);
    frame.install_listener_filter(ListenerFilter::default());
    debug!("Selection unblock applied: {} inline handlers cleared", cleared);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::StaticFrame;

    #[test]
    fn test_filter_heuristic() {
        let filter = ListenerFilter::default();
        assert!(filter.should_block("copy", "function (e) { e.preventDefault(); }"));
        assert!(filter.should_block("contextmenu", "() => { return false; }"));
        assert!(filter.should_block("selectstart", "e => { e.returnValue = false }"));
        assert!(filter.should_block("CUT", "e => e.stopImmediatePropagation()"));
        assert!(!filter.should_block("copy", "e => track(e)"));
        assert!(!filter.should_block("click", "e => e.preventDefault()"));
    }

    #[test]
    fn test_enable_selection_is_repeatable() {
        let frame = StaticFrame::new(
            "https://example.com",
            r#"<body oncontextmenu="return false"><p>text</p></body>"#,
        );
        enable_selection(&frame, Duration::from_secs(5));
        enable_selection(&frame, Duration::from_secs(5));
        assert!(frame.has_style(UNBLOCK_STYLE_ID));
        assert!(!frame.document_html().contains("oncontextmenu"));
        assert!(!frame.add_event_listener("copy", "e => e.preventDefault()"));
        assert!(frame.add_event_listener("copy", "e => log(e)"));
        assert_eq!(frame.listeners().len(), 1);
    }
}
