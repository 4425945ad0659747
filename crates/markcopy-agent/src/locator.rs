//! Content Locator: decides which HTML gets converted.
//!
//! Order: unblock the page, then a substantial user selection, then the
//! site-aware selector list, then a scan of content-like containers, then
//! the whole body. Whatever element wins is forced into the live selection
//! and read back, so every path yields selection-shaped HTML.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::frame::{Frame, Selection};
use crate::unblock::enable_selection;

/// Most specific first.
const SITE_SELECTORS: &[&str] = &[
    "#mw-content-text .mw-parser-output",
    "#readme .markdown-body",
    "article .markdown-body",
    ".markdown-body",
    "[itemprop=\"articleBody\"]",
    ".post-content",
    ".article-content",
    ".article-body",
    ".entry-content",
    ".story-body",
    "#content article",
    "main article",
    "article",
    "[role=\"main\"]",
    "main",
];

const SCANNED_CONTAINERS: &str = "article, main, section, div";

const NON_RENDERED: &[&str] = &["script", "style", "noscript", "template"];

static PARSED_SITE_SELECTORS: Lazy<Vec<(&'static str, Selector)>> = Lazy::new(|| {
    SITE_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok().map(|selector| (*s, selector)))
        .collect()
});

static CONTENT_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)article|content|post|entry|story|main|body|text").unwrap());

static EXCLUDED_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:^|[\s_-])(?:nav|navbar|navigation|menu|sidebar|footer|header|ads?|advert\w*|sponsor\w*|promo\w*|banner|comments?|share|social|related)(?:$|[\s_-])",
    )
    .unwrap()
});

/// Locator thresholds and cleanup delays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// A selection must be longer than this to count.
    pub min_selection_chars: usize,
    /// A site-selector match must be longer than this.
    pub min_candidate_chars: usize,
    /// A scanned container must be longer than this.
    pub min_scan_chars: usize,
    pub forced_selection_clear_ms: u64,
    pub unblock_style_ttl_ms: u64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            min_selection_chars: 10,
            min_candidate_chars: 200,
            min_scan_chars: 500,
            forced_selection_clear_ms: 100,
            unblock_style_ttl_ms: 5000,
        }
    }
}

/// How a fragment was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentOrigin {
    Selection,
    SiteSelector(&'static str),
    Scan,
    Body,
}

/// HTML chosen for conversion.
#[derive(Debug, Clone)]
pub struct CapturedFragment {
    pub html: String,
    pub origin: FragmentOrigin,
}

#[derive(Debug, Clone, Default)]
pub struct ContentLocator {
    config: LocatorConfig,
}

impl ContentLocator {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    /// Find the fragment to convert. `None` only when the page has no
    /// rendered text at all.
    pub fn locate(&self, frame: &dyn Frame) -> Option<CapturedFragment> {
        enable_selection(
            frame,
            Duration::from_millis(self.config.unblock_style_ttl_ms),
        );

        if let Some(selection) = frame.selection() {
            let chars = selection.text_len();
            if chars > self.config.min_selection_chars {
                debug!("Using user selection ({} chars)", chars);
                return Some(CapturedFragment {
                    html: selection.html,
                    origin: FragmentOrigin::Selection,
                });
            }
            debug!(
                "Ignoring selection of {} chars (minimum {})",
                chars, self.config.min_selection_chars
            );
        }

        let document = Html::parse_document(&frame.document_html());
        let (element, origin) = self.discover(&document)?;
        info!("Content located via {:?}", origin);

        let text = rendered_text(element);
        frame.force_selection(Selection::new(element.inner_html(), text));
        let html = frame
            .selection()
            .map(|s| s.html)
            .unwrap_or_else(|| element.inner_html());
        frame.clear_selection_after(Duration::from_millis(
            self.config.forced_selection_clear_ms,
        ));

        Some(CapturedFragment { html, origin })
    }

    /// Forced content discovery over a parsed document.
    fn discover<'a>(&self, document: &'a Html) -> Option<(ElementRef<'a>, FragmentOrigin)> {
        for (pattern, selector) in PARSED_SITE_SELECTORS.iter() {
            let hit = document
                .select(selector)
                .find(|el| rendered_len(*el) > self.config.min_candidate_chars);
            if let Some(el) = hit {
                return Some((el, FragmentOrigin::SiteSelector(*pattern)));
            }
        }

        if let Some(el) = self.scan(document) {
            return Some((el, FragmentOrigin::Scan));
        }

        let body = Selector::parse("body").ok()?;
        document
            .select(&body)
            .next()
            .filter(|el| rendered_len(*el) > 0)
            .map(|el| (el, FragmentOrigin::Body))
    }

    /// Longest content-like container above the scan threshold.
    fn scan<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        let containers = Selector::parse(SCANNED_CONTAINERS).ok()?;
        let mut best: Option<(usize, ElementRef<'a>)> = None;
        for el in document.select(&containers) {
            if !is_content_like(el) || is_excluded(el) {
                continue;
            }
            let len = rendered_len(el);
            if len <= self.config.min_scan_chars {
                continue;
            }
            if best.as_ref().map_or(true, |(best_len, _)| len > *best_len) {
                best = Some((len, el));
            }
        }
        best.map(|(_, el)| el)
    }
}

fn hints(el: ElementRef<'_>) -> String {
    let value = el.value();
    format!(
        "{} {}",
        value.attr("class").unwrap_or(""),
        value.id().unwrap_or("")
    )
}

fn is_content_like(el: ElementRef<'_>) -> bool {
    matches!(el.value().name(), "article" | "main")
        || el.value().attr("role") == Some("main")
        || CONTENT_HINT.is_match(&hints(el))
}

fn is_excluded(el: ElementRef<'_>) -> bool {
    el.value().name() == "nav"
        || EXCLUDED_HINT.is_match(&hints(el))
        || EXCLUDED_HINT.is_match(el.value().attr("role").unwrap_or(""))
}

/// Text a reader would see: script-like subtrees are skipped.
pub fn rendered_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(el, &mut out);
    out
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&**text),
            Node::Element(element) if !NON_RENDERED.contains(&element.name()) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

/// Rendered length with whitespace runs counted once.
pub fn rendered_len(el: ElementRef<'_>) -> usize {
    rendered_text(el)
        .split_whitespace()
        .map(|word| word.chars().count() + 1)
        .sum::<usize>()
        .saturating_sub(1)
}
