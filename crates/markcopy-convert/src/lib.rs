//! Markcopy Convert — HTML fragment to Markdown through an ordered rule set.
//!
//! The converter walks a parsed fragment depth-first. For every element the
//! first rule whose filter matches claims it; elements no rule claims fall
//! back to a default that keeps their content (padded when block-level).
//! Rule order is the precedence order: the one-line paragraph override,
//! fenced code, the math dialects, the GFM extension and finally the
//! CommonMark baseline.

pub mod converter;
pub mod dom;
pub mod escape;
pub mod options;
pub mod rules;

pub use converter::MarkdownConverter;
pub use options::MarkdownOptions;
pub use rules::{Rule, RuleSet};

/// Convert an HTML fragment with options derived from the user's settings.
pub fn html_to_markdown(html: &str, settings: &markcopy_core::ConversionOptions) -> String {
    MarkdownConverter::from_settings(settings).convert(html)
}
