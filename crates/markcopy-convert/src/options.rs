//! Markdown output style.

use markcopy_core::{ConversionOptions, LineBreaks};

/// Output conventions for the baseline rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownOptions {
    pub bullet_list_marker: char,
    pub em_delimiter: char,
    pub strong_delimiter: String,
    pub fence: String,
    pub hr: String,
    /// Emitted before the newline of a hard line break.
    pub br: String,
    pub line_breaks: LineBreaks,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            bullet_list_marker: '-',
            em_delimiter: '*',
            strong_delimiter: "**".into(),
            fence: "```".into(),
            hr: "* * *".into(),
            br: "  ".into(),
            line_breaks: LineBreaks::Soft,
        }
    }
}

impl From<&ConversionOptions> for MarkdownOptions {
    fn from(settings: &ConversionOptions) -> Self {
        Self {
            line_breaks: settings.line_breaks,
            ..Self::default()
        }
    }
}
