//! Depth-first conversion driver.

use markcopy_core::ConversionOptions;
use scraper::{ElementRef, Html};
use tracing::debug;

use crate::dom::{self, Child};
use crate::escape::escape_markdown;
use crate::options::MarkdownOptions;
use crate::rules::RuleSet;

/// Where in the tree the walk currently is.
#[derive(Debug, Clone, Copy, Default)]
struct Context {
    in_pre: bool,
    in_code: bool,
}

/// HTML to Markdown converter. Holds no per-conversion state, so the same
/// input always yields the same output.
#[derive(Debug)]
pub struct MarkdownConverter {
    rules: RuleSet,
    options: MarkdownOptions,
}

impl MarkdownConverter {
    pub fn new(options: MarkdownOptions) -> Self {
        Self {
            rules: RuleSet::standard(&options),
            options,
        }
    }

    pub fn from_settings(settings: &ConversionOptions) -> Self {
        Self::new(MarkdownOptions::from(settings))
    }

    /// Convert an HTML fragment to Markdown.
    pub fn convert(&self, html: &str) -> String {
        let fragment = Html::parse_fragment(html);
        let output = self.process(fragment.root_element(), Context::default());
        let markdown = post_process(&output);
        debug!(
            "Converted {} bytes of HTML to {} bytes of Markdown",
            html.len(),
            markdown.len()
        );
        markdown
    }

    fn process(&self, parent: ElementRef<'_>, ctx: Context) -> String {
        let children = dom::children(parent);
        let mut output = String::new();
        for (i, child) in children.iter().enumerate() {
            let replacement = match *child {
                Child::Text(text) => text_replacement(text, parent, children.get(i + 1), &output, ctx),
                Child::Element(el) => self.element_replacement(el, &output, ctx),
            };
            join(&mut output, &replacement);
        }
        output
    }

    fn element_replacement(&self, el: ElementRef<'_>, output: &str, ctx: Context) -> String {
        let block = dom::is_block(el);
        if dom::is_blank(el) {
            return if block { "\n\n".into() } else { String::new() };
        }

        let child_ctx = Context {
            in_pre: ctx.in_pre || dom::name(el) == "pre",
            in_code: ctx.in_code || dom::is_named(el, &["pre", "code"]),
        };
        let content = self.process(el, child_ctx);

        // Inline elements hand their edge whitespace to the surrounding text.
        let (leading, core, trailing) = if block || ctx.in_pre {
            ("", content.as_str(), "")
        } else {
            split_flanking(&content)
        };
        let leading = if output.ends_with(char::is_whitespace) {
            ""
        } else {
            leading
        };

        let replacement = match self.rules.find(el) {
            Some(rule) => rule.replace(core, el, &self.options),
            None if block => format!("\n\n{core}\n\n"),
            None => core.to_string(),
        };
        format!("{leading}{replacement}{trailing}")
    }
}

fn text_replacement(
    text: &str,
    parent: ElementRef<'_>,
    next: Option<&Child<'_>>,
    output: &str,
    ctx: Context,
) -> String {
    if ctx.in_pre {
        return text.to_string();
    }

    let collapsed = dom::collapse_whitespace(text);
    let mut value = collapsed.as_str();
    if (output.is_empty() && dom::is_block(parent)) || output.ends_with(char::is_whitespace) {
        value = value.trim_start();
    }
    let next_is_block = match next {
        Some(Child::Element(el)) => dom::is_block(*el),
        Some(Child::Text(_)) => false,
        None => dom::is_block(parent),
    };
    if next_is_block {
        value = value.trim_end();
    }

    if ctx.in_code {
        value.to_string()
    } else {
        escape_markdown(value)
    }
}

fn split_flanking(content: &str) -> (&str, &str, &str) {
    let body = content.trim_start();
    let leading = &content[..content.len() - body.len()];
    let core = body.trim_end();
    let trailing = &body[core.len()..];
    (leading, core, trailing)
}

/// Append `replacement`, merging the newlines at the seam: the larger run
/// wins, capped at one blank line.
fn join(output: &mut String, replacement: &str) {
    let kept = output.trim_end_matches('\n').len();
    let trailing = output.len() - kept;
    let body = replacement.trim_start_matches('\n');
    let leading = replacement.len() - body.len();

    output.truncate(kept);
    output.push_str(&"\n".repeat(trailing.max(leading).min(2)));
    output.push_str(body);
}

fn post_process(output: &str) -> String {
    output
        .trim_start_matches(['\t', '\r', '\n'])
        .trim_end()
        .to_string()
}
