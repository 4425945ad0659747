//! Baseline rules: paragraphs, headings, lists, quotes, links, emphasis,
//! inline code, images.

use scraper::ElementRef;

use super::{math, Rule};
use crate::dom;
use crate::options::MarkdownOptions;

/// Baseline rules in order. Images are ordered separately, between the
/// documentation-site math rule and the other math dialects.
pub fn rules() -> Vec<Rule> {
    vec![
        Rule::new("paragraph", |el| dom::name(el) == "p", |content, _, _| {
            format!("\n\n{}\n\n", content.trim())
        }),
        Rule::new("lineBreak", |el| dom::name(el) == "br", |_, _, options| {
            format!("{}\n", options.br)
        }),
        Rule::new("heading", |el| heading_level(el).is_some(), heading),
        Rule::new("blockquote", |el| dom::name(el) == "blockquote", blockquote),
        Rule::new("list", |el| dom::is_named(el, &["ul", "ol"]), list),
        Rule::new("listItem", |el| dom::name(el) == "li", list_item),
        Rule::new("horizontalRule", |el| dom::name(el) == "hr", |_, _, options| {
            format!("\n\n{}\n\n", options.hr)
        }),
        Rule::new(
            "inlineLink",
            |el| dom::name(el) == "a" && dom::attr(el, "href").is_some(),
            inline_link,
        ),
        Rule::new("emphasis", |el| dom::is_named(el, &["em", "i"]), |content, _, options| {
            if content.trim().is_empty() {
                return String::new();
            }
            format!("{d}{content}{d}", d = options.em_delimiter)
        }),
        Rule::new("strong", |el| dom::is_named(el, &["strong", "b"]), |content, _, options| {
            if content.trim().is_empty() {
                return String::new();
            }
            format!("{d}{content}{d}", d = options.strong_delimiter)
        }),
        Rule::new("code", |el| dom::name(el) == "code", inline_code),
        Rule::new(
            "remove",
            |el| dom::is_named(el, &["script", "style", "noscript", "template", "head", "title"]),
            |_, _, _| String::new(),
        ),
    ]
}

/// One paragraph per line, no blank line between paragraphs.
pub fn single_line_paragraph() -> Rule {
    Rule::new("singleLineParagraph", |el| dom::name(el) == "p", |content, _, _| {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed}\n")
        }
    })
}

/// `![alt](src)`, alt falling back to title. Rendered formula images are
/// dropped: their LaTeX is emitted by the math rules instead.
pub fn image() -> Rule {
    Rule::new("image", |el| dom::name(el) == "img", |_, el, _| {
        let src = dom::attr(el, "src").unwrap_or("");
        let alt = dom::attr(el, "alt")
            .or_else(|| dom::attr(el, "title"))
            .unwrap_or("");
        if math::is_math_image(alt, src) || src.is_empty() {
            return String::new();
        }
        format!("![{}]({})", alt.replace(']', "\\]"), src)
    })
}

fn heading_level(el: ElementRef<'_>) -> Option<usize> {
    match dom::name(el) {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn heading(content: &str, el: ElementRef<'_>, _: &MarkdownOptions) -> String {
    let level = heading_level(el).unwrap_or(1);
    let text = content.trim().replace('\n', " ");
    format!("\n\n{} {}\n\n", "#".repeat(level), text)
}

fn blockquote(content: &str, _: ElementRef<'_>, _: &MarkdownOptions) -> String {
    let quoted: Vec<String> = content
        .trim_matches('\n')
        .lines()
        .map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect();
    format!("\n\n{}\n\n", quoted.join("\n"))
}

fn list(content: &str, el: ElementRef<'_>, _: &MarkdownOptions) -> String {
    let nested_last = dom::parent_element(el).is_some_and(|parent| {
        dom::name(parent) == "li"
            && dom::element_children(parent)
                .last()
                .is_some_and(|last| last.id() == el.id())
    });
    if nested_last {
        format!("\n{content}")
    } else {
        format!("\n\n{content}\n\n")
    }
}

fn list_item(content: &str, el: ElementRef<'_>, options: &MarkdownOptions) -> String {
    let prefix = match dom::parent_element(el) {
        Some(parent) if dom::name(parent) == "ol" => {
            let start = dom::attr(parent, "start")
                .and_then(|s| s.trim().parse::<i64>().ok())
                .unwrap_or(1);
            let index = dom::element_children(parent)
                .filter(|sibling| dom::name(*sibling) == "li")
                .position(|sibling| sibling.id() == el.id())
                .unwrap_or(0);
            format!("{}. ", start.saturating_add(index as i64))
        }
        _ => format!("{} ", options.bullet_list_marker),
    };

    let indent = " ".repeat(prefix.len());
    let body: Vec<String> = content
        .trim_start_matches('\n')
        .trim_end()
        .lines()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 || line.is_empty() {
                line.to_string()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect();
    format!("{prefix}{}\n", body.join("\n"))
}

fn inline_link(content: &str, el: ElementRef<'_>, _: &MarkdownOptions) -> String {
    let href = dom::attr(el, "href")
        .unwrap_or("")
        .replace('(', "\\(")
        .replace(')', "\\)");
    let title = dom::attr(el, "title")
        .map(|t| format!(" \"{}\"", dom::collapse_whitespace(t).replace('"', "\\\"")))
        .unwrap_or_default();
    format!("[{content}]({href}{title})")
}

fn inline_code(content: &str, _: ElementRef<'_>, _: &MarkdownOptions) -> String {
    if content.is_empty() {
        return String::new();
    }
    let code = content.replace("\r\n", " ").replace(['\n', '\r'], " ");

    let mut delimiter = String::from("`");
    while code
        .split(|c: char| c != '`')
        .any(|run| run.len() == delimiter.len())
    {
        delimiter.push('`');
    }

    let trimmed = code.trim_matches(' ');
    let padded = code.starts_with('`')
        || code.ends_with('`')
        || (code.starts_with(' ') && code.ends_with(' ') && !trimmed.is_empty());
    let space = if padded { " " } else { "" };
    format!("{delimiter}{space}{code}{space}{delimiter}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_code_delimiters() {
        let el_html = scraper::Html::parse_fragment("<code>x</code>");
        let el = el_html.root_element();
        let options = MarkdownOptions::default();
        assert_eq!(inline_code("a", el, &options), "`a`");
        assert_eq!(inline_code("a`b", el, &options), "``a`b``");
        assert_eq!(inline_code("`tick", el, &options), "`` `tick ``");
        assert_eq!(inline_code("", el, &options), "");
    }
}
