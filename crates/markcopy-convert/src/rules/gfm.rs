//! GitHub-flavoured extensions: tables, strikethrough, task lists and
//! highlighted code blocks.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

use super::code::fenced_block;
use super::Rule;
use crate::dom;
use crate::options::MarkdownOptions;

static HIGHLIGHT_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"highlight-(?:text|source)-([a-z0-9]+)").unwrap());

pub fn rules() -> Vec<Rule> {
    vec![
        highlighted_code_block(),
        Rule::new(
            "strikethrough",
            |el| dom::is_named(el, &["del", "s", "strike"]),
            |content, _, _| format!("~~{content}~~"),
        ),
        Rule::new("taskListItem", is_task_checkbox, |_, el, _| {
            if el.value().attr("checked").is_some() {
                "[x] ".to_string()
            } else {
                "[ ] ".to_string()
            }
        }),
        // Tables without a heading row cannot be expressed in GFM.
        Rule::new(
            "keptTable",
            |el| dom::name(el) == "table" && !first_row(el).is_some_and(is_heading_row),
            |_, el, _| format!("\n\n{}\n\n", el.html()),
        ),
        Rule::new("tableCell", |el| dom::is_named(el, &["th", "td"]), |content, el, _| {
            let text = content.trim().replace('\n', " ").replace('|', "\\|");
            cell(&text, el)
        }),
        Rule::new("tableRow", |el| dom::name(el) == "tr", table_row),
        Rule::new(
            "tableSection",
            |el| dom::is_named(el, &["thead", "tbody", "tfoot"]),
            |content, _, _| content.to_string(),
        ),
        Rule::new("table", |el| dom::name(el) == "table", |content, _, _| {
            format!("\n\n{}\n\n", content.replace("\n\n", "\n"))
        }),
    ]
}

/// `<div class="highlight-source-rust"><pre>...</pre></div>`
fn highlighted_code_block() -> Rule {
    Rule::new(
        "highlightedCodeBlock",
        |el| {
            dom::name(el) == "div"
                && HIGHLIGHT_CLASS.is_match(dom::class_attr(el))
                && dom::first_element_child(el).is_some_and(|child| dom::name(child) == "pre")
        },
        |_, el, options| {
            let language = HIGHLIGHT_CLASS
                .captures(dom::class_attr(el))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str())
                .unwrap_or("");
            let code = dom::first_element_child(el)
                .map(dom::text_content)
                .unwrap_or_default();
            fenced_block(&code, language, &options.fence)
        },
    )
}

fn is_task_checkbox(el: ElementRef<'_>) -> bool {
    dom::name(el) == "input"
        && el
            .value()
            .attr("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("checkbox"))
        && dom::parent_element(el).is_some_and(|parent| dom::name(parent) == "li")
}

fn cell(content: &str, el: ElementRef<'_>) -> String {
    let prefix = if dom::element_index(el) == 0 { "| " } else { " " };
    format!("{prefix}{content} |")
}

fn table_row(content: &str, el: ElementRef<'_>, _: &MarkdownOptions) -> String {
    if !is_heading_row(el) {
        return format!("\n{content}");
    }
    let border: String = dom::element_children(el)
        .map(|header| {
            let align = dom::attr(header, "align")
                .map(|a| a.to_ascii_lowercase())
                .unwrap_or_default();
            let marker = match align.as_str() {
                "left" => ":--",
                "right" => "--:",
                "center" => ":-:",
                _ => "---",
            };
            cell(marker, header)
        })
        .collect();
    format!("\n{content}\n{border}")
}

fn first_row(table: ElementRef<'_>) -> Option<ElementRef<'_>> {
    dom::find_descendant(table, |d| dom::name(d) == "tr")
}

/// A row inside `<thead>`, or a leading row made only of `<th>` cells.
pub(crate) fn is_heading_row(tr: ElementRef<'_>) -> bool {
    let Some(parent) = dom::parent_element(tr) else {
        return false;
    };
    if dom::name(parent) == "thead" {
        return true;
    }
    let leading = dom::first_element_child(parent).is_some_and(|first| first.id() == tr.id());
    leading
        && (dom::name(parent) == "table" || is_first_tbody(parent))
        && dom::element_children(tr).all(|c| dom::name(c) == "th")
}

fn is_first_tbody(el: ElementRef<'_>) -> bool {
    if dom::name(el) != "tbody" {
        return false;
    }
    match dom::previous_element_sibling(el) {
        None => true,
        Some(prev) => dom::name(prev) == "thead" && dom::text_content(prev).trim().is_empty(),
    }
}
