//! Element classification and tree helpers over `scraper` element refs.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Node};

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "audio", "blockquote", "body", "canvas", "center", "dd", "dir",
    "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "frameset", "h1", "h2",
    "h3", "h4", "h5", "h6", "header", "hgroup", "hr", "html", "isindex", "li", "main", "menu",
    "nav", "noframes", "noscript", "ol", "output", "p", "pre", "section", "table", "tbody", "td",
    "tfoot", "th", "thead", "tr", "ul",
];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

const MEANINGFUL_WHEN_BLANK: &[&str] = &[
    "a", "table", "thead", "tbody", "tfoot", "th", "td", "iframe", "script", "audio", "video",
];

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\r\n\x0C]+").unwrap());

/// A child of an element: text or element. Comments and other nodes are skipped.
#[derive(Clone, Copy)]
pub enum Child<'a> {
    Text(&'a str),
    Element(ElementRef<'a>),
}

/// Text and element children of `el`, in document order.
pub fn children(el: ElementRef<'_>) -> Vec<Child<'_>> {
    el.children()
        .filter_map(|node| match node.value() {
            Node::Text(text) => Some(Child::Text(&**text)),
            Node::Element(_) => ElementRef::wrap(node).map(Child::Element),
            _ => None,
        })
        .collect()
}

pub fn name<'a>(el: ElementRef<'a>) -> &'a str {
    el.value().name()
}

pub fn is_named(el: ElementRef<'_>, names: &[&str]) -> bool {
    names.contains(&name(el))
}

pub fn is_block(el: ElementRef<'_>) -> bool {
    is_named(el, BLOCK_ELEMENTS)
}

pub fn is_void(el: ElementRef<'_>) -> bool {
    is_named(el, VOID_ELEMENTS)
}

/// Non-empty attribute value.
pub fn attr<'a>(el: ElementRef<'a>, key: &str) -> Option<&'a str> {
    el.value().attr(key).filter(|v| !v.is_empty())
}

pub fn class_attr<'a>(el: ElementRef<'a>) -> &'a str {
    el.value().attr("class").unwrap_or("")
}

/// Substring match on the raw class attribute.
pub fn class_contains(el: ElementRef<'_>, needle: &str) -> bool {
    class_attr(el).contains(needle)
}

/// Exact class token match.
pub fn has_class(el: ElementRef<'_>, token: &str) -> bool {
    el.value().classes().any(|c| c == token)
}

pub fn text_content(el: ElementRef<'_>) -> String {
    el.text().collect()
}

pub fn parent_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.parent().and_then(ElementRef::wrap)
}

pub fn element_children(el: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    el.children().filter_map(ElementRef::wrap)
}

pub fn first_element_child(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element_children(el).next()
}

/// Position of `el` among its parent's element children.
pub fn element_index(el: ElementRef<'_>) -> usize {
    match parent_element(el) {
        Some(parent) => element_children(parent)
            .position(|sibling| sibling.id() == el.id())
            .unwrap_or(0),
        None => 0,
    }
}

pub fn previous_element_sibling(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.prev_siblings().find_map(ElementRef::wrap)
}

/// First descendant element (excluding `el`) matching `pred`.
pub fn find_descendant<'a, P>(el: ElementRef<'a>, pred: P) -> Option<ElementRef<'a>>
where
    P: Fn(ElementRef<'a>) -> bool,
{
    el.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|d| pred(*d))
}

/// Whether an element contributes nothing: no text, no void or
/// meaningful-when-blank element anywhere inside it.
pub fn is_blank(el: ElementRef<'_>) -> bool {
    if is_void(el) || is_named(el, MEANINGFUL_WHEN_BLANK) {
        return false;
    }
    if !text_content(el).trim().is_empty() {
        return false;
    }
    find_descendant(el, |d| is_void(d) || is_named(d, MEANINGFUL_WHEN_BLANK)).is_none()
}

/// Collapse runs of HTML whitespace to a single space.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").into_owned()
}
