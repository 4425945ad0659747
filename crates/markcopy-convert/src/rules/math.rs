//! Math dialects. Every dialect normalises to `$...$` inline or a
//! line-bounded `$$` block.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

use super::Rule;
use crate::dom;

static STYLE_WRAPPER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\{\\(?:displaystyle|textstyle)\s+(.*)\}$").unwrap());

const FORMULA_SCRIPT_TYPES: &[&str] = &["math/tex", "math/asciimath"];

/// Wrap LaTeX in the canonical delimiters.
pub fn wrap_math(latex: &str, display: bool) -> String {
    if display {
        format!("\n\n$$\n{latex}\n$$\n\n")
    } else {
        format!("${latex}$")
    }
}

/// Signatures of images that are rendered formulas rather than pictures.
pub fn is_math_image(alt: &str, src: &str) -> bool {
    alt.contains("\\displaystyle")
        || alt.contains("\\textstyle")
        || alt.contains("\\operatorname")
        || src.contains("/math/render/")
        || src.contains("wikimedia.org/api/rest_v1/media/math/")
}

/// Documentation-site math spans carrying a fallback image whose alt text
/// is the LaTeX source. Emits nothing when no LaTeX can be recovered.
pub fn documentation_math() -> Rule {
    Rule::new(
        "documentationMath",
        |el| {
            dom::name(el) == "span"
                && (dom::class_contains(el, "mwe-math-element")
                    || dom::class_contains(el, "mw-inlineMath")
                    || dom::class_contains(el, "mw-displayMath"))
        },
        |_, el, _| {
            let image = dom::find_descendant(el, |d| {
                dom::name(d) == "img"
                    && (dom::has_class(d, "mwe-math-fallback-image-inline")
                        || dom::has_class(d, "mwe-math-fallback-image-display"))
            });
            let from_image = image
                .and_then(|img| dom::attr(img, "alt"))
                .map(|alt| alt.to_string());
            let latex = match from_image.or_else(|| annotation_text(el)) {
                Some(raw) => strip_style_wrapper(raw.trim()).trim().to_string(),
                None => return String::new(),
            };
            if latex.is_empty() {
                return String::new();
            }

            let display = dom::class_contains(el, "displayMath")
                || image.is_some_and(|img| dom::class_contains(img, "display"))
                || dom::find_descendant(el, |d| {
                    dom::name(d) == "math" && d.value().attr("display") == Some("block")
                })
                .is_some();
            wrap_math(&latex, display)
        },
    )
}

/// Formula containers marked by class (`MathJax`, `mjx-math`) or by a
/// formula script type. Display is inferred from multi-line macros.
pub fn formula_container() -> Rule {
    Rule::new(
        "formulaContainer",
        |el| {
            if !dom::is_named(el, &["span", "script", "mjx-container"]) {
                return false;
            }
            let script_type = el.value().attr("type").unwrap_or("");
            dom::class_contains(el, "mjx-math")
                || dom::class_contains(el, "MathJax")
                || FORMULA_SCRIPT_TYPES.contains(&script_type)
        },
        |content, el, _| {
            let latex = dom::attr(el, "data-latex")
                .or_else(|| dom::attr(el, "data-formula"))
                .or_else(|| dom::attr(el, "data-math"))
                .map(|s| s.to_string())
                .unwrap_or_else(|| dom::text_content(el));
            let formula = latex.trim();
            if formula.is_empty() {
                return content.to_string();
            }
            if formula.starts_with('$') && formula.ends_with('$') {
                return formula.to_string();
            }
            let display = formula.contains("\\\\") || formula.contains("\\begin");
            wrap_math(formula, display)
        },
    )
}

/// KaTeX output: the TeX annotation inside the hidden MathML copy.
pub fn katex() -> Rule {
    Rule::new(
        "katex",
        |el| dom::class_contains(el, "katex"),
        |content, el, _| {
            let display = dom::has_class(el, "katex-display");
            if let Some(latex) = dom::find_descendant(el, |d| dom::name(d) == "annotation") {
                return wrap_math(dom::text_content(latex).trim(), display);
            }
            match dom::attr(el, "data-latex").or_else(|| dom::attr(el, "data-formula")) {
                Some(latex) => wrap_math(latex, display),
                None => content.to_string(),
            }
        },
    )
}

/// Native MathML.
pub fn mathml() -> Rule {
    Rule::new(
        "mathml",
        |el| dom::name(el) == "math",
        |content, el, _| {
            let display = el.value().attr("display") == Some("block");
            if let Some(latex) = annotation_text(el) {
                return wrap_math(latex.trim(), display);
            }
            let rendered = dom::text_content(el);
            let rendered = rendered.trim();
            if rendered.is_empty() {
                return content.to_string();
            }
            wrap_math(rendered, display)
        },
    )
}

/// `<script type="math/tex; mode=display">` and friends.
pub fn script_formula() -> Rule {
    Rule::new(
        "scriptFormula",
        |el| {
            if dom::name(el) != "script" {
                return false;
            }
            let script_type = el.value().attr("type").unwrap_or("");
            FORMULA_SCRIPT_TYPES
                .iter()
                .any(|prefix| script_type.starts_with(prefix))
        },
        |_, el, _| {
            let latex = dom::text_content(el);
            let latex = latex.trim();
            if latex.is_empty() {
                return String::new();
            }
            let display = el
                .value()
                .attr("type")
                .is_some_and(|t| t.replace(' ', "").contains("mode=display"));
            wrap_math(latex, display)
        },
    )
}

/// Chat-interface formula spans, which may carry LaTeX with its own
/// delimiters.
pub fn chat_formula() -> Rule {
    Rule::new(
        "chatFormula",
        |el| {
            dom::name(el) == "span"
                && (el.value().attr("data-language") == Some("math")
                    || dom::class_contains(el, "math-inline")
                    || dom::class_contains(el, "math-display"))
        },
        |content, el, _| {
            let latex = annotation_text(el).unwrap_or_else(|| dom::text_content(el));
            let formula = latex.trim();
            if formula.is_empty() {
                return content.to_string();
            }
            if let Some((inner, display)) = unwrap_delimiters(formula) {
                return wrap_math(inner.trim(), display);
            }
            wrap_math(formula, dom::class_contains(el, "display"))
        },
    )
}

/// TeX annotation text, preferring an explicit `application/x-tex` encoding.
fn annotation_text(el: ElementRef<'_>) -> Option<String> {
    let tex = dom::find_descendant(el, |d| {
        dom::name(d) == "annotation" && d.value().attr("encoding") == Some("application/x-tex")
    });
    tex.or_else(|| dom::find_descendant(el, |d| dom::name(d) == "annotation"))
        .map(|annotation| dom::text_content(annotation).trim().to_string())
        .filter(|latex| !latex.is_empty())
}

/// Remove one `{\displaystyle ...}` / `{\textstyle ...}` wrapper.
fn strip_style_wrapper(latex: &str) -> &str {
    STYLE_WRAPPER
        .captures(latex)
        .and_then(|caps| caps.get(1))
        .map_or(latex, |m| m.as_str())
}

/// Split `$$..$$`, `$..$`, `\[..\]`, `\(..\)` into (inner, display).
fn unwrap_delimiters(formula: &str) -> Option<(&str, bool)> {
    if formula.len() >= 4 && formula.starts_with("$$") && formula.ends_with("$$") {
        return Some((&formula[2..formula.len() - 2], true));
    }
    if formula.len() >= 2 && formula.starts_with('$') && formula.ends_with('$') {
        return Some((&formula[1..formula.len() - 1], false));
    }
    if let Some(inner) = formula.strip_prefix("\\[").and_then(|f| f.strip_suffix("\\]")) {
        return Some((inner, true));
    }
    if let Some(inner) = formula.strip_prefix("\\(").and_then(|f| f.strip_suffix("\\)")) {
        return Some((inner, false));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_style_wrapper_once() {
        assert_eq!(strip_style_wrapper(r"{\displaystyle x^{2}}"), "x^{2}");
        assert_eq!(strip_style_wrapper(r"{\textstyle a+b}"), "a+b");
        assert_eq!(strip_style_wrapper("plain"), "plain");
    }

    #[test]
    fn test_unwrap_delimiters() {
        assert_eq!(unwrap_delimiters("$$a$$"), Some(("a", true)));
        assert_eq!(unwrap_delimiters("$a$"), Some(("a", false)));
        assert_eq!(unwrap_delimiters(r"\[a\]"), Some(("a", true)));
        assert_eq!(unwrap_delimiters(r"\(a\)"), Some(("a", false)));
        assert_eq!(unwrap_delimiters("$"), None);
        assert_eq!(unwrap_delimiters("a"), None);
    }

    #[test]
    fn test_math_image_signatures() {
        assert!(is_math_image(r"{\displaystyle x}", ""));
        assert!(is_math_image("", "https://wikimedia.org/api/rest_v1/media/math/render/svg/1"));
        assert!(!is_math_image("A cat", "https://example.com/cat.png"));
    }
}
