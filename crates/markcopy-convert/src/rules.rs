//! Ordered `(filter, replacement)` rules. The first matching rule claims an
//! element; later rules never see it.

pub mod code;
pub mod commonmark;
pub mod gfm;
pub mod math;

use markcopy_core::LineBreaks;
use scraper::ElementRef;

use crate::options::MarkdownOptions;

type FilterFn = dyn Fn(ElementRef<'_>) -> bool + Send + Sync;
type ReplacementFn = dyn Fn(&str, ElementRef<'_>, &MarkdownOptions) -> String + Send + Sync;

/// A single conversion rule.
pub struct Rule {
    name: &'static str,
    filter: Box<FilterFn>,
    replacement: Box<ReplacementFn>,
}

impl Rule {
    pub fn new<F, R>(name: &'static str, filter: F, replacement: R) -> Self
    where
        F: Fn(ElementRef<'_>) -> bool + Send + Sync + 'static,
        R: Fn(&str, ElementRef<'_>, &MarkdownOptions) -> String + Send + Sync + 'static,
    {
        Self {
            name,
            filter: Box::new(filter),
            replacement: Box::new(replacement),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn matches(&self, el: ElementRef<'_>) -> bool {
        (self.filter)(el)
    }

    /// Produce Markdown for `el`, given its already-converted `content`.
    pub fn replace(&self, content: &str, el: ElementRef<'_>, options: &MarkdownOptions) -> String {
        (self.replacement)(content, el, options)
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

/// Rules in precedence order.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full rule set for the given output options.
    ///
    /// Only the paragraph override depends on the options, so a converter is
    /// rebuilt per conversion rather than cached.
    pub fn standard(options: &MarkdownOptions) -> Self {
        let mut set = Self::new();
        if options.line_breaks == LineBreaks::OnePerParagraph {
            set.push(commonmark::single_line_paragraph());
        }
        set.push(code::fenced_code_with_language());

        // Dialect rules ahead of the generic image rule they shadow.
        set.push(math::documentation_math());
        set.push(commonmark::image());
        set.push(math::formula_container());
        set.push(math::katex());
        set.push(math::mathml());
        set.push(math::script_formula());
        set.push(math::chat_formula());

        set.extend(gfm::rules());
        set.push(code::preformatted());
        set.extend(commonmark::rules());
        set
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn extend(&mut self, rules: impl IntoIterator<Item = Rule>) {
        self.rules.extend(rules);
    }

    /// First rule claiming `el`.
    pub fn find(&self, el: ElementRef<'_>) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.matches(el))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }
}
