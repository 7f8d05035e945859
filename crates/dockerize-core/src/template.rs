//! `${VAR}` placeholder scanning and rendering.
//!
//! A template is parsed once into literal and placeholder segments.
//! Rendering walks the segments and never re-scans substituted text, so a
//! value that itself contains `${...}` is emitted verbatim.
//!
//! Syntax:
//!
//! - `${NAME}` where `NAME` matches `[A-Za-z_][A-Za-z0-9_]*` is a placeholder
//! - `$${` emits a literal `${` (escape for shell parameter expansion)
//! - every other `$` sequence is literal text, including `${PORT:-3000}`

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$\{|\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern compiles")
});

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed template string.
///
/// # Examples
///
/// ```
/// use dockerize_core::Template;
///
/// let template = Template::parse("DATABASE_URL=${DATABASE_URL}");
/// let rendered = template.render(|name| (name == "DATABASE_URL").then_some("postgres://h/db"));
/// assert_eq!(rendered.text, "DATABASE_URL=postgres://h/db");
/// assert!(rendered.missing.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

/// Output of [`Template::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Placeholder names the lookup could not answer, in order of first
    /// appearance. Each one is left as `${NAME}` in `text`.
    pub missing: Vec<String>,
}

impl Template {
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut cursor = 0;

        for caps in PLACEHOLDER.captures_iter(source) {
            let Some(whole) = caps.get(0) else { continue };
            literal.push_str(&source[cursor..whole.start()]);
            cursor = whole.end();

            match caps.get(1) {
                Some(name) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name.as_str().to_owned()));
                }
                // `$${` escape
                None => literal.push_str("${"),
            }
        }

        literal.push_str(&source[cursor..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            source: source.to_owned(),
            segments,
        }
    }

    /// A template that renders to `text` unchanged, with no placeholders.
    pub fn literal(text: &str) -> Self {
        let segments = if text.is_empty() {
            Vec::new()
        } else {
            vec![Segment::Literal(text.to_owned())]
        };
        Self {
            source: text.replace("${", "$${"),
            segments,
        }
    }

    /// The raw template text as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Unique placeholder names, sorted.
    pub fn placeholders(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Substitute every placeholder through `lookup`.
    ///
    /// A `None` from `lookup` keeps the placeholder intact and records the
    /// name in [`Rendered::missing`]. Nothing is ever replaced by an empty
    /// string unless `lookup` returns one.
    pub fn render<'v>(&self, mut lookup: impl FnMut(&str) -> Option<&'v str>) -> Rendered {
        let mut text = String::with_capacity(self.source.len());
        let mut missing: Vec<String> = Vec::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => text.push_str(lit),
                Segment::Placeholder(name) => match lookup(name) {
                    Some(value) => text.push_str(value),
                    None => {
                        text.push_str("${");
                        text.push_str(name);
                        text.push('}');
                        if !missing.iter().any(|m| m == name) {
                            missing.push(name.clone());
                        }
                    }
                },
            }
        }

        Rendered { text, missing }
    }
}

impl From<String> for Template {
    fn from(source: String) -> Self {
        Self::parse(&source)
    }
}

impl From<&str> for Template {
    fn from(source: &str) -> Self {
        Self::parse(source)
    }
}

impl From<Template> for String {
    fn from(template: Template) -> Self {
        template.source
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
