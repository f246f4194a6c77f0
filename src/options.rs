use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::scope::TagParser;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Delimiters {
    pub start: String,
    pub end: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Delimiters {
            start: "{".into(),
            end: "}".into(),
        }
    }
}

/// Prefixes that turn a tag into a loop, section or raw-XML insertion.
/// Matched after trimming the tag, in the order raw, close, inverted, open.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoopPrefix {
    pub open: String,
    pub close: String,
    pub inverted: String,
    pub raw: String,
}

impl Default for LoopPrefix {
    fn default() -> Self {
        LoopPrefix {
            open: "#".into(),
            close: "/".into(),
            inverted: "^".into(),
            raw: "@".into(),
        }
    }
}

/// What to emit for a value tag whose data is absent or null.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingValue {
    #[default]
    Empty,
    Keep,
    Error,
}

#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parser {
    /// Exact key lookup; `.` is the current scope.
    #[default]
    Literal,
    /// Dotted paths into nested objects and arrays.
    Path,
    #[serde(skip)]
    Custom(Arc<dyn TagParser>),
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parser::Literal => f.write_str("Literal"),
            Parser::Path => f.write_str("Path"),
            Parser::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Template engine configuration. Deserialises from camelCase JSON so an
/// options file can be passed on the command line.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TemplateOptions {
    pub delimiters: Delimiters,
    pub loop_prefix: LoopPrefix,
    pub paragraph_loop: bool,
    pub linebreaks: bool,
    pub parser: Parser,
    pub missing: MissingValue,
}

impl TemplateOptions {
    pub fn with_parser(mut self, parser: impl TagParser + 'static) -> Self {
        self.parser = Parser::Custom(Arc::new(parser));
        self
    }
}
