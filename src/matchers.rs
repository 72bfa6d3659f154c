//! Path predicates used to select and classify schema documents.
//!
//! Paths are canonical store keys such as `/extensions/win/objects/reg_key.json`.
//!
//! - Glob patterns without a leading `/` are anchored at the right, so
//!   `objects/*` matches both `/objects/os.json` and
//!   `/extensions/win/objects/win_process.json`. A `*` never crosses a `/`.
//! - Regex patterns are anchored at the start of the path only.
//! - Kind matchers recognise the conventional OCSF layout for one
//!   [`SchemaKind`].

use globset::GlobBuilder;
use regex_lite::Regex;

use crate::error::{Error, Result};
use crate::types::SchemaKind;

/// A composable predicate over canonical document paths.
#[derive(Debug, Clone)]
pub enum Matcher {
    Glob(globset::GlobMatcher),
    Regex(Regex),
    Kind(SchemaKind),
    /// Matches when any inner matcher does.
    AnyOf(Vec<Matcher>),
    /// Matches when every inner matcher does.
    AllOf(Vec<Matcher>),
    /// Matches when no inner matcher does.
    NoneOf(Vec<Matcher>),
}

impl Matcher {
    /// Compile a glob pattern.
    pub fn glob(pattern: &str) -> Result<Self> {
        let anchored = if pattern.starts_with('/') {
            pattern.to_string()
        } else {
            format!("**/{pattern}")
        };
        let glob = GlobBuilder::new(&anchored)
            .literal_separator(true)
            .build()
            .map_err(|e| Error::Pattern(format!("glob '{pattern}': {e}")))?;
        Ok(Matcher::Glob(glob.compile_matcher()))
    }

    /// Compile a regex pattern.
    pub fn regex(pattern: &str) -> Result<Self> {
        let re = Regex::new(&format!("^(?:{pattern})"))
            .map_err(|e| Error::Pattern(format!("regex '{pattern}': {e}")))?;
        Ok(Matcher::Regex(re))
    }

    /// Matcher for the conventional location of a schema kind.
    pub fn kind(kind: SchemaKind) -> Self {
        Matcher::Kind(kind)
    }

    pub fn any(matchers: Vec<Matcher>) -> Self {
        Matcher::AnyOf(matchers)
    }

    pub fn all(matchers: Vec<Matcher>) -> Self {
        Matcher::AllOf(matchers)
    }

    pub fn none(matchers: Vec<Matcher>) -> Self {
        Matcher::NoneOf(matchers)
    }

    /// Test a path.
    pub fn is_match(&self, path: &str) -> bool {
        match self {
            Matcher::Glob(glob) => glob.is_match(path),
            Matcher::Regex(re) => re.is_match(path),
            Matcher::Kind(kind) => kind_matches(*kind, path),
            Matcher::AnyOf(inner) => inner.iter().any(|m| m.is_match(path)),
            Matcher::AllOf(inner) => inner.iter().all(|m| m.is_match(path)),
            Matcher::NoneOf(inner) => !inner.iter().any(|m| m.is_match(path)),
        }
    }
}

fn kind_matches(kind: SchemaKind, path: &str) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let is_json = file_name.ends_with(".json");

    match kind {
        SchemaKind::Version => file_name == "version.json",
        SchemaKind::Dictionary => file_name.ends_with("dictionary.json"),
        SchemaKind::Categories => file_name == "categories.json",
        SchemaKind::Include => is_json && path.contains("/includes/"),
        SchemaKind::Profile => is_json && path.contains("/profiles/"),
        SchemaKind::Object => is_json && path.contains("/objects/"),
        SchemaKind::Event => is_json && path.contains("/events/"),
        SchemaKind::Extension => {
            // extensions/<name>/extension.json
            let mut segments = path.rsplit('/');
            segments.next() == Some("extension.json")
                && segments.next().is_some_and(|name| !name.is_empty())
                && segments.next() == Some("extensions")
        }
    }
}
