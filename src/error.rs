//! Error types and the error collector for the ocsf-validator crate.
//!
//! Two layers of errors exist:
//!
//! - [`Error`] aborts an operation: the schema tree could not be read, a
//!   pattern could not be compiled, or a fail-fast [`Collector`] raised a
//!   finding.
//! - [`ValidationError`] is a finding about the schema itself (a missing
//!   include target, a self-inheriting record, ...). Findings are handed to a
//!   [`Collector`], whose mode decides whether they abort or accumulate.

use std::path::PathBuf;

use serde::Serialize;

use crate::directives::Directive;
use crate::types::Shape;

/// Errors that can abort loading, resolution, or validation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The schema root is missing or is not a directory.
    #[error("invalid schema base path {path}: {reason}")]
    InvalidBasePath { path: PathBuf, reason: String },

    /// Failed to read a schema file from disk.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A schema file is not valid JSON.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Directory traversal failed.
    #[error("failed to walk schema tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// A glob or regex pattern could not be compiled.
    #[error("invalid pattern: {0}")]
    Pattern(String),

    /// A finding raised by a fail-fast collector.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// A problem found in the schema definitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// No classification rule matched the path.
    #[error("unable to detect type of {file}")]
    UndetectableType { file: String },

    /// A `$include` target does not exist.
    #[error("missing include target '{include}' in {file}")]
    MissingInclude { file: String, include: String },

    /// An `extends` base record does not exist anywhere.
    #[error("missing base record '{base}' in {file}")]
    MissingBase { file: String, base: String },

    /// An `extends` base record exists, but outside the lookup lineage.
    #[error("imprecise and possibly ambiguous base record definition '{base}' in {file}")]
    ImpreciseBase { file: String, base: String },

    /// A `profiles` entry does not exist.
    #[error("missing profile '{profile}' in {file}")]
    MissingProfile { file: String, profile: String },

    /// A directive resolved to the document that contains it.
    #[error("inheritance from self '{target}' in {file}")]
    SelfInheritance { file: String, target: String },

    /// The same target is referenced through both `$include` and `profiles`.
    #[error("redundant $include and profiles entry '{target}' in {file}")]
    RedundantProfileInclude { file: String, target: String },

    /// A directive resolved to a document of the wrong kind.
    #[error("`{directive}` type mismatch in {file}: expected {expected} for {include}")]
    IncludeTypeMismatch {
        file: String,
        include: String,
        expected: String,
        directive: Directive,
    },

    /// Following a dependency leads back to a document still being processed.
    #[error("cyclic dependency on '{target}' in {file}")]
    CyclicDependency { file: String, target: String },

    /// A required field is absent.
    #[error("missing required key `{shape}.{key}` at `{}` in {file}", .trail.join("."))]
    MissingRequiredKey {
        key: String,
        file: String,
        shape: Shape,
        trail: Vec<String>,
    },

    /// A field is not declared for its record shape.
    #[error("unrecognized key `{key}` of `{shape}` at `{}` in {file}", .trail.join("."))]
    UnknownKey {
        key: String,
        file: String,
        shape: Shape,
        trail: Vec<String>,
    },
}

/// Tag identifying the variant of a [`ValidationError`] (or a fatal load
/// failure), used to look up severities.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    InvalidBasePath,
    UndetectableType,
    MissingInclude,
    MissingBase,
    ImpreciseBase,
    MissingProfile,
    SelfInheritance,
    RedundantProfileInclude,
    IncludeTypeMismatch,
    CyclicDependency,
    MissingRequiredKey,
    UnknownKey,
}

impl ValidationError {
    /// The kind tag of this finding.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UndetectableType { .. } => ErrorKind::UndetectableType,
            Self::MissingInclude { .. } => ErrorKind::MissingInclude,
            Self::MissingBase { .. } => ErrorKind::MissingBase,
            Self::ImpreciseBase { .. } => ErrorKind::ImpreciseBase,
            Self::MissingProfile { .. } => ErrorKind::MissingProfile,
            Self::SelfInheritance { .. } => ErrorKind::SelfInheritance,
            Self::RedundantProfileInclude { .. } => ErrorKind::RedundantProfileInclude,
            Self::IncludeTypeMismatch { .. } => ErrorKind::IncludeTypeMismatch,
            Self::CyclicDependency { .. } => ErrorKind::CyclicDependency,
            Self::MissingRequiredKey { .. } => ErrorKind::MissingRequiredKey,
            Self::UnknownKey { .. } => ErrorKind::UnknownKey,
        }
    }

    /// The document the finding is about.
    pub fn file(&self) -> &str {
        match self {
            Self::UndetectableType { file }
            | Self::MissingInclude { file, .. }
            | Self::MissingBase { file, .. }
            | Self::ImpreciseBase { file, .. }
            | Self::MissingProfile { file, .. }
            | Self::SelfInheritance { file, .. }
            | Self::RedundantProfileInclude { file, .. }
            | Self::IncludeTypeMismatch { file, .. }
            | Self::CyclicDependency { file, .. }
            | Self::MissingRequiredKey { file, .. }
            | Self::UnknownKey { file, .. } => file,
        }
    }
}

/// Receives every finding produced while loading, resolving, and validating.
///
/// A fail-fast collector (the default) records the finding and returns it as
/// an [`Error::Validation`], so the caller's `?` aborts the operation. An
/// accumulating collector records the finding and lets the operation carry on.
#[derive(Debug)]
pub struct Collector {
    errors: Vec<ValidationError>,
    throw: bool,
}

impl Default for Collector {
    fn default() -> Self {
        Self::fail_fast()
    }
}

impl Collector {
    /// A collector that raises the first finding.
    pub fn fail_fast() -> Self {
        Self {
            errors: Vec::new(),
            throw: true,
        }
    }

    /// A collector that stores every finding and never raises.
    pub fn accumulate() -> Self {
        Self {
            errors: Vec::new(),
            throw: false,
        }
    }

    /// Whether findings abort the current operation.
    pub fn is_fail_fast(&self) -> bool {
        self.throw
    }

    /// Record a finding, raising it if this collector is fail-fast.
    pub fn handle(&mut self, err: ValidationError) -> Result<()> {
        log::debug!("collected: {err}");
        if self.throw {
            self.errors.push(err.clone());
            return Err(Error::Validation(err));
        }
        self.errors.push(err);
        Ok(())
    }

    /// All findings recorded so far.
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Remove and return all recorded findings.
    pub fn flush(&mut self) -> Vec<ValidationError> {
        std::mem::take(&mut self.errors)
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.errors.iter()
    }
}

impl<'a> IntoIterator for &'a Collector {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing() -> ValidationError {
        ValidationError::MissingInclude {
            file: "/objects/a.json".to_string(),
            include: "includes/nope.json".to_string(),
        }
    }

    #[test]
    fn fail_fast_raises_and_records() {
        let mut collector = Collector::fail_fast();
        let err = collector.handle(missing()).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::MissingInclude { .. })
        ));
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn accumulate_stores_without_raising() {
        let mut collector = Collector::accumulate();
        collector.handle(missing()).unwrap();
        collector.handle(missing()).unwrap();
        assert_eq!(collector.len(), 2);

        let drained = collector.flush();
        assert_eq!(drained.len(), 2);
        assert!(collector.is_empty());
    }

    #[test]
    fn messages_name_file_and_target() {
        let msg = missing().to_string();
        assert!(msg.contains("includes/nope.json"));
        assert!(msg.contains("/objects/a.json"));
        assert_eq!(missing().kind(), ErrorKind::MissingInclude);
        assert_eq!(missing().file(), "/objects/a.json");
    }

    #[test]
    fn key_errors_render_trail() {
        let err = ValidationError::UnknownKey {
            key: "colour".to_string(),
            file: "/objects/a.json".to_string(),
            shape: Shape::Attribute,
            trail: vec!["attributes".to_string(), "ip".to_string()],
        };
        assert!(err.to_string().contains("at `attributes.ip`"));
    }
}
