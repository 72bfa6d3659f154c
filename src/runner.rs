//! Staged validation of a schema tree on disk.
//!
//! [`ValidationRunner::validate`] loads the tree, classifies it, resolves
//! and merges every directive, and checks keys of the merged documents. All
//! findings are accumulated and attributed to the stage that produced them;
//! each is assigned a [`Severity`] from the runner's [`SeverityConfig`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{Collector, Error, ErrorKind, Result, ValidationError};
use crate::processor::{ResolutionStats, process_includes};
use crate::reader::{Reader, ReaderOptions};
use crate::type_mapping::TypeMapping;
use crate::validators::{validate_no_unknown_keys, validate_required_keys};

pub const STAGE_LOAD: &str = "Schema can be loaded";
pub const STAGE_TYPES: &str = "Schema types can be inferred";
pub const STAGE_DEPENDENCIES: &str = "Dependencies can be resolved";
pub const STAGE_REQUIRED_KEYS: &str = "Required keys are present";
pub const STAGE_UNKNOWN_KEYS: &str = "No unrecognized keys";

/// How much a finding matters.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Reported, never fails the run.
    Warning,
    /// Fails the run.
    Error,
    /// Fails the run and stops it.
    Fatal,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

/// Severity assigned to each kind of finding.
#[derive(Debug, Clone, Default)]
pub struct SeverityConfig {
    overrides: BTreeMap<ErrorKind, Severity>,
}

impl SeverityConfig {
    /// Severity of `kind` when not overridden.
    pub fn default_for(kind: ErrorKind) -> Severity {
        match kind {
            ErrorKind::InvalidBasePath => Severity::Fatal,
            ErrorKind::UndetectableType
            | ErrorKind::ImpreciseBase
            | ErrorKind::RedundantProfileInclude
            | ErrorKind::UnknownKey => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn set(&mut self, kind: ErrorKind, severity: Severity) {
        self.overrides.insert(kind, severity);
    }

    pub fn get(&self, kind: ErrorKind) -> Severity {
        self.overrides
            .get(&kind)
            .copied()
            .unwrap_or_else(|| Self::default_for(kind))
    }
}

/// Options for a [`ValidationRunner`].
#[derive(Debug, Clone)]
pub struct ValidatorOptions {
    /// Root of the schema tree.
    pub base_path: PathBuf,

    /// Load and validate documents under `extensions/`.
    pub read_extensions: bool,

    /// Run the required-key and unknown-key stages.
    pub check_keys: bool,

    pub severities: SeverityConfig,
}

impl ValidatorOptions {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            read_extensions: true,
            check_keys: true,
            severities: SeverityConfig::default(),
        }
    }
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self::new(".")
    }
}

/// One reported problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// `None` for load failures that are not schema findings (I/O, parse).
    pub kind: Option<ErrorKind>,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub message: String,
}

/// Findings of a single stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub label: String,
    pub findings: Vec<Finding>,
}

impl StageReport {
    pub fn passed(&self) -> bool {
        self.findings.is_empty()
    }

    /// Highest severity among the findings.
    pub fn worst(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }
}

/// Outcome of a validation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub stages: Vec<StageReport>,
    /// Number of documents loaded.
    pub documents: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionStats>,
}

impl ValidationReport {
    pub fn worst(&self) -> Option<Severity> {
        self.stages.iter().filter_map(StageReport::worst).max()
    }

    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.stages.iter().flat_map(|s| s.findings.iter())
    }

    /// `0` when clean or only warnings, `1` on any error, `10` on a fatal
    /// finding.
    pub fn exit_code(&self) -> i32 {
        match self.worst() {
            Some(Severity::Fatal) => 10,
            Some(Severity::Error) => 1,
            Some(Severity::Warning) | None => 0,
        }
    }
}

/// Runs every validation stage against a schema tree.
#[derive(Debug, Clone)]
pub struct ValidationRunner {
    options: ValidatorOptions,
}

impl ValidationRunner {
    pub fn new(options: ValidatorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        let mut collector = Collector::accumulate();

        let reader_options = ReaderOptions {
            base_path: self.options.base_path.clone(),
            read_extensions: self.options.read_extensions,
        };
        let Some(mut reader) = self.stage(&mut report, &mut collector, STAGE_LOAD, |_| {
            Reader::load(&reader_options)
        }) else {
            return report;
        };
        report.documents = reader.len();

        let Some(types) = self.stage(&mut report, &mut collector, STAGE_TYPES, |c| {
            TypeMapping::new(&reader, c)
        }) else {
            return report;
        };

        if self
            .stage(&mut report, &mut collector, STAGE_DEPENDENCIES, |c| {
                process_includes(&mut reader, &types, c, false)
            })
            .is_none()
        {
            return report;
        }

        // Everything the merge pass finds was already reported by the dry run.
        match process_includes(&mut reader, &types, &mut collector, true) {
            Ok(stats) => report.resolution = Some(stats),
            Err(e) => log::debug!("merge pass aborted: {e}"),
        }
        collector.flush();

        if self.options.check_keys {
            self.stage(&mut report, &mut collector, STAGE_REQUIRED_KEYS, |c| {
                validate_required_keys(&reader, &types, c)
            });
            self.stage(&mut report, &mut collector, STAGE_UNKNOWN_KEYS, |c| {
                validate_no_unknown_keys(&reader, &types, c)
            });
        }

        report
    }

    /// Run one stage, moving every finding it produced into a new
    /// [`StageReport`]. A hard error becomes a fatal finding and yields `None`.
    fn stage<T>(
        &self,
        report: &mut ValidationReport,
        collector: &mut Collector,
        label: &str,
        op: impl FnOnce(&mut Collector) -> Result<T>,
    ) -> Option<T> {
        let outcome = op(collector);
        let mut findings: Vec<Finding> = collector
            .flush()
            .iter()
            .map(|err| self.finding(err))
            .collect();

        let value = match outcome {
            Ok(value) => Some(value),
            // Already recorded by the collector.
            Err(Error::Validation(_)) => None,
            Err(err) => {
                findings.push(fatal(&err));
                None
            }
        };

        log::debug!("stage '{label}': {} findings", findings.len());
        report.stages.push(StageReport {
            label: label.to_string(),
            findings,
        });
        value
    }

    fn finding(&self, err: &ValidationError) -> Finding {
        Finding {
            kind: Some(err.kind()),
            severity: self.options.severities.get(err.kind()),
            file: Some(err.file().to_string()),
            message: err.to_string(),
        }
    }
}

fn fatal(err: &Error) -> Finding {
    let kind = match err {
        Error::InvalidBasePath { .. } => Some(ErrorKind::InvalidBasePath),
        Error::Validation(v) => Some(v.kind()),
        _ => None,
    };
    Finding {
        kind,
        severity: Severity::Fatal,
        file: None,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn clean_tree(root: &Path) {
        write(root, "version.json", r#"{"version": "1.1.0"}"#);
        write(
            root,
            "dictionary.json",
            r#"{"name": "dictionary", "caption": "Dictionary", "description": "Attributes",
                "attributes": {"name": {"caption": "Name", "type": "string_t"}}}"#,
        );
        write(
            root,
            "objects/os.json",
            r#"{"name": "os", "caption": "OS", "description": "Operating system",
                "attributes": {"name": {"requirement": "required"}}}"#,
        );
        write(
            root,
            "events/base_event.json",
            r#"{"name": "base_event", "caption": "Base Event", "attributes": {"name": {}}}"#,
        );
        write(
            root,
            "events/network/http.json",
            r#"{"name": "http", "caption": "HTTP", "extends": "base_event", "uid": 1,
                "attributes": {}}"#,
        );
    }

    fn labels(report: &ValidationReport) -> Vec<&str> {
        report.stages.iter().map(|s| s.label.as_str()).collect()
    }

    #[test]
    fn clean_tree_passes_every_stage() {
        let dir = tempfile::tempdir().unwrap();
        clean_tree(dir.path());

        let report = ValidationRunner::new(ValidatorOptions::new(dir.path())).validate();
        assert_eq!(
            labels(&report),
            vec![
                STAGE_LOAD,
                STAGE_TYPES,
                STAGE_DEPENDENCIES,
                STAGE_REQUIRED_KEYS,
                STAGE_UNKNOWN_KEYS
            ]
        );
        assert!(report.stages.iter().all(StageReport::passed), "{report:?}");
        assert_eq!(report.documents, 5);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.resolution.as_ref().map(|s| s.edges), Some(4));
    }

    #[test]
    fn missing_path_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let report =
            ValidationRunner::new(ValidatorOptions::new(dir.path().join("missing"))).validate();
        assert_eq!(labels(&report), vec![STAGE_LOAD]);
        assert_eq!(report.stages[0].findings[0].kind, Some(ErrorKind::InvalidBasePath));
        assert_eq!(report.exit_code(), 10);
    }

    #[test]
    fn malformed_document_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "objects/bad.json", "{");
        let report = ValidationRunner::new(ValidatorOptions::new(dir.path())).validate();
        assert_eq!(report.stages.len(), 1);
        assert_eq!(report.stages[0].findings[0].kind, None);
        assert_eq!(report.worst(), Some(Severity::Fatal));
    }

    #[test]
    fn missing_include_fails_dependency_stage() {
        let dir = tempfile::tempdir().unwrap();
        clean_tree(dir.path());
        write(
            dir.path(),
            "objects/file.json",
            r#"{"name": "file", "caption": "File", "description": "A file",
                "attributes": {"$include": "includes/gone.json"}}"#,
        );

        let report = ValidationRunner::new(ValidatorOptions::new(dir.path())).validate();
        let deps = &report.stages[2];
        assert_eq!(deps.label, STAGE_DEPENDENCIES);
        assert_eq!(deps.findings.len(), 1);
        assert_eq!(deps.findings[0].kind, Some(ErrorKind::MissingInclude));
        assert_eq!(deps.findings[0].file.as_deref(), Some("/objects/file.json"));
        assert_eq!(report.exit_code(), 1);
        // The merge pass does not report it again.
        assert_eq!(report.findings().count(), 1);
    }

    #[test]
    fn warnings_do_not_fail_the_run() {
        let dir = tempfile::tempdir().unwrap();
        clean_tree(dir.path());
        write(
            dir.path(),
            "objects/os.json",
            r#"{"name": "os", "caption": "OS", "description": "Operating system",
                "colour": "blue", "attributes": {}}"#,
        );

        let report = ValidationRunner::new(ValidatorOptions::new(dir.path())).validate();
        let unknown = report.stages.last().unwrap();
        assert_eq!(unknown.label, STAGE_UNKNOWN_KEYS);
        assert!(!unknown.passed());
        assert_eq!(unknown.worst(), Some(Severity::Warning));
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn severity_overrides_apply() {
        let dir = tempfile::tempdir().unwrap();
        clean_tree(dir.path());
        write(dir.path(), "objects/os.json", r#"{"colour": "blue"}"#);

        let mut options = ValidatorOptions::new(dir.path());
        options.severities.set(ErrorKind::UnknownKey, Severity::Fatal);
        options
            .severities
            .set(ErrorKind::MissingRequiredKey, Severity::Warning);
        let report = ValidationRunner::new(options).validate();
        assert_eq!(report.exit_code(), 10);
        assert_eq!(report.stages.len(), 5);
    }

    #[test]
    fn key_checks_can_be_skipped() {
        let dir = tempfile::tempdir().unwrap();
        clean_tree(dir.path());
        write(dir.path(), "objects/os.json", r#"{"colour": "blue"}"#);

        let mut options = ValidatorOptions::new(dir.path());
        options.check_keys = false;
        let report = ValidationRunner::new(options).validate();
        assert_eq!(
            labels(&report),
            vec![STAGE_LOAD, STAGE_TYPES, STAGE_DEPENDENCIES]
        );
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn default_severities() {
        let config = SeverityConfig::default();
        assert_eq!(config.get(ErrorKind::InvalidBasePath), Severity::Fatal);
        assert_eq!(config.get(ErrorKind::ImpreciseBase), Severity::Warning);
        assert_eq!(config.get(ErrorKind::UndetectableType), Severity::Warning);
        assert_eq!(config.get(ErrorKind::CyclicDependency), Severity::Error);
        assert_eq!(config.get(ErrorKind::MissingProfile), Severity::Error);
    }

    #[test]
    fn report_serializes() {
        let report = ValidationReport {
            stages: vec![StageReport {
                label: STAGE_TYPES.to_string(),
                findings: vec![Finding {
                    kind: Some(ErrorKind::UndetectableType),
                    severity: Severity::Warning,
                    file: Some("/enums/x.json".to_string()),
                    message: "unable to detect type of /enums/x.json".to_string(),
                }],
            }],
            documents: 1,
            resolution: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["stages"][0]["findings"][0]["kind"], "undetectable-type");
        assert_eq!(json["stages"][0]["findings"][0]["severity"], "warning");
        assert!(json.get("resolution").is_none());
    }
}
