use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};

use ocsf_validator::error::ErrorKind;
use ocsf_validator::runner::{Severity, ValidationReport, ValidationRunner, ValidatorOptions};

/// Validate an OCSF schema definition tree.
///
/// Loads every definition under the schema root, resolves `$include`,
/// `extends`, and `profiles` directives, fills attributes from the
/// dictionaries, and checks the merged documents for missing and
/// unrecognized keys.
#[derive(Parser)]
#[command(name = "ocsf-validator", version, about)]
struct Cli {
    /// Root of the schema tree (a clone of the ocsf-schema repository).
    #[arg(env = "OCSF_SCHEMA_PATH")]
    path: PathBuf,

    /// Do not load or validate anything under `extensions/`.
    #[arg(long)]
    skip_extensions: bool,

    /// Skip the required-key and unknown-key checks.
    #[arg(long)]
    skip_key_checks: bool,

    /// Override the severity of a kind of finding.
    ///
    /// Example: --level unknown-key=error --level imprecise-base=fatal
    #[arg(long = "level", value_name = "KIND=SEVERITY", value_parser = parse_level)]
    levels: Vec<(ErrorKind, Severity)>,

    /// Report format.
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Log resolution details to stderr.
    #[arg(long, short)]
    verbose: bool,

    /// Only print failed stages and their findings.
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn parse_level(s: &str) -> Result<(ErrorKind, Severity), String> {
    let (kind, severity) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KIND=SEVERITY, got '{s}'"))?;
    let kind = ErrorKind::from_str(kind.trim(), true)?;
    let severity = Severity::from_str(severity.trim(), true)?;
    Ok((kind, severity))
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let mut options = ValidatorOptions::new(cli.path.clone());
    options.read_extensions = !cli.skip_extensions;
    options.check_keys = !cli.skip_key_checks;
    for (kind, severity) in &cli.levels {
        options.severities.set(*kind, *severity);
    }

    let report = ValidationRunner::new(options).validate();

    match cli.format {
        Format::Text => print_text(&report, cli.quiet),
        Format::Json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("error: failed to serialize report: {e}");
                process::exit(1);
            }
        },
    }

    process::exit(report.exit_code());
}

fn print_text(report: &ValidationReport, quiet: bool) {
    for stage in &report.stages {
        if stage.passed() {
            if !quiet {
                println!("SUCCESS {}", stage.label);
            }
            continue;
        }
        println!("FAILED  {}", stage.label);

        let mut findings: Vec<_> = stage.findings.iter().collect();
        findings.sort_by(|a, b| b.severity.cmp(&a.severity));
        for finding in findings {
            println!("  {:<7} {}", finding.severity.label(), finding.message);
        }
    }

    if !quiet {
        let counts = [Severity::Fatal, Severity::Error, Severity::Warning].map(|severity| {
            report
                .findings()
                .filter(|f| f.severity == severity)
                .count()
        });
        eprintln!(
            "Checked {} documents: {} fatal, {} errors, {} warnings",
            report.documents, counts[0], counts[1], counts[2]
        );
    }
}
