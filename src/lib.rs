//! Annoguard: structural and cross-referential validation for COCO-style
//! annotation datasets.
//!
//! Annoguard checks a dataset before it is used for training: every record of
//! every annotation file is well formed, identifiers are unique, references
//! resolve, keypoint data agrees with its category, and the dataset manifest
//! (`dataset_infos.json`) declares a consistent task and the canonical splits.
//! A validated directory can be signed so later changes are detected.
//!
//! # Modules
//!
//! - [`coco`]: COCO annotation file validation and the validated model
//! - [`info`]: `dataset_infos.json` manifest validation
//! - [`dataset`]: dataset directory validation (manifest plus split files)
//! - [`signature`]: content digest, signing and verification
//! - [`validation`]: reports, outcomes and shared field-level checks
//! - [`error`]: Error types for annoguard operations

pub mod coco;
pub mod dataset;
pub mod error;
pub mod info;
pub mod io;
pub mod signature;
pub mod validation;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;

pub use error::AnnoguardError;

use validation::{into_parts, Outcome, ValidateOptions, ValidationIssue, ValidationReport};

/// The annoguard CLI application.
#[derive(Parser)]
#[command(name = "annoguard")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Increase logging verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Validate one COCO annotation file.
    Annotations(AnnotationsArgs),
    /// Validate a dataset_infos.json manifest.
    Infos(InfosArgs),
    /// Validate a dataset directory (manifest plus split files).
    Dataset(DatasetArgs),
    /// Verify the signature of a previously validated dataset directory.
    Verify(VerifyArgs),
}

/// Report options shared by the validating subcommands.
#[derive(clap::Args)]
struct ReportArgs {
    /// Treat warnings as errors (exit non-zero if any warnings).
    #[arg(long, env = "ANNOGUARD_STRICT")]
    strict: bool,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text", env = "ANNOGUARD_OUTPUT")]
    output: String,
}

impl ReportArgs {
    fn options(&self) -> ValidateOptions {
        ValidateOptions {
            strict: self.strict,
        }
    }
}

#[derive(clap::Args)]
struct AnnotationsArgs {
    /// COCO annotation file to validate.
    input: PathBuf,

    /// Write the validated, normalized annotations to this path.
    #[arg(long, value_name = "PATH")]
    emit: Option<PathBuf>,

    #[command(flatten)]
    report: ReportArgs,
}

#[derive(clap::Args)]
struct InfosArgs {
    /// Manifest file to validate.
    input: PathBuf,

    #[command(flatten)]
    report: ReportArgs,
}

#[derive(clap::Args)]
struct DatasetArgs {
    /// Dataset root containing dataset_infos.json and annotations/.
    root: PathBuf,

    /// Write a signed validator log to the dataset root on success.
    #[arg(long)]
    sign: bool,

    #[command(flatten)]
    report: ReportArgs,
}

#[derive(clap::Args)]
struct VerifyArgs {
    /// Dataset root containing the validator log.
    root: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(name: &str) -> Result<Self, AnnoguardError> {
        match name {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(AnnoguardError::UnsupportedOutput(format!(
                "'{}' (supported: text, json)",
                other
            ))),
        }
    }
}

/// Machine-readable report printed with `--output json`.
#[derive(Serialize)]
struct JsonReport<'a> {
    valid: bool,
    error_count: usize,
    warning_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<&'a str>,
    issues: &'a [ValidationIssue],
}

/// Run the annoguard CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), AnnoguardError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Annotations(args)) => run_annotations(args),
        Some(Commands::Infos(args)) => run_infos(args),
        Some(Commands::Dataset(args)) => run_dataset(args),
        Some(Commands::Verify(args)) => run_verify(args),
        None => {
            println!("annoguard {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Structural validation for COCO-style annotation datasets.");
            println!();
            println!("Run 'annoguard --help' for usage information.");
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbose {
        0 => EnvFilter::new("annoguard=warn"),
        1 => EnvFilter::new("annoguard=info"),
        _ => EnvFilter::new("annoguard=debug"),
    };

    // A subscriber may already be installed when embedded.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

/// Execute the annotations subcommand.
fn run_annotations(args: AnnotationsArgs) -> Result<(), AnnoguardError> {
    let format = OutputFormat::parse(&args.report.output)?;
    let outcome = coco::validate_coco_file(&args.input)?;
    let dataset = finish(outcome, &args.report, format, None)?;

    if let Some(path) = &args.emit {
        coco::write_coco_json(path, &dataset)?;
        tracing::info!(path = %path.display(), "wrote validated annotations");
    }
    Ok(())
}

/// Execute the infos subcommand.
fn run_infos(args: InfosArgs) -> Result<(), AnnoguardError> {
    let format = OutputFormat::parse(&args.report.output)?;
    let outcome = info::validate_infos_file(&args.input)?;
    finish(outcome, &args.report, format, None)?;
    Ok(())
}

/// Execute the dataset subcommand.
fn run_dataset(args: DatasetArgs) -> Result<(), AnnoguardError> {
    let format = OutputFormat::parse(&args.report.output)?;
    let outcome = args
        .report
        .options()
        .apply(dataset::validate_dataset_dir(&args.root)?);

    let signature = match (&outcome, args.sign) {
        (Ok(_), true) => Some(sign(&args.root)?),
        _ => None,
    };
    finish(outcome, &args.report, format, signature.as_deref())?;
    Ok(())
}

fn sign(root: &Path) -> Result<String, AnnoguardError> {
    let digest = signature::hash_dataset(root)?;
    signature::sign_dataset(root, &digest)?;
    Ok(digest)
}

/// Execute the verify subcommand.
fn run_verify(args: VerifyArgs) -> Result<(), AnnoguardError> {
    let digest = signature::verify_signature(&args.root)?;
    println!("Signature verified: {}", digest);
    Ok(())
}

/// Applies the report options, prints the report and turns a rejection into
/// [`AnnoguardError::ValidationFailed`].
fn finish<T>(
    outcome: Outcome<T>,
    args: &ReportArgs,
    format: OutputFormat,
    signature: Option<&str>,
) -> Result<T, AnnoguardError> {
    let (value, report) = into_parts(args.options().apply(outcome));
    print_report(&report, format, value.is_some(), signature)?;
    value.ok_or_else(|| AnnoguardError::rejected(report))
}

fn print_report(
    report: &ValidationReport,
    format: OutputFormat,
    valid: bool,
    signature: Option<&str>,
) -> Result<(), AnnoguardError> {
    match format {
        OutputFormat::Json => {
            let json = JsonReport {
                valid,
                error_count: report.error_count(),
                warning_count: report.warning_count(),
                signature,
                issues: &report.issues,
            };
            let text = serde_json::to_string_pretty(&json).map_err(AnnoguardError::JsonEncode)?;
            println!("{}", text);
        }
        OutputFormat::Text => {
            print!("{}", report);
            if let Some(digest) = signature {
                println!("Validation passed and signed: {}", digest);
            }
        }
    }
    Ok(())
}
