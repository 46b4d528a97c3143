//! mimeprobe - detect file types from their content

mod output;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use mimeprobe_core::config::DEFAULT_CONFIG_FILE;
use mimeprobe_core::{MimeType, ProbeConfig, ScanEntry, SignatureRegistry};

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "MIMEPROBE_LOG";

#[derive(Debug, Parser)]
#[command(
    name = "mimeprobe",
    author,
    version,
    about = "Detect MIME types and format versions from file content"
)]
struct Cli {
    /// Configuration file (defaults to ./mimeprobe.toml when present)
    #[arg(long, short = 'c', global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Do not register the built-in signature catalogue
    #[arg(long, global = true)]
    no_builtin: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Detect the content type of files
    Detect {
        /// Files (or directories with --recursive) to inspect
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,

        /// Descend into directories
        #[arg(long, short = 'r')]
        recursive: bool,

        #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Exit 0 if PATH has content type MIME, 1 if not
    IsType {
        #[arg(value_name = "PATH")]
        path: PathBuf,

        #[arg(value_name = "MIME")]
        mime_type: String,
    },
    /// List signatures in registration order
    List {
        #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print the JSON schema of the configuration file
    Schema,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Explicit `--config` must load; the implicit `./mimeprobe.toml` only
/// warns when it is broken.
fn load_config(cli: &Cli) -> Result<ProbeConfig> {
    let mut config = match &cli.config {
        Some(path) => ProbeConfig::load(path)
            .with_context(|| format!("cannot use config {}", path.display()))?,
        None => {
            let implicit = Path::new(DEFAULT_CONFIG_FILE);
            let path = implicit.is_file().then_some(implicit);
            let (config, warning) = ProbeConfig::load_or_default(path);
            if let Some(warning) = warning {
                tracing::warn!("{warning}");
            }
            config
        }
    };
    if cli.no_builtin {
        config.builtin_signatures = false;
    }
    for warning in config.validate() {
        match &warning.suggestion {
            Some(suggestion) => tracing::warn!(
                field = %warning.field,
                "{} ({suggestion})",
                warning.message
            ),
            None => tracing::warn!(field = %warning.field, "{}", warning.message),
        }
    }
    Ok(config)
}

fn detect_paths(
    paths: &[PathBuf],
    recursive: bool,
    config: &ProbeConfig,
    registry: &SignatureRegistry,
) -> Result<Vec<ScanEntry>> {
    let mut entries = Vec::new();
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            if !recursive {
                entries.push(ScanEntry {
                    path: path.clone(),
                    detection: None,
                    error: Some("is a directory (use --recursive)".to_string()),
                });
                continue;
            }
            let report = mimeprobe_core::scan(path, config, registry)
                .with_context(|| format!("scan of {} failed", path.display()))?;
            tracing::info!(
                root = %path.display(),
                files = report.files_scanned,
                duration_ms = report.duration_ms,
                "directory scanned"
            );
            entries.extend(report.entries);
        } else {
            files.push(path.clone());
        }
    }

    let detected: Vec<ScanEntry> = files
        .into_par_iter()
        .map(|path| match registry.detect_path(&path) {
            Ok(detection) => ScanEntry {
                path,
                detection: Some(detection),
                error: None,
            },
            Err(e) => ScanEntry {
                path,
                detection: None,
                error: Some(e.to_string()),
            },
        })
        .collect();
    entries.extend(detected);
    Ok(entries)
}

fn run(cli: Cli) -> Result<ExitCode> {
    if let Command::Schema = cli.command {
        let schema = mimeprobe_core::generate_schema();
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(ExitCode::SUCCESS);
    }

    let config = load_config(&cli)?;
    let registry = SignatureRegistry::from_config(&config).context("invalid signature in config")?;
    tracing::debug!(signatures = registry.len(), hints = registry.hint_count(), "registry ready");

    match cli.command {
        Command::Detect {
            paths,
            recursive,
            format,
        } => {
            let entries = detect_paths(&paths, recursive, &config, &registry)?;
            output::print_entries(&entries, format)?;
            if entries.iter().any(|e| e.error.is_some()) {
                Ok(ExitCode::from(1))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Command::IsType { path, mime_type } => {
            let desired: MimeType = mime_type
                .parse()
                .with_context(|| format!("'{mime_type}' is not a MIME type"))?;
            match registry.is_content_type_path(&path, &desired) {
                Ok(true) => Ok(ExitCode::SUCCESS),
                Ok(false) => Ok(ExitCode::from(1)),
                Err(e) => bail!("{}: {e}", path.display()),
            }
        }
        Command::List { format } => {
            output::print_signatures(&registry.signatures(), format)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Schema => Ok(ExitCode::SUCCESS),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&e);
            ExitCode::from(2)
        }
    }
}
