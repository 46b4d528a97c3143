//! Text and JSON rendering of detection results.

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use mimeprobe_core::{DetectionSource, ScanEntry, Signature};

use crate::OutputFormat;

#[derive(Serialize)]
struct SignatureRow<'a> {
    id: &'a str,
    mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    format_version: Option<&'a str>,
    hints: Vec<String>,
}

pub fn print_entries(entries: &[ScanEntry], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entries)?),
        OutputFormat::Text => {
            for entry in entries {
                println!("{}", render_entry(entry));
            }
        }
    }
    Ok(())
}

fn render_entry(entry: &ScanEntry) -> String {
    let path = entry.path.display().to_string();
    if let Some(error) = &entry.error {
        return format!("{}: {} {}", path.bold(), "error".red().bold(), error);
    }
    let Some(detection) = &entry.detection else {
        return format!("{}: {}", path.bold(), "unknown".yellow());
    };

    let mut line = format!("{}: ", path.bold());
    let mime = detection.mime_type.to_string();
    match detection.source {
        DetectionSource::Signature => line.push_str(&mime.green().to_string()),
        DetectionSource::HostHint => line.push_str(&mime.cyan().to_string()),
        DetectionSource::Unknown => line.push_str(&mime.yellow().to_string()),
    }
    if let Some(version) = &detection.format_version {
        line.push_str(&format!(" (version {version})"));
    }
    match (&detection.signature, detection.source) {
        (Some(id), _) => line.push_str(&format!(" [{}]", id.dimmed())),
        (None, DetectionSource::HostHint) => line.push_str(&format!(" [{}]", "host hint".dimmed())),
        _ => {}
    }
    line
}

pub fn print_signatures(signatures: &[Arc<dyn Signature>], format: OutputFormat) -> Result<()> {
    let rows: Vec<SignatureRow<'_>> = signatures
        .iter()
        .map(|s| {
            let info = s.info();
            SignatureRow {
                id: &info.id,
                mime_type: info.target.to_string(),
                format_version: info.format_version.as_deref(),
                hints: info.hints.iter().map(ToString::to_string).collect(),
            }
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Text => {
            for row in &rows {
                let version = row
                    .format_version
                    .map(|v| format!(" {v}"))
                    .unwrap_or_default();
                let hints = if row.hints.is_empty() {
                    "any".to_string()
                } else {
                    row.hints.join(", ")
                };
                println!(
                    "{:<24} {}{}  {}",
                    row.id.bold(),
                    row.mime_type,
                    version,
                    format!("hints: {hints}").dimmed()
                );
            }
            println!("\n{} signatures", rows.len());
        }
    }
    Ok(())
}

pub fn print_error(error: &anyhow::Error) {
    eprintln!("{} {error:#}", "error:".red().bold());
}
