//! Result rendering: console display plus CSV/JSON/HTML export with
//! format auto-detection from the output file extension.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::models::LinkResult;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("unsupported format '{0}', use csv, json, or html")]
    UnsupportedFormat(String),

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Infer a format from the output path extension.
pub fn detect_format(output_path: &str) -> Option<&'static str> {
    match Path::new(output_path)
        .extension()?
        .to_str()?
        .to_ascii_lowercase()
        .as_str()
    {
        "csv" => Some("csv"),
        "json" => Some("json"),
        "html" | "htm" => Some("html"),
        _ => None,
    }
}

/// Print broken links (or everything with `show_all`) to stdout.
pub fn display_results(results: &[LinkResult], show_all: bool) {
    let shown: Vec<&LinkResult> = results
        .iter()
        .filter(|r| show_all || r.is_broken())
        .collect();

    if shown.is_empty() {
        println!("No broken links found!");
        return;
    }

    println!();
    println!("{}:", if show_all { "Links" } else { "Broken links" });
    println!("=============");

    for link in shown {
        if !link.error.is_empty() {
            println!(
                "- {} (from {}): Error: {}",
                link.target_url, link.source_url, link.error
            );
        } else {
            println!(
                "- {} (from {}): Status: {}",
                link.target_url, link.source_url, link.status
            );
        }
    }
}

/// Write results in the given format. An empty format falls back to
/// whatever the output extension suggests.
pub fn export_results(
    results: &[LinkResult],
    format: &str,
    output_path: &str,
) -> Result<(), ReportError> {
    let format = if format.is_empty() {
        detect_format(output_path)
            .ok_or_else(|| ReportError::UnsupportedFormat(output_path.to_string()))?
    } else {
        format
    };

    match format.to_ascii_lowercase().as_str() {
        "csv" => export_csv(results, output_path),
        "json" => export_json(results, output_path),
        "html" => export_html(results, output_path),
        other => Err(ReportError::UnsupportedFormat(other.to_string())),
    }
}

fn export_csv(results: &[LinkResult], path: &str) -> Result<(), ReportError> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "Source URL,Target URL,Status,Error,Is External")?;

    for r in results {
        writeln!(
            writer,
            "{},{},{},{},{}",
            csv_field(&r.source_url),
            csv_field(&r.target_url),
            r.status,
            csv_field(&r.error),
            r.is_external
        )?;
    }

    writer.flush()?;
    tracing::info!(path, count = results.len(), "wrote CSV report");
    Ok(())
}

fn export_json(results: &[LinkResult], path: &str) -> Result<(), ReportError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, results)?;
    writer.flush()?;
    tracing::info!(path, count = results.len(), "wrote JSON report");
    Ok(())
}

fn export_html(results: &[LinkResult], path: &str) -> Result<(), ReportError> {
    let mut writer = BufWriter::new(File::create(path)?);

    writeln!(
        writer,
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>DeadLinkr Report</title>
<style>
  body {{ font-family: sans-serif; margin: 2em; }}
  table {{ border-collapse: collapse; width: 100%; }}
  th, td {{ border: 1px solid #ccc; padding: 6px 10px; text-align: left; }}
  tr.good td.status {{ color: #2a7d2a; }}
  tr.warning td.status {{ color: #b58900; }}
  tr.error td.status {{ color: #c0392b; }}
</style>
</head>
<body>
<h1>DeadLinkr Report</h1>
<table>
<tr><th>Source URL</th><th>Target URL</th><th>Status</th><th>Error</th><th>External</th></tr>"#
    )?;

    for r in results {
        writeln!(
            writer,
            r#"<tr class="{}"><td>{}</td><td>{}</td><td class="status">{}</td><td>{}</td><td>{}</td></tr>"#,
            status_class(r.status),
            html_escape(&r.source_url),
            html_escape(&r.target_url),
            r.status,
            html_escape(&r.error),
            r.is_external
        )?;
    }

    writeln!(writer, "</table>\n</body>\n</html>")?;
    writer.flush()?;
    tracing::info!(path, count = results.len(), "wrote HTML report");
    Ok(())
}

fn status_class(status: u16) -> &'static str {
    match status {
        200..=299 => "good",
        300..=399 => "warning",
        _ => "error",
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
