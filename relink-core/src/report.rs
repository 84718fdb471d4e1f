// Run report rendering

use crate::detect::ChangeKind;
use crate::error::Result;
use crate::pipeline::{RunOutcome, RunReport, WriteTarget};
use colored::Colorize;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

pub fn render(report: &RunReport, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(render_text(report)),
        ReportFormat::Json => render_json(report),
    }
}

pub fn render_json(report: &RunReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn render_text(report: &RunReport) -> String {
    let mut out = String::new();

    let headline = match report.outcome {
        RunOutcome::Updated => "UPDATED".green().bold(),
        RunOutcome::NoChanges => "NO CHANGES".bright_black().bold(),
    };
    out.push_str(&format!("{} {}\n", "Run".bold(), headline));
    if report.dry_run {
        out.push_str(&format!("  {}\n", "dry run, nothing was written".yellow()));
    }
    out.push_str(&format!("  Source: {}\n", report.source));
    out.push_str(&format!("  Links found: {}\n", report.extracted));
    out.push_str(&format!(
        "  Started: {}\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push('\n');

    if !report.detection.details.is_empty() {
        out.push_str(&format!("{}\n", "Changes".bold()));
        for change in &report.detection.details {
            let marker = match change.kind {
                ChangeKind::Added => "+".green().bold(),
                ChangeKind::Updated => "~".cyan().bold(),
            };
            out.push_str(&format!("  {} {}\n", marker, change.label));
            if let Some(old) = &change.old_url {
                out.push_str(&format!("      {}\n", old.bright_black()));
            }
            out.push_str(&format!("      {}\n", change.new_url));
        }
        out.push('\n');
    }

    out.push_str(&format!("{}\n", "rclone config".bold()));
    if report.patch.touched.is_empty() {
        out.push_str("  No sections rewritten\n");
    } else {
        for label in &report.patch.touched {
            out.push_str(&format!("  {} {}\n", "✓".green(), label));
        }
    }
    if !report.patch.missing_sections.is_empty() {
        out.push_str(&format!(
            "  {} {} missing section(s): {}\n",
            "!".yellow(),
            report.patch.missing_sections.len(),
            report.patch.missing_sections.join(", ")
        ));
    }
    if !report.patch.missing_fields.is_empty() {
        out.push_str(&format!(
            "  {} section(s) without a url field: {}\n",
            "!".yellow(),
            report.patch.missing_fields.join(", ")
        ));
    }
    if !report.unmapped.is_empty() {
        out.push_str(&format!(
            "  {} unmapped label(s): {}\n",
            "i".blue(),
            report.unmapped.join(", ")
        ));
    }
    out.push('\n');

    out.push_str(&format!(
        "{} {} sent, {} failed\n",
        "Notifications".bold(),
        report.notifications.sent,
        report.notifications.failed
    ));

    for failure in &report.failures {
        let target = match failure.target {
            WriteTarget::Store => "record store",
            WriteTarget::Document => "rclone config",
            WriteTarget::History => "run history",
        };
        let subject = failure
            .label
            .as_deref()
            .map(|label| format!(" ({})", label))
            .unwrap_or_default();
        out.push_str(&format!(
            "{} {}{}: {}\n",
            "✗ write failed:".red().bold(),
            target,
            subject,
            failure.message
        ));
    }

    out
}
