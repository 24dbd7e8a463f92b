// Summary rendering for finished mirrors

use colored::Colorize;
use sitegrab_engine::MirrorSummary;
use std::path::Path;

/// Failed URLs listed in the text report before collapsing into a count.
pub const FAILED_PREVIEW_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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

pub fn render_report(
    summary: &MirrorSummary,
    output_dir: &Path,
    format: ReportFormat,
) -> Result<String, String> {
    match format {
        ReportFormat::Text => Ok(generate_summary_report(summary, output_dir)),
        ReportFormat::Json => serde_json::to_string_pretty(summary)
            .map_err(|e| format!("Failed to serialize summary: {}", e)),
    }
}

/// Generate the human-readable summary printed after a mirror run
pub fn generate_summary_report(summary: &MirrorSummary, output_dir: &Path) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Pages saved: {}\n", summary.page_count()));
    report.push_str(&format!("  Assets downloaded: {}\n", summary.asset_count()));
    report.push_str(&format!("  Failed URLs: {}\n", summary.failed_count()));
    report.push_str(&format!("  Bytes written: {}\n", summary.total_bytes()));
    report.push_str(&format!("  Output directory: {}\n", output_dir.display()));

    if summary.interrupted {
        report.push_str(&format!(
            "\n  {}\n",
            "Interrupted: the mirror is incomplete".yellow()
        ));
    }

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    if summary.failed.is_empty() {
        return report;
    }

    report.push_str("\n## Failed URLs\n");
    for failed in summary.failed.iter().take(FAILED_PREVIEW_LIMIT) {
        report.push_str(&format!(
            "  {} {} {}\n",
            format!("[{}]", failed.kind).red(),
            failed.url,
            format!("({})", failed.reason).bright_black()
        ));
    }

    let overflow = summary.failed.len().saturating_sub(FAILED_PREVIEW_LIMIT);
    if overflow > 0 {
        report.push_str(&format!("  ... and {} more\n", overflow));
    }

    report
}
