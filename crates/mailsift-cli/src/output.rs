//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use mailsift_domain::{CanonicalRecord, Importance};
use mailsift_extractor::{BatchReport, BatchStatus, ExtractionMetadata};
use std::collections::BTreeSet;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Longest summary shown in a table cell before truncation.
const SUMMARY_PREVIEW_CHARS: usize = 80;

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Active output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format one extracted record.
    pub fn format_record(&self, record: &CanonicalRecord) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(record)?),
            OutputFormat::Table => Ok(self.format_record_table(record)),
            OutputFormat::Quiet => Ok(record.importance.as_str().to_string()),
        }
    }

    /// Format a record as a field/value table.
    fn format_record_table(&self, record: &CanonicalRecord) -> String {
        let received = record
            .received_at
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();

        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        builder.push_record(["subject", record.subject.as_str()]);
        builder.push_record(["sender", record.sender.as_str()]);
        builder.push_record(["recipients", &join_set(&record.recipients)]);
        builder.push_record(["received_at", &received]);
        builder.push_record(["importance", &self.importance_label(record.importance)]);
        builder.push_record(["keywords_detected", &join_set(&record.keywords_detected)]);
        builder.push_record(["summary", &truncate(&record.summary, SUMMARY_PREVIEW_CHARS)]);
        builder.push_record(["action_required", record.action_required.as_deref().unwrap_or("")]);
        builder.push_record(["deadline", record.deadline.as_deref().unwrap_or("")]);
        builder.push_record(["mentioned_people", &join_set(&record.mentioned_people)]);
        builder.push_record(["mentioned_companies", &join_set(&record.mentioned_companies)]);
        builder.push_record(["mentioned_projects", &join_set(&record.mentioned_projects)]);

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));

        table.to_string()
    }

    /// One-line description of how an extraction went.
    pub fn extraction_stats(&self, metadata: &ExtractionMetadata) -> String {
        self.info(&format!(
            "{} via {} ({} mode): {} fragments, {} recognized, {} ms",
            metadata.source_id,
            metadata.model_name,
            metadata.response_mode,
            metadata.fragment_count,
            metadata.recognized_fragments,
            metadata.processing_time_ms
        ))
    }

    /// Format the outcome of a batch run.
    pub fn format_batch_summary(&self, report: &BatchReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let summary = serde_json::json!({
                    "succeeded": report.succeeded(),
                    "failed": report.failed(),
                    "failures": report.failures,
                });
                Ok(serde_json::to_string_pretty(&summary)?)
            }
            OutputFormat::Quiet => {
                let names: Vec<&str> = report.records.iter().map(|r| r.filename.as_str()).collect();
                Ok(names.join("\n"))
            }
            OutputFormat::Table => Ok(self.format_batch_table(report)),
        }
    }

    fn format_batch_table(&self, report: &BatchReport) -> String {
        let headline = format!(
            "Succeeded: {}, Failed: {}",
            report.succeeded(),
            report.failed()
        );
        let mut out = match report.status() {
            BatchStatus::Complete => self.success(&headline),
            BatchStatus::Partial => self.warning(&headline),
            BatchStatus::AllFailed => self.error(&headline),
            BatchStatus::Empty => return self.colorize("No documents found.", "yellow"),
        };

        if !report.records.is_empty() {
            let mut builder = Builder::default();
            builder.push_record(["File", "Importance", "Subject"]);
            for record in &report.records {
                builder.push_record([
                    record.filename.as_str(),
                    &self.importance_label(record.record.importance),
                    &truncate(&record.record.subject, SUMMARY_PREVIEW_CHARS),
                ]);
            }
            let mut table = builder.build();
            table
                .with(Style::rounded())
                .with(Modify::new(Rows::first()).with(Alignment::center()));
            out.push('\n');
            out.push_str(&table.to_string());
        }

        if !report.failures.is_empty() {
            let mut builder = Builder::default();
            builder.push_record(["File", "Kind", "Reason"]);
            for failure in &report.failures {
                builder.push_record([
                    failure.document_id.as_str(),
                    failure.kind.as_str(),
                    &truncate(&failure.reason, SUMMARY_PREVIEW_CHARS),
                ]);
            }
            let mut table = builder.build();
            table
                .with(Style::rounded())
                .with(Modify::new(Rows::first()).with(Alignment::center()));
            out.push('\n');
            out.push_str(&table.to_string());
        }

        out
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn importance_label(&self, importance: Importance) -> String {
        let color = match importance {
            Importance::Critical => "red",
            Importance::Normal => "",
            Importance::Low => "cyan",
        };
        self.colorize(importance.as_str(), color)
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

fn join_set(values: &BTreeSet<String>) -> String {
    values.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Truncate on a character boundary, appending an ellipsis when shortened.
fn truncate(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}
