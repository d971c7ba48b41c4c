//! Output formatting for the CLI.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::pipeline::PipelineReport;

use super::args::OutputFormat;

/// Output formatter for the CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Resource row for table display.
#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a pipeline report for display.
    #[must_use]
    pub fn format_report(&self, report: &PipelineReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    /// Formats a report as text.
    fn format_report_text(report: &PipelineReport) -> String {
        let mut output = String::new();

        let _ = writeln!(
            output,
            "\n{} Deployment complete (run {})",
            "\u{2713}".green(),
            report.run_id
        );

        let rows: Vec<ResourceRow> = report
            .outputs
            .iter()
            .map(|(key, outputs)| ResourceRow {
                resource: key.to_string(),
                name: outputs.name.clone(),
                endpoint: outputs
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| String::from("-")),
            })
            .collect();

        if !rows.is_empty() {
            let table = Table::new(rows).to_string();
            output.push_str(&table);
            output.push('\n');
        }

        let _ = writeln!(output, "\nStages:");
        for stage in &report.stages {
            let _ = writeln!(
                output,
                "  {} {} ({:.1}s)",
                "\u{2713}".green(),
                stage.stage,
                stage.duration_secs
            );
        }

        let _ = writeln!(
            output,
            "\nBackend registered behind the gateway: {}",
            report.backend_url.bold()
        );

        output
    }
}
