//! Per-texture conversion report
//!
//! Renders the outcomes of a batch as a table, one row per texture, with the
//! color handling that was chosen for it.

use prettytable::{format, Cell, Row, Table};

use crate::conversion::{BatchResult, ConversionOutcome, OutcomeKind};
use crate::utils::display_name;

const MESSAGE_WIDTH: usize = 60;

/// Single row of the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub input_filename: String,
    pub status: String,
    pub color_space: &'static str,
    pub bit_depth: &'static str,
    pub message: String,
}

impl ReportEntry {
    pub fn from_outcome(outcome: &ConversionOutcome) -> Self {
        let class = outcome.class;
        Self {
            input_filename: display_name(&outcome.source),
            status: outcome.kind.to_string(),
            color_space: if class.color_managed { "sRGB" } else { "Raw" },
            bit_depth: if class.displacement { "float" } else { "half" },
            message: first_line(&outcome.message),
        }
    }
}

/// Complete conversion report
#[derive(Debug, Default)]
pub struct ConversionReport {
    pub converted: Vec<ReportEntry>,
    pub skipped: Vec<ReportEntry>,
    pub failed: Vec<ReportEntry>,
}

impl ConversionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_result(result: &BatchResult) -> Self {
        let mut report = Self::new();
        for outcome in &result.outcomes {
            report.add(outcome);
        }
        report
    }

    pub fn add(&mut self, outcome: &ConversionOutcome) {
        let entry = ReportEntry::from_outcome(outcome);
        match outcome.kind {
            OutcomeKind::Converted => self.converted.push(entry),
            OutcomeKind::Skipped(_) => self.skipped.push(entry),
            OutcomeKind::Failed => self.failed.push(entry),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.converted.is_empty() && self.skipped.is_empty() && self.failed.is_empty()
    }

    /// Print the complete report as formatted tables
    pub fn print(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════════════════╗");
        println!("║                                 REPORT                                   ║");
        println!("╚══════════════════════════════════════════════════════════════════════════╝\n");

        let sections = [
            ("CONVERTED", &self.converted),
            ("SKIPPED", &self.skipped),
            ("FAILED", &self.failed),
        ];
        for (title, entries) in sections {
            if entries.is_empty() {
                continue;
            }
            println!("{} ({} total)\n", title, entries.len());
            self.build_table(entries).printstd();
            println!();
        }
    }

    fn build_table(&self, entries: &[ReportEntry]) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);

        table.add_row(Row::new(vec![
            Cell::new("Texture"),
            Cell::new("Status"),
            Cell::new("Input space"),
            Cell::new("Depth"),
            Cell::new("Message"),
        ]));

        for entry in entries {
            table.add_row(Row::new(vec![
                Cell::new(&entry.input_filename),
                Cell::new(&entry.status),
                Cell::new(entry.color_space),
                Cell::new(entry.bit_depth),
                Cell::new(&truncate(&entry.message, MESSAGE_WIDTH)),
            ]));
        }
        table
    }
}

/// Truncate string to fit in column
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

fn first_line(s: &str) -> String {
    s.lines().next().unwrap_or("").trim().to_string()
}
