pub mod types;
pub mod xlsx;

pub use types::{ProcessedRecord, ReportRow};
pub use xlsx::XlsxRenderer;

use crate::pr::types::ChangeKind;
use colored::Colorize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write spreadsheet: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("No workspace folder found at '{0}'. Please open a workspace folder to save the file.")]
    NoWorkspace(PathBuf),
}

/// Column headers, in order. Every renderer emits exactly these columns.
pub const COLUMNS: [&str; 6] = [
    "Sprint",
    "Path",
    "Task",
    "Component Type",
    "Change Kind",
    "Owner",
];

/// Turns processed records into a tabular artifact at `output`.
pub trait ReportRenderer {
    fn render(&self, records: &[ProcessedRecord], output: &Path) -> Result<(), ReportError>;
}

/// One row per (record, change) pair, records in order, changes in order.
pub fn rows(records: &[ProcessedRecord]) -> Vec<ReportRow> {
    records
        .iter()
        .flat_map(|record| {
            let task = record.task_label();
            record.changes.iter().map(move |change| ReportRow {
                sprint: record.sprint,
                path: change.path.clone(),
                task: task.clone(),
                component_type: change.component_type,
                change_kind: change.change_kind.label(),
                owner: record.owner.clone(),
            })
        })
        .collect()
}

/// Resolve the report file inside the workspace root. The root must be an
/// existing directory.
pub fn output_path(workspace: &Path, file_name: &str) -> Result<PathBuf, ReportError> {
    if !workspace.is_dir() {
        return Err(ReportError::NoWorkspace(workspace.to_path_buf()));
    }
    Ok(workspace.join(file_name))
}

/// Print a colored per-task summary of the report to the terminal.
pub fn print_summary(records: &[ProcessedRecord], written_to: &Path) {
    debug!(records = records.len(), "printing terminal summary");
    println!();
    for record in records {
        println!(
            "═══ {} ═══ (sprint {}, owner {})",
            record.task_label().bold(),
            record.sprint,
            record.owner
        );
        if record.changes.is_empty() {
            println!("  No changes.");
        }
        for change in &record.changes {
            println!(
                "  {:<9} {:<28} {}",
                colorize_kind(change.change_kind),
                change.component_type,
                change.path
            );
        }
        println!();
    }

    let changes: usize = records.iter().map(|r| r.changes.len()).sum();
    println!(
        "═══ {} tasks, {} changes → {} ═══",
        records.len(),
        changes,
        written_to.display()
    );
    println!();
}

fn colorize_kind(kind: ChangeKind) -> colored::ColoredString {
    match kind {
        ChangeKind::Added => kind.label().green().bold(),
        ChangeKind::Modified => kind.label().yellow().bold(),
        ChangeKind::Deleted => kind.label().red().bold(),
        ChangeKind::Unknown => kind.label().dimmed(),
    }
}
