//! Human-readable per-file reports and the run summary.

use std::io::{self, Write};

use crate::checker::CheckResult;

const HEADER: [&str; 4] = ["Ref", "Status", "Lines", "Details"];

/// Totals across a run; decides the exit status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Workflow files processed, including ones that failed.
    pub files: usize,
    /// References checked.
    pub references: usize,
    /// Failed references plus failed files.
    pub failures: usize,
}

impl Summary {
    /// Counts a checked file and its results.
    pub fn record_results(&mut self, results: &[CheckResult]) {
        self.files += 1;
        self.references += results.len();
        self.failures += results.iter().filter(|r| !r.is_ok()).count();
    }

    /// Counts a file or target that could not be processed.
    pub fn record_failure(&mut self) {
        self.files += 1;
        self.failures += 1;
    }

    /// Returns `true` when every reference was reachable and every file
    /// was processed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }
}

/// Renders source lines as `[3 17]`.
#[must_use]
pub fn format_lines(lines: &[usize]) -> String {
    let joined: Vec<String> = lines.iter().map(ToString::to_string).collect();
    format!("[{}]", joined.join(" "))
}

/// Renders results as a boxed `Ref | Status | Lines | Details` table.
#[must_use]
pub fn render_table(results: &[CheckResult]) -> String {
    let rows: Vec<[String; 4]> = results
        .iter()
        .map(|r| {
            let (status, details) = match &r.error {
                None if r.reachable => ("OK", String::new()),
                None => ("ERROR", String::new()),
                Some(e) => ("ERROR", e.to_string()),
            };
            [r.reference.clone(), status.to_string(), format_lines(&r.lines), details]
        })
        .collect();

    let mut widths = HEADER.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let border = {
        let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(w + 2)).collect();
        format!("+{}+\n", dashes.join("+"))
    };
    let line = |cells: [&str; 4]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!(" {cell:<width$} "))
            .collect();
        format!("|{}|\n", padded.join("|"))
    };

    let mut table = border.clone();
    table.push_str(&line(HEADER));
    table.push_str(&border);
    for row in &rows {
        table.push_str(&line(row.each_ref().map(String::as_str)));
    }
    table.push_str(&border);
    table
}

/// Writes one file's section: its path, then the table and a blank line
/// when it has references.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn write_file_report(
    out: &mut dyn Write,
    path: &str,
    results: &[CheckResult],
) -> io::Result<()> {
    writeln!(out, "{path}")?;
    if results.is_empty() {
        return Ok(());
    }
    write!(out, "{}", render_table(results))?;
    writeln!(out)
}

/// Writes a file's path followed by the error that stopped it.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn write_file_error(
    out: &mut dyn Write,
    path: &str,
    error: &dyn std::fmt::Display,
) -> io::Result<()> {
    writeln!(out, "{path}")?;
    writeln!(out, "ERROR: {error}")?;
    writeln!(out)
}
