//! Batch driver.
//!
//! Walks the input paths in order, extracts and summarizes each one, and
//! prints a line per file. Nothing that goes wrong with one file affects
//! the others: extraction failures print `Skipping <file>: <reason>`,
//! model failures print `Failed to guess file <file>: <reason>`, and the
//! loop moves on.

use std::io::{self, Write};
use std::path::PathBuf;

use crate::command::CommandRunner;
use crate::extract::classify_and_extract;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::summarize::{FileSummary, Summarizer};

/// Per-invocation switches.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub model: String,
    /// Echo extraction diagnostics before summarizing.
    pub verbose: bool,
    /// Produce the cross-file summary at the end.
    pub summary: bool,
}

/// What happened to the batch, for callers that want more than stdout.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub described: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Kept only when the aggregate summary was requested.
    pub summaries: Vec<FileSummary>,
    pub overall: Option<String>,
}

/// Process every file and write the results to `out`.
///
/// Only a failure to write to `out` is returned as an error.
pub async fn run_batch<W: Write>(
    files: &[PathBuf],
    options: &RunOptions,
    runner: &dyn CommandRunner,
    summarizer: &dyn Summarizer,
    progress: &dyn ProgressReporter,
    out: &mut W,
) -> io::Result<BatchReport> {
    let mut report = BatchReport::default();
    let total = files.len();

    for (i, path) in files.iter().enumerate() {
        let filename = path.display().to_string();
        progress.report(ProgressEvent::Started {
            index: i + 1,
            total,
            file: filename.clone(),
        });
        if options.verbose {
            writeln!(out, "Processing {}...", filename)?;
        }

        let extracted = match classify_and_extract(path, runner) {
            Ok(extracted) => extracted,
            Err(e) => {
                writeln!(out, "Skipping {}: {}", filename, e)?;
                report.skipped += 1;
                continue;
            }
        };

        if options.verbose {
            writeln!(out, "Content type: {}", extracted.content_type)?;
            writeln!(out, "Content length: {}", extracted.content.len())?;
            writeln!(out, "Content: {}", extracted.content)?;
        }

        progress.report(ProgressEvent::Summarizing {
            file: filename.clone(),
        });
        let file_summary = match summarizer
            .summarize(
                &extracted.content,
                &extracted.content_type,
                &options.model,
                &filename,
            )
            .await
        {
            Ok(fs) => fs,
            Err(e) => {
                writeln!(out, "Failed to guess file {}: {}", filename, e)?;
                report.failed += 1;
                continue;
            }
        };

        writeln!(out, "{}: {}", filename, file_summary.summary)?;
        report.described += 1;
        if options.summary {
            report.summaries.push(file_summary);
        }
    }

    if options.summary && !report.summaries.is_empty() {
        writeln!(out)?;
        writeln!(out, "=== OVERALL SUMMARY ===")?;
        progress.report(ProgressEvent::Aggregating {
            files: report.summaries.len(),
        });
        match summarizer
            .summarize_all(&report.summaries, &options.model)
            .await
        {
            Ok(overall) => {
                writeln!(out, "{}", overall)?;
                report.overall = Some(overall);
            }
            Err(e) => writeln!(out, "Failed to generate overall summary: {}", e)?,
        }
    }

    progress.report(ProgressEvent::Finished {
        described: report.described,
        skipped: report.skipped,
        failed: report.failed,
    });
    Ok(report)
}
