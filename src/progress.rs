//! Batch progress reporting.
//!
//! Progress goes to **stderr** so stdout carries only the descriptions and
//! skip messages. Human mode prints one line per step; JSON mode prints one
//! object per line for wrappers that want to render their own UI.

use std::io::Write;

/// A single progress event for a batch run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// File `index` (1-based) of `total` is being extracted.
    Started {
        index: usize,
        total: usize,
        file: String,
    },
    /// Extraction succeeded; waiting on the model.
    Summarizing { file: String },
    /// Building the cross-file summary over `files` results.
    Aggregating { files: usize },
    /// The batch is done.
    Finished {
        described: usize,
        skipped: usize,
        failed: usize,
    },
}

/// Receives progress events from the batch driver.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: `wut  [2/5]  src/main.rs`.
pub struct HumanProgress;

impl HumanProgress {
    fn line(event: &ProgressEvent) -> String {
        match event {
            ProgressEvent::Started { index, total, file } => {
                format!("wut  [{}/{}]  {}\n", index, total, file)
            }
            ProgressEvent::Summarizing { file } => format!("wut  summarizing  {}\n", file),
            ProgressEvent::Aggregating { files } => {
                format!("wut  aggregating  {} files\n", files)
            }
            ProgressEvent::Finished {
                described,
                skipped,
                failed,
            } => format!(
                "wut  done  {} described, {} skipped, {} failed\n",
                described, skipped, failed
            ),
        }
    }
}

impl ProgressReporter for HumanProgress {
    fn report(&self, event: ProgressEvent) {
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(Self::line(&event).as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JsonProgress {
    fn value(event: &ProgressEvent) -> serde_json::Value {
        match event {
            ProgressEvent::Started { index, total, file } => serde_json::json!({
                "event": "progress",
                "phase": "extracting",
                "file": file,
                "n": index,
                "total": total
            }),
            ProgressEvent::Summarizing { file } => serde_json::json!({
                "event": "progress",
                "phase": "summarizing",
                "file": file
            }),
            ProgressEvent::Aggregating { files } => serde_json::json!({
                "event": "progress",
                "phase": "aggregating",
                "files": files
            }),
            ProgressEvent::Finished {
                described,
                skipped,
                failed,
            } => serde_json::json!({
                "event": "done",
                "described": described,
                "skipped": skipped,
                "failed": failed
            }),
        }
    }
}

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        if let Ok(line) = serde_json::to_string(&Self::value(&event)) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse a `--progress` value. `auto` defers to [`Self::default_for_tty`].
    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "auto" => Ok(Self::default_for_tty()),
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!(
                "invalid progress mode '{}': expected auto, off, human, or json",
                other
            )),
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(HumanProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
