//! File classification and content extraction.
//!
//! Given a path, [`classify_and_extract`] asks `file --mime-type` for the
//! content type and then produces the representation that gets sent to the
//! model:
//!
//! | Content type | Representation |
//! |--------------|----------------|
//! | `application/pdf*` | stdout of `pdftotext <path> -` |
//! | `application/x-mach-binary` | labeled report from binary inspection tools |
//! | `image/*` | base64 of the raw bytes |
//! | `text/*`, or anything containing `text` | file contents |
//! | anything else | file contents if there is no NUL byte, otherwise empty |
//!
//! Errors here are per-file: the batch driver prints them and moves on.

use std::borrow::Cow;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

use base64::Engine;

use crate::command::CommandRunner;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_MACH_BINARY: &str = "application/x-mach-binary";

/// Section headers of the binary report, in output order.
pub const BINARY_SECTIONS: [&str; 6] = [
    "=== FILE INFO ===",
    "=== SHARED LIBRARIES & FRAMEWORKS ===",
    "=== ENTITLEMENTS & SIGNING ===",
    "=== LOAD COMMANDS (Headers) ===",
    "=== EXTERNAL SYMBOLS (Imports) ===",
    "=== INTERESTING STRINGS ===",
];

// The path is passed to `sh -c` as `$1`, never spliced into the script.
const LOAD_COMMANDS_SCRIPT: &str =
    r#"otool -l "$1" | grep -A 5 "LC_VERSION_MIN\|LC_BUILD_VERSION\|LC_ENCRYPTION_INFO""#;
const IMPORTS_SCRIPT: &str = r#"nm -u "$1" | c++filt | head -n 100"#;
const STRINGS_SCRIPT: &str =
    r#"strings "$1" | grep -E "https?://|/usr/|/System/|/var/" | head -n 50"#;

/// Content extracted from one file, ready for summarization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub content: String,
    pub content_type: String,
}

/// Why a file could not be classified or extracted.
#[derive(Debug)]
pub enum ExtractError {
    /// Stat or read failed (including a missing file).
    Io { op: &'static str, source: io::Error },
    IsDirectory(PathBuf),
    /// Sockets, FIFOs, devices.
    NotRegularFile(PathBuf),
    /// `file` could not run or its output made no sense.
    Classification(String),
    Extraction { what: &'static str, message: String },
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Io { op, source } => write!(f, "failed to {}: {}", op, source),
            ExtractError::IsDirectory(path) => write!(f, "{} is a directory", path.display()),
            ExtractError::NotRegularFile(path) => {
                write!(f, "{} is not a regular file", path.display())
            }
            ExtractError::Classification(e) => {
                write!(f, "failed to determine content type: {}", e)
            }
            ExtractError::Extraction { what, message } => {
                write!(f, "failed to extract {}: {}", what, message)
            }
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Classify `path` and extract the representation matching its type.
pub fn classify_and_extract(
    path: &Path,
    runner: &dyn CommandRunner,
) -> Result<Extracted, ExtractError> {
    let meta = std::fs::metadata(path).map_err(|source| ExtractError::Io {
        op: "stat file",
        source,
    })?;
    if meta.is_dir() {
        return Err(ExtractError::IsDirectory(path.to_path_buf()));
    }
    if !meta.is_file() {
        return Err(ExtractError::NotRegularFile(path.to_path_buf()));
    }

    let content_type = content_type(path, runner)?;
    tracing::debug!(path = %path.display(), %content_type, "classified file");

    let content = if content_type.starts_with(MIME_PDF) {
        extract_pdf(path, runner)?
    } else if content_type == MIME_MACH_BINARY {
        extract_binary_info(path, runner)
    } else if content_type.starts_with("image/") {
        let bytes = read(path)?;
        base64::engine::general_purpose::STANDARD.encode(bytes)
    } else if content_type.contains("text") {
        let bytes = read(path)?;
        String::from_utf8_lossy(&bytes).into_owned()
    } else {
        // Unknown type: keep it only if it doesn't look binary.
        match std::fs::read(path) {
            Ok(bytes) if !bytes.contains(&0) => String::from_utf8_lossy(&bytes).into_owned(),
            _ => String::new(),
        }
    };

    Ok(Extracted {
        content,
        content_type,
    })
}

/// Ask `file --mime-type` for the MIME type of `path`.
pub fn content_type(path: &Path, runner: &dyn CommandRunner) -> Result<String, ExtractError> {
    let target = operand(path);
    let target: &OsStr = &target;
    let out = runner
        .run("file", &[OsStr::new("--mime-type"), OsStr::new("--"), target])
        .map_err(|e| ExtractError::Classification(format!("file command failed: {}", e)))?;
    if !out.success {
        return Err(ExtractError::Classification(format!(
            "file command failed: {}",
            out.stderr_trimmed()
        )));
    }
    let stdout = out.stdout_lossy();
    parse_mime_output(&stdout).ok_or_else(|| {
        ExtractError::Classification(format!("unexpected file output: {:?}", stdout.trim()))
    })
}

/// Parse `"<name>: <type>"`. MIME types never contain a colon, so the split
/// is on the last one and names with colons survive.
pub fn parse_mime_output(output: &str) -> Option<String> {
    let (_, mime) = output.trim_end().rsplit_once(':')?;
    let mime = mime.trim();
    if mime.is_empty() {
        None
    } else {
        Some(mime.to_string())
    }
}

fn extract_pdf(path: &Path, runner: &dyn CommandRunner) -> Result<String, ExtractError> {
    let target = operand(path);
    let target: &OsStr = &target;
    let pdf_err = |message: String| ExtractError::Extraction {
        what: "text from PDF",
        message,
    };
    let out = runner
        .run("pdftotext", &[target, OsStr::new("-")])
        .map_err(|e| pdf_err(format!("pdftotext failed: {}", e)))?;
    if !out.success {
        return Err(pdf_err(format!("pdftotext failed: {}", out.stderr_trimmed())));
    }
    Ok(out.stdout_lossy())
}

/// Run every binary inspection tool and stitch the outputs together under
/// [`BINARY_SECTIONS`]. Tool failures leave their section empty (or holding
/// whatever the tool printed before failing); they never fail the file.
pub fn extract_binary_info(path: &Path, runner: &dyn CommandRunner) -> String {
    let target = operand(path);
    let p: &OsStr = &target;
    let os = OsStr::new;
    let probes: [(&str, Vec<&OsStr>); 6] = [
        ("file", vec![os("--"), p]),
        ("otool", vec![os("-L"), p]),
        ("codesign", vec![os("-d"), os("--entitlements"), os(":-"), p]),
        ("sh", vec![os("-c"), os(LOAD_COMMANDS_SCRIPT), os("wut"), p]),
        ("sh", vec![os("-c"), os(IMPORTS_SCRIPT), os("wut"), p]),
        ("sh", vec![os("-c"), os(STRINGS_SCRIPT), os("wut"), p]),
    ];

    let mut report = String::new();
    for (i, (header, (program, args))) in BINARY_SECTIONS.iter().zip(probes.iter()).enumerate() {
        if i > 0 {
            report.push('\n');
        }
        report.push_str(header);
        report.push('\n');
        match runner.run(program, args) {
            Ok(out) => report.push_str(&out.combined()),
            Err(e) => tracing::warn!(section = *header, program, error = %e, "binary probe failed"),
        }
    }
    report
}

/// `path` as a command operand. Relative paths starting with `-` get a
/// `./` prefix so no tool mistakes them for an option.
fn operand(path: &Path) -> Cow<'_, OsStr> {
    if path.as_os_str().as_encoded_bytes().starts_with(b"-") {
        Cow::Owned(Path::new(".").join(path).into_os_string())
    } else {
        Cow::Borrowed(path.as_os_str())
    }
}

fn read(path: &Path) -> Result<Vec<u8>, ExtractError> {
    std::fs::read(path).map_err(|source| ExtractError::Io {
        op: "read file",
        source,
    })
}
