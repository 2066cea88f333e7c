//! Error types for the deck2slides library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`ConversionError`] — **Fatal**: the job cannot produce a slide list
//!   (unsupported input, every office candidate failed, every raster strategy
//!   exhausted). Returned as `Err(ConversionError)` from the `convert*`
//!   functions. The caller never receives a partial result.
//!
//! * [`AttemptError`] — **Recoverable**: one command candidate or one raster
//!   strategy failed. The chain logs it and moves on to the next option.
//!   Only when every option fails are the collected attempts folded into a
//!   fatal [`ConversionError`].
//!
//! * [`UploadError`] — **Isolated**: one slide image could not be promoted to
//!   remote storage. The slide falls back to its local static path and the
//!   job carries on.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the deck2slides library.
#[derive(Debug, Error)]
pub enum ConversionError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The source extension is neither a PDF nor a supported office deck.
    #[error("Unsupported slide deck '{path}': extension '{extension}' is not one of pdf, ppt, pptx, pps, ppsx, odp")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// Source file was not found at the given path.
    #[error("Slide deck not found: '{path}'")]
    SourceNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The file has a `.pdf` extension but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The presentation id cannot be used as a directory namespace.
    #[error("Invalid presentation id '{id}': {reason}")]
    InvalidPresentationId { id: String, reason: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// No office-to-PDF candidate produced a PDF.
    #[error(
        "Cannot convert '{source_path}' to PDF: no office converter succeeded.\n\
Install LibreOffice (soffice) on the server.\n{}",
        AttemptSummary::render_all(.attempts)
    )]
    OfficeConversionUnavailable {
        source_path: PathBuf,
        attempts: Vec<AttemptSummary>,
    },

    /// Every raster strategy was tried and none produced a slide image.
    #[error(
        "PDF rasterisation failed: no conversion tool available.\n\
Install Poppler (pdftoppm), Ghostscript, MuPDF or libpdfium on the server.\n{}",
        AttemptSummary::render_all(.attempts)
    )]
    NoRasterToolAvailable { attempts: Vec<AttemptSummary> },

    /// The per-presentation working directory could not be prepared.
    #[error("Working directory '{path}' is unusable: {source}")]
    WorkingDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A recoverable failure of one command candidate or one raster strategy.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// The executable is not installed (or not on `PATH`).
    #[error("'{program}' not found")]
    ToolNotFound { program: String },

    /// The tool ran past its time budget and was killed.
    #[error("'{program}' timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    /// The tool ran but exited with a failure status.
    #[error("'{program}' exited with code {code:?}: {stderr}")]
    ToolFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The tool reported success but the expected file is missing or empty.
    #[error("expected output '{path}' was not produced")]
    MissingOutput { path: PathBuf },

    /// The strategy claimed success but left no PNG behind.
    #[error("no slide images generated in '{dir}'")]
    NoSlidesGenerated { dir: PathBuf },

    /// An in-process library (pdfium, buffered conversion) failed.
    #[error("{detail}")]
    Library { detail: String },

    /// IO error while preparing or inspecting an attempt.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AttemptError {
    /// `true` when the failure just means "this tool isn't installed here".
    ///
    /// These are expected in most environments and are logged at debug level
    /// only.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AttemptError::ToolNotFound { .. })
    }

    /// Truncate long stderr captures to keep log lines readable.
    pub(crate) fn truncate(s: &str, max: usize) -> String {
        let trimmed = s.trim();
        if trimmed.chars().count() > max {
            let head: String = trimmed.chars().take(max).collect();
            format!("{head}\u{2026}")
        } else {
            trimmed.to_string()
        }
    }
}

/// One entry of the "what was tried" list carried by fatal errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptSummary {
    /// Strategy or command-candidate name.
    pub name: String,
    /// Rendered [`AttemptError`].
    pub error: String,
}

impl AttemptSummary {
    pub fn new(name: impl Into<String>, error: &AttemptError) -> Self {
        Self {
            name: name.into(),
            error: error.to_string(),
        }
    }

    fn render_all(attempts: &[AttemptSummary]) -> String {
        attempts
            .iter()
            .map(|a| format!("  • {a}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for AttemptSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.error)
    }
}

/// A failure to promote one slide image to remote storage.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Generic per-slide failure, wrapping the store's own error text.
    #[error("Upload of slide {slide_number} failed: {detail}")]
    UploadFailure { slide_number: usize, detail: String },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered but refused the upload.
    #[error("store rejected upload with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The store's reply did not contain a durable URL.
    #[error("store response missing '{field}'")]
    MalformedResponse { field: &'static str },

    /// Reading the local image failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
