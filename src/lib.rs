//! # deck2slides
//!
//! Convert an uploaded slide deck (PPT, PPTX, PPS, PPSX, ODP or PDF) into an
//! ordered list of PNG slide images, optionally promoted to durable remote
//! storage.
//!
//! ## Why this crate?
//!
//! No single converter is installed everywhere. Office decks need a headless
//! office suite; PDFs can be rasterised by Poppler, Ghostscript, MuPDF or
//! pdfium, whichever the host has. This crate treats each tool as one
//! strategy in an ordered chain, isolates every failure to the strategy (or
//! the slide upload) that caused it, and always hands back slides numbered
//! `1..=N` in page order.
//!
//! ## Pipeline Overview
//!
//! ```text
//! deck
//!  │
//!  ├─ 1. Input    validate extension, readability, presentation id
//!  ├─ 2. Office   soffice --headless --convert-to pdf (office input only)
//!  ├─ 3. Raster   poppler → ghostscript → mupdf → pdfium, first success wins
//!  ├─ 4. Collect  natural sort, renumber to slide-NNN.png
//!  └─ 5. Upload   per-slide promotion, local static path on failure
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deck2slides::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Cloud mode when CLOUDINARY_CLOUD_NAME / _API_KEY / _API_SECRET are all set
//!     let config = ConversionConfig::builder().cloud_from_env().build()?;
//!     let result = convert("/uploads/lecture.pptx", "65f0c2a9", &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&result.records())?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `deck2slides` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! deck2slides = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime Tools
//!
//! | Stage  | Tool | Looked up as |
//! |--------|------|--------------|
//! | Office | LibreOffice | `soffice`, `libreoffice`, known install paths |
//! | Raster | Poppler | `pdftoppm` |
//! | Raster | Ghostscript | `gs`, `ghostscript`, `gswin64c`, `gswin32c` |
//! | Raster | MuPDF | `mutool` |
//! | Raster | pdfium | `PDFIUM_LIB_PATH`, else the system library path |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod probe;
pub mod process;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{CloudCredentials, ConversionConfig, ConversionConfigBuilder, FailureArtifacts};
pub use convert::{convert, convert_from_bytes, convert_sync, probe_tools, SlideConverter, ToolAvailability};
pub use error::{AttemptError, AttemptSummary, ConversionError, UploadError};
pub use output::{ConversionResult, ConversionStats, SlideImage, SlideRecord};
pub use pipeline::render::{PdfToImageConverter, RasterStrategy};
pub use pipeline::upload::{CloudUploader, SlideStore};
pub use probe::{Platform, StrategyProbe};
pub use process::{ProcessRunner, TokioProcessRunner};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
