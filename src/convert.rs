//! Conversion entry points: one job from uploaded deck to slide list.
//!
//! [`SlideConverter`] sequences the stages:
//!
//! ```text
//! validate ─▶ office → PDF (office input only) ─▶ raster chain ─▶ upload
//! ```
//!
//! The caller gets either the complete, ordered slide list or one fatal
//! [`ConversionError`]. A PDF produced by the office stage belongs to the job
//! and is removed on every exit path; the caller's source file is never
//! touched.

use crate::config::{ConversionConfig, FailureArtifacts};
use crate::error::ConversionError;
use crate::output::{ConversionResult, ConversionStats};
use crate::pipeline::collect::{clear_pngs, SlideCollector};
use crate::pipeline::input::{ConversionJob, SourceFormat};
use crate::pipeline::office::OfficeToPdfConverter;
use crate::pipeline::render::PdfToImageConverter;
use crate::pipeline::upload::CloudUploader;
use crate::probe::{Capability, StrategyProbe};
use crate::process::{ProcessRunner, TokioProcessRunner};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Drives conversion jobs with a fixed set of stages.
///
/// Stages are immutable configuration, so one converter can serve many jobs.
pub struct SlideConverter {
    config: ConversionConfig,
    office: OfficeToPdfConverter,
    raster: PdfToImageConverter,
    uploader: CloudUploader,
    collector: SlideCollector,
}

impl SlideConverter {
    /// Real tools for the current platform.
    pub fn new(config: ConversionConfig) -> Self {
        Self::with_runner(config, Arc::new(TokioProcessRunner), StrategyProbe::default())
    }

    /// Standard stages on top of a custom process runner.
    pub fn with_runner(config: ConversionConfig, runner: Arc<dyn ProcessRunner>, probe: StrategyProbe) -> Self {
        let timeout = Duration::from_secs(config.process_timeout_secs);
        let office = OfficeToPdfConverter::new(Arc::clone(&runner), &probe, timeout);
        let raster = PdfToImageConverter::standard(runner, probe, &config);
        let uploader = CloudUploader::from_config(&config);
        Self::from_parts(config, office, raster, uploader)
    }

    /// Assemble a converter from explicit stages.
    pub fn from_parts(
        config: ConversionConfig,
        office: OfficeToPdfConverter,
        raster: PdfToImageConverter,
        uploader: CloudUploader,
    ) -> Self {
        Self {
            config,
            office,
            raster,
            uploader,
            collector: SlideCollector,
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn raster(&self) -> &PdfToImageConverter {
        &self.raster
    }

    /// Convert `source` into slides under `presentation_id`.
    ///
    /// # Errors
    /// Input errors are returned before any external tool runs.
    /// [`ConversionError::OfficeConversionUnavailable`] and
    /// [`ConversionError::NoRasterToolAvailable`] are the pipeline's fatal
    /// outcomes. Upload failures are never returned.
    pub async fn convert(
        &self,
        source: impl AsRef<Path>,
        presentation_id: &str,
    ) -> Result<ConversionResult, ConversionError> {
        let result = self.run_job(source.as_ref(), presentation_id).await;
        if let (Err(e), Some(cb)) = (&result, self.config.progress_callback.as_ref()) {
            cb.on_conversion_failed(&e.to_string());
        }
        result
    }

    async fn run_job(
        &self,
        source: &Path,
        presentation_id: &str,
    ) -> Result<ConversionResult, ConversionError> {
        let total_start = Instant::now();
        let config = &self.config;
        let progress = config.progress_callback.as_ref();

        // ── Step 1: Validate input ───────────────────────────────────────
        let job = ConversionJob::new(source, presentation_id, config)?;
        info!(
            "Converting {} for presentation '{}'",
            job.source_path.display(),
            job.presentation_id
        );
        if let Some(cb) = progress {
            cb.on_conversion_start(&job.presentation_id);
        }

        let mut stats = ConversionStats::default();

        // ── Step 2: Office → PDF ─────────────────────────────────────────
        let mut intermediate = IntermediatePdf::default();
        let pdf_path = match job.format {
            SourceFormat::Pdf => job.source_path.clone(),
            SourceFormat::Office => {
                if let Some(cb) = progress {
                    cb.on_office_conversion_start();
                }
                let office_start = Instant::now();
                let converted = self.office.convert(&job.source_path).await?;
                stats.office_duration_ms = office_start.elapsed().as_millis() as u64;
                if let Some(cb) = progress {
                    cb.on_office_conversion_complete(&converted.via);
                }
                stats.office_converter = Some(converted.via);
                intermediate.claim(&converted.pdf_path, &job.source_path);
                converted.pdf_path
            }
        };

        // ── Step 3: Rasterise ────────────────────────────────────────────
        // Created only now, so a failed office stage leaves no empty directory.
        job.prepare_working_dir().await?;
        let raster_start = Instant::now();
        let outcome = match self.raster.rasterize(&pdf_path, &job.working_dir, progress).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.discard_failed_output(&job.working_dir).await;
                return Err(e);
            }
        };
        stats.raster_duration_ms = raster_start.elapsed().as_millis() as u64;
        stats.raster_strategy = outcome.strategy.clone();
        stats.strategies_tried = outcome.strategies_tried;
        intermediate.release().await;

        // ── Step 4: Promote ──────────────────────────────────────────────
        let slides = self
            .collector
            .slide_images(&outcome.files, &job.presentation_id, config);
        let upload_start = Instant::now();
        let slides = self
            .uploader
            .promote(slides, &config.cloud_folder(&job.presentation_id), progress)
            .await;
        stats.upload_duration_ms = upload_start.elapsed().as_millis() as u64;

        stats.slide_count = slides.len();
        stats.uploaded = slides.iter().filter(|s| s.is_remote()).count();
        stats.local_fallbacks = if self.uploader.is_enabled() {
            stats.slide_count - stats.uploaded
        } else {
            0
        };
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

        info!(
            "Presentation '{}': {} slide(s) via {} ({} uploaded), {}ms total",
            job.presentation_id,
            stats.slide_count,
            stats.raster_strategy,
            stats.uploaded,
            stats.total_duration_ms
        );
        if let Some(cb) = progress {
            cb.on_conversion_complete(stats.slide_count);
        }

        Ok(ConversionResult {
            presentation_id: job.presentation_id,
            slides,
            stats,
        })
    }

    /// Apply [`FailureArtifacts`] to the working directory after the raster
    /// chain was exhausted.
    async fn discard_failed_output(&self, working_dir: &Path) {
        match self.config.failure_artifacts {
            FailureArtifacts::Keep => {
                debug!("Keeping failed output in {}", working_dir.display());
            }
            FailureArtifacts::Remove => {
                if let Err(e) = clear_pngs(working_dir).await {
                    warn!("Could not clear {}: {}", working_dir.display(), e);
                }
                // only succeeds when nothing else lives there
                let _ = tokio::fs::remove_dir(working_dir).await;
            }
        }
    }
}

/// The office-produced PDF, deleted when the job ends however it ends.
#[derive(Default)]
struct IntermediatePdf(Option<PathBuf>);

impl IntermediatePdf {
    fn claim(&mut self, pdf_path: &Path, source: &Path) {
        if pdf_path != source {
            self.0 = Some(pdf_path.to_path_buf());
        }
    }

    async fn release(&mut self) {
        if let Some(path) = self.0.take() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Removed intermediate PDF {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove intermediate PDF {}: {}", path.display(), e),
            }
        }
    }
}

impl Drop for IntermediatePdf {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Could not remove intermediate PDF {}: {}", path.display(), e);
                }
            }
        }
    }
}

/// Convert a slide deck with a one-off [`SlideConverter`].
///
/// This is the primary entry point for the library.
///
/// # Example
/// ```rust,no_run
/// use deck2slides::{convert, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConversionConfig::builder().cloud_from_env().build()?;
/// let result = convert("/uploads/lecture.pptx", "65f0c2a9", &config).await?;
/// for slide in result.records() {
///     println!("{} {}", slide.slide_number, slide.image_path);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn convert(
    source: impl AsRef<Path>,
    presentation_id: &str,
    config: &ConversionConfig,
) -> Result<ConversionResult, ConversionError> {
    SlideConverter::new(config.clone())
        .convert(source, presentation_id)
        .await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    source: impl AsRef<Path>,
    presentation_id: &str,
    config: &ConversionConfig,
) -> Result<ConversionResult, ConversionError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConversionError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(source, presentation_id, config))
}

/// Convert an in-memory deck.
///
/// `file_name` supplies the extension used for format detection. The bytes
/// are written to a managed temp directory that is removed on return, along
/// with any intermediate PDF.
pub async fn convert_from_bytes(
    bytes: &[u8],
    file_name: &str,
    presentation_id: &str,
    config: &ConversionConfig,
) -> Result<ConversionResult, ConversionError> {
    let name = Path::new(file_name)
        .file_name()
        .ok_or_else(|| ConversionError::UnsupportedFormat {
            path: PathBuf::from(file_name),
            extension: String::new(),
        })?;
    let tmp = tempfile::TempDir::new().map_err(|e| ConversionError::Internal(format!("tempdir: {e}")))?;
    let path = tmp.path().join(name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| ConversionError::Internal(format!("tempfile write: {e}")))?;
    // `tmp` is dropped (and the directory deleted) when `convert` returns
    convert(&path, presentation_id, config).await
}

/// Whether one tool of the pipeline can run here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAvailability {
    pub stage: &'static str,
    pub name: String,
    pub available: bool,
}

/// Probe the office candidates and every raster strategy without converting.
pub async fn probe_tools(converter: &SlideConverter, runner: &dyn ProcessRunner, probe: StrategyProbe) -> Vec<ToolAvailability> {
    let timeout = Duration::from_secs(10);
    let mut tools = Vec::new();
    for candidate in probe.candidates(Capability::OfficeToPdf) {
        let available = probe.is_installed(runner, &candidate.program, timeout).await;
        tools.push(ToolAvailability {
            stage: "office",
            name: candidate.program,
            available,
        });
    }
    for (name, available) in converter.raster().available().await {
        tools.push(ToolAvailability {
            stage: "raster",
            name,
            available,
        });
    }
    tools
}
