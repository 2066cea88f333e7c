//! Office deck → PDF conversion.
//!
//! The PDF is written next to the source as `{stem}.pdf`. Candidates are
//! tried in order; after each one the expected file is checked, because a
//! headless office suite can exit 0 without writing anything (most often when
//! another instance holds the shared user profile). File existence, not the
//! exit status, decides success.
//!
//! When every candidate fails, an [`OfficeFallback`] gets a last try. The
//! default, [`BufferedOfficeFallback`], works on a private copy of the deck
//! with a throw-away user profile and copies the resulting bytes back.

use crate::error::{AttemptError, AttemptSummary, ConversionError};
use crate::probe::{Capability, CommandTemplate, StrategyProbe, TemplateVars};
use crate::process::{run_tool, ProcessRunner};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// A PDF produced by the office stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficeConversion {
    pub pdf_path: PathBuf,
    /// Program or fallback name that produced it.
    pub via: String,
}

/// Last-resort converter used after every command candidate failed.
#[async_trait]
pub trait OfficeFallback: Send + Sync {
    fn name(&self) -> &str;

    /// Convert `source` and write the PDF to `pdf_path`.
    async fn convert(&self, source: &Path, pdf_path: &Path) -> Result<(), AttemptError>;
}

/// Converts office decks to PDF using the first candidate that works.
pub struct OfficeToPdfConverter {
    runner: Arc<dyn ProcessRunner>,
    candidates: Vec<CommandTemplate>,
    fallback: Option<Arc<dyn OfficeFallback>>,
    timeout: Duration,
}

impl OfficeToPdfConverter {
    /// Candidates for the given platform plus the buffered fallback.
    pub fn new(runner: Arc<dyn ProcessRunner>, probe: &StrategyProbe, timeout: Duration) -> Self {
        let candidates = probe.candidates(Capability::OfficeToPdf);
        let fallback: Arc<dyn OfficeFallback> = Arc::new(BufferedOfficeFallback::new(
            Arc::clone(&runner),
            candidates.clone(),
            timeout,
        ));
        Self {
            runner,
            candidates,
            fallback: Some(fallback),
            timeout,
        }
    }

    /// Replace the candidate list.
    pub fn with_candidates(mut self, candidates: Vec<CommandTemplate>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Replace (or remove) the last-resort fallback.
    pub fn with_fallback(mut self, fallback: Option<Arc<dyn OfficeFallback>>) -> Self {
        self.fallback = fallback;
        self
    }

    /// `{dir}/{stem}.pdf` beside the source.
    pub fn expected_pdf_path(source: &Path) -> PathBuf {
        source.with_extension("pdf")
    }

    /// Convert `source` to PDF.
    ///
    /// # Errors
    /// [`ConversionError::OfficeConversionUnavailable`] when neither a
    /// candidate nor the fallback produced a PDF.
    pub async fn convert(&self, source: &Path) -> Result<OfficeConversion, ConversionError> {
        info!("Converting {} to PDF", source.display());
        let pdf_path = Self::expected_pdf_path(source);
        let outdir = source.parent().unwrap_or_else(|| Path::new("."));
        let baseline = modified_at(&pdf_path).await;
        if baseline.is_some() {
            warn!(
                "{} already exists and will be replaced by the converted deck",
                pdf_path.display()
            );
        }
        let vars = TemplateVars::new().path("input", source).path("outdir", outdir);

        let mut attempts = Vec::new();

        for candidate in &self.candidates {
            let spec = candidate.render(&vars);
            debug!("Trying office converter: {}", spec.display());

            let outcome = run_tool(self.runner.as_ref(), &spec, self.timeout).await;
            let ran = match &outcome {
                Ok(_) => true,
                Err(AttemptError::ToolFailed { .. }) => true,
                Err(_) => false,
            };

            if ran && produced(&pdf_path, baseline).await {
                if let Err(e) = &outcome {
                    debug!("{} reported failure but wrote the PDF: {}", candidate.program, e);
                }
                info!("PDF created via {}", candidate.program);
                return Ok(OfficeConversion {
                    pdf_path,
                    via: candidate.program.clone(),
                });
            }

            let err = match outcome {
                Ok(_) => AttemptError::MissingOutput {
                    path: pdf_path.clone(),
                },
                Err(e) => e,
            };
            if err.is_not_found() {
                debug!("Office converter {} not installed", candidate.program);
            } else {
                warn!("Office converter {} failed: {}", candidate.program, err);
            }
            attempts.push(AttemptSummary::new(&candidate.program, &err));
        }

        if let Some(fallback) = &self.fallback {
            debug!("Trying office fallback: {}", fallback.name());
            match fallback.convert(source, &pdf_path).await {
                Ok(()) if produced(&pdf_path, baseline).await => {
                    info!("PDF created via {}", fallback.name());
                    return Ok(OfficeConversion {
                        pdf_path,
                        via: fallback.name().to_string(),
                    });
                }
                Ok(()) => {
                    let err = AttemptError::MissingOutput {
                        path: pdf_path.clone(),
                    };
                    warn!("Office fallback {} failed: {}", fallback.name(), err);
                    attempts.push(AttemptSummary::new(fallback.name(), &err));
                }
                Err(err) => {
                    warn!("Office fallback {} failed: {}", fallback.name(), err);
                    attempts.push(AttemptSummary::new(fallback.name(), &err));
                }
            }
        }

        Err(ConversionError::OfficeConversionUnavailable {
            source_path: source.to_path_buf(),
            attempts,
        })
    }
}

/// Buffer-in, buffer-out conversion with an isolated user profile.
///
/// The deck is copied into a private temp directory, converted there with
/// `-env:UserInstallation` pointing at a fresh profile, and the PDF bytes are
/// written to the destination. Only a non-empty result counts. The temp
/// directory is removed when the call returns.
pub struct BufferedOfficeFallback {
    runner: Arc<dyn ProcessRunner>,
    candidates: Vec<CommandTemplate>,
    timeout: Duration,
}

impl BufferedOfficeFallback {
    pub fn new(runner: Arc<dyn ProcessRunner>, candidates: Vec<CommandTemplate>, timeout: Duration) -> Self {
        Self {
            runner,
            candidates,
            timeout,
        }
    }
}

#[async_trait]
impl OfficeFallback for BufferedOfficeFallback {
    fn name(&self) -> &str {
        "buffered-isolated-profile"
    }

    async fn convert(&self, source: &Path, pdf_path: &Path) -> Result<(), AttemptError> {
        let file_name = source.file_name().ok_or_else(|| AttemptError::Library {
            detail: format!("source '{}' has no file name", source.display()),
        })?;

        let scratch = TempDir::new()?;
        let input_dir = scratch.path().join("input");
        let out_dir = scratch.path().join("out");
        let profile_dir = scratch.path().join("profile");
        for dir in [&input_dir, &out_dir, &profile_dir] {
            tokio::fs::create_dir_all(dir).await?;
        }

        let staged = input_dir.join(file_name);
        let bytes = tokio::fs::read(source).await?;
        tokio::fs::write(&staged, &bytes).await?;

        let vars = TemplateVars::new().path("input", &staged).path("outdir", &out_dir);
        let produced_pdf = out_dir.join(Path::new(file_name).with_extension("pdf"));
        let profile_arg = format!("-env:UserInstallation={}", file_url(&profile_dir));

        let mut last_err = AttemptError::ToolNotFound {
            program: "soffice".to_string(),
        };
        for candidate in &self.candidates {
            let mut spec = candidate.render(&vars);
            spec.args.insert(0, profile_arg.clone());

            if let Err(e) = run_tool(self.runner.as_ref(), &spec, self.timeout).await {
                if !e.is_not_found() {
                    debug!("Buffered conversion with {} failed: {}", candidate.program, e);
                }
                last_err = e;
                continue;
            }

            let pdf = match tokio::fs::read(&produced_pdf).await {
                Ok(pdf) if !pdf.is_empty() => pdf,
                _ => {
                    last_err = AttemptError::MissingOutput {
                        path: produced_pdf.clone(),
                    };
                    continue;
                }
            };
            tokio::fs::write(pdf_path, &pdf).await?;
            debug!("Buffered conversion wrote {} bytes", pdf.len());
            return Ok(());
        }

        Err(last_err)
    }
}

/// `file://` URL for a local directory, forward slashes on every platform.
fn file_url(path: &Path) -> String {
    let mut p = path.to_string_lossy().replace('\\', "/");
    if !p.starts_with('/') {
        p.insert(0, '/');
    }
    format!("file://{p}")
}

async fn modified_at(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok().and_then(|m| m.modified().ok())
}

/// The PDF exists, is non-empty and was written after `baseline`.
async fn produced(path: &Path, baseline: Option<SystemTime>) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => match baseline {
            None => true,
            Some(before) => meta.modified().map(|m| m != before).unwrap_or(true),
        },
        _ => false,
    }
}
