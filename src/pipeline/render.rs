//! PDF rasterisation through an ordered chain of [`RasterStrategy`]s.
//!
//! Deployments differ in what is installed, so no single tool is mandatory.
//! Strategies are tried in declared priority order and the first one that
//! leaves at least one PNG behind wins; later strategies are never invoked.
//!
//! Before every attempt the output directory is cleared of PNGs. The
//! directory is shared by retries of the same presentation, and a failed
//! strategy may leave a partial page set that must not leak into the next.

use crate::config::ConversionConfig;
use crate::error::{AttemptError, AttemptSummary, ConversionError};
use crate::pipeline::collect::{clear_pngs, SlideCollector};
use crate::pipeline::strategies::{CommandStrategy, PdfiumStrategy};
use crate::probe::StrategyProbe;
use crate::process::ProcessRunner;
use crate::progress::ProgressCallback;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// One independently selectable way of rendering a PDF to PNG pages.
#[async_trait]
pub trait RasterStrategy: Send + Sync {
    /// Short stable name used in logs, stats and error reports.
    fn name(&self) -> &str;

    /// Whether the strategy can run in this environment at all.
    async fn probe(&self) -> bool;

    /// Render every page of `pdf_path` as PNG files inside `out_dir`.
    async fn rasterize(&self, pdf_path: &Path, out_dir: &Path) -> Result<(), AttemptError>;
}

/// Output accepted from the winning strategy.
#[derive(Debug, Clone)]
pub struct RasterOutcome {
    pub strategy: String,
    /// `slide-001.png`... in page order.
    pub files: Vec<PathBuf>,
    /// Number of strategies looked at, including the winner.
    pub strategies_tried: usize,
    /// Failures of the strategies before the winner.
    pub attempts: Vec<AttemptSummary>,
}

/// Runs the strategy chain.
pub struct PdfToImageConverter {
    strategies: Vec<Arc<dyn RasterStrategy>>,
    collector: SlideCollector,
}

impl PdfToImageConverter {
    pub fn new(strategies: Vec<Arc<dyn RasterStrategy>>) -> Self {
        Self {
            strategies,
            collector: SlideCollector,
        }
    }

    /// Poppler, Ghostscript, MuPDF, then in-process pdfium.
    pub fn standard(runner: Arc<dyn ProcessRunner>, probe: StrategyProbe, config: &ConversionConfig) -> Self {
        let timeout = Duration::from_secs(config.process_timeout_secs);
        Self::new(vec![
            Arc::new(CommandStrategy::poppler(Arc::clone(&runner), probe, config.dpi, timeout)),
            Arc::new(CommandStrategy::ghostscript(Arc::clone(&runner), probe, config.dpi, timeout)),
            Arc::new(CommandStrategy::mupdf(runner, probe, config.dpi, timeout)),
            Arc::new(PdfiumStrategy::new(config.dpi, config.max_rendered_pixels)),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Probe every strategy without running any.
    pub async fn available(&self) -> Vec<(String, bool)> {
        let mut out = Vec::with_capacity(self.strategies.len());
        for s in &self.strategies {
            out.push((s.name().to_string(), s.probe().await));
        }
        out
    }

    /// Rasterise `pdf_path` into `out_dir` with the first strategy that works.
    ///
    /// # Errors
    /// * [`ConversionError::NoRasterToolAvailable`] when every strategy was
    ///   absent, failed, or produced no PNG.
    /// * [`ConversionError::WorkingDir`] when stale output cannot be cleared.
    pub async fn rasterize(
        &self,
        pdf_path: &Path,
        out_dir: &Path,
        progress: Option<&ProgressCallback>,
    ) -> Result<RasterOutcome, ConversionError> {
        let mut attempts = Vec::new();

        for (i, strategy) in self.strategies.iter().enumerate() {
            let name = strategy.name();

            clear_pngs(out_dir)
                .await
                .map_err(|e| ConversionError::WorkingDir {
                    path: out_dir.to_path_buf(),
                    source: e,
                })?;

            if let Some(cb) = progress {
                cb.on_strategy_start(name);
            }

            let result = if strategy.probe().await {
                debug!("Rasterising with {}", name);
                match strategy.rasterize(pdf_path, out_dir).await {
                    Ok(()) => self.collector.collect(out_dir).await,
                    Err(e) => Err(e),
                }
            } else {
                Err(AttemptError::ToolNotFound {
                    program: name.to_string(),
                })
            };

            match result {
                Ok(files) => {
                    info!("{} produced {} slide(s)", name, files.len());
                    if let Some(cb) = progress {
                        cb.on_strategy_succeeded(name, files.len());
                    }
                    return Ok(RasterOutcome {
                        strategy: name.to_string(),
                        files,
                        strategies_tried: i + 1,
                        attempts,
                    });
                }
                Err(e) => {
                    if e.is_not_found() {
                        debug!("Raster strategy {} unavailable", name);
                    } else {
                        warn!("Raster strategy {} failed: {}", name, e);
                    }
                    if let Some(cb) = progress {
                        cb.on_strategy_failed(name, &e.to_string());
                    }
                    attempts.push(AttemptSummary::new(name, &e));
                }
            }
        }

        error!(
            "No raster strategy produced output for {} ({} tried)",
            pdf_path.display(),
            attempts.len()
        );
        Err(ConversionError::NoRasterToolAvailable { attempts })
    }
}
