//! The concrete raster strategies.
//!
//! Three are external tools described purely as data: a
//! [`Capability`] whose candidate invocations come from the
//! [`StrategyProbe`]. The fourth renders in-process with pdfium and is the
//! last resort, because it needs a `libpdfium` shared library at runtime.
//!
//! Every strategy writes its pages into the output directory under its own
//! naming scheme; the chain normalises names afterwards.

use crate::error::AttemptError;
use crate::pipeline::collect::{clear_pngs, slide_file_name};
use crate::pipeline::render::RasterStrategy;
use crate::probe::{Capability, CommandTemplate, StrategyProbe, TemplateVars};
use crate::process::{run_tool, ProcessRunner};
use async_trait::async_trait;
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Environment variable naming a `libpdfium` file or the directory holding it.
pub const ENV_PDFIUM_LIB_PATH: &str = "PDFIUM_LIB_PATH";

/// Upper bound for `which`/`--version` checks.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// A raster strategy backed by an external command.
///
/// Availability is resolved once and reused for every later job. A run
/// walks the candidates in order until one exits cleanly, so a broken
/// install on `PATH` does not hide a working one at a fixed location.
pub struct CommandStrategy {
    name: &'static str,
    capability: Capability,
    runner: Arc<dyn ProcessRunner>,
    probe: StrategyProbe,
    dpi: u32,
    timeout: Duration,
    resolved: OnceCell<Option<CommandTemplate>>,
}

impl CommandStrategy {
    fn new(
        name: &'static str,
        capability: Capability,
        runner: Arc<dyn ProcessRunner>,
        probe: StrategyProbe,
        dpi: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            name,
            capability,
            runner,
            probe,
            dpi,
            timeout,
            resolved: OnceCell::new(),
        }
    }

    /// Poppler's `pdftoppm`; fastest, and the most commonly installed.
    pub fn poppler(runner: Arc<dyn ProcessRunner>, probe: StrategyProbe, dpi: u32, timeout: Duration) -> Self {
        Self::new("poppler", Capability::Poppler, runner, probe, dpi, timeout)
    }

    /// Ghostscript's `png16m` device.
    pub fn ghostscript(runner: Arc<dyn ProcessRunner>, probe: StrategyProbe, dpi: u32, timeout: Duration) -> Self {
        Self::new("ghostscript", Capability::Ghostscript, runner, probe, dpi, timeout)
    }

    /// MuPDF's `mutool convert`.
    pub fn mupdf(runner: Arc<dyn ProcessRunner>, probe: StrategyProbe, dpi: u32, timeout: Duration) -> Self {
        Self::new("mupdf", Capability::MuPdf, runner, probe, dpi, timeout)
    }

    async fn resolve(&self) -> Option<CommandTemplate> {
        self.resolved
            .get_or_init(|| async {
                let candidates = self.probe.candidates(self.capability);
                if self.capability == Capability::Ghostscript {
                    let found = self
                        .probe
                        .discover_ghostscript(self.runner.as_ref(), PROBE_TIMEOUT)
                        .await?;
                    return candidates.into_iter().find(|c| c.program == found);
                }
                for candidate in candidates {
                    if self
                        .probe
                        .is_installed(self.runner.as_ref(), &candidate.program, PROBE_TIMEOUT)
                        .await
                    {
                        return Some(candidate);
                    }
                }
                None
            })
            .await
            .clone()
    }

    /// Invocations tried by `rasterize`, in order. Ghostscript runs only under
    /// its discovered name; the other tools walk every candidate.
    async fn invocations(&self) -> Vec<CommandTemplate> {
        if self.capability == Capability::Ghostscript {
            return self.resolve().await.into_iter().collect();
        }
        self.probe.candidates(self.capability)
    }

    fn vars(&self, pdf_path: &Path, out_dir: &Path) -> TemplateVars {
        TemplateVars::new()
            .path("input", pdf_path)
            .set("dpi", self.dpi.to_string())
            .path("output_prefix", &out_dir.join("slide"))
            .path("output_pattern", &out_dir.join("slide-%03d.png"))
    }
}

#[async_trait]
impl RasterStrategy for CommandStrategy {
    fn name(&self) -> &str {
        self.name
    }

    async fn probe(&self) -> bool {
        self.resolve().await.is_some()
    }

    async fn rasterize(&self, pdf_path: &Path, out_dir: &Path) -> Result<(), AttemptError> {
        let candidates = self.invocations().await;
        let vars = self.vars(pdf_path, out_dir);
        let mut missing: Option<AttemptError> = None;
        let mut failure: Option<AttemptError> = None;

        for template in candidates {
            let spec = template.render(&vars);
            match run_tool(self.runner.as_ref(), &spec, self.timeout).await {
                Ok(output) => {
                    debug!("{} finished in {} ms", template.program, output.duration_ms);
                    return Ok(());
                }
                Err(e) if e.is_not_found() => {
                    debug!("{}: '{}' not found", self.name, template.program);
                    missing = Some(e);
                }
                Err(e) => {
                    warn!("{}: '{}' failed: {}", self.name, template.program, e);
                    clear_pngs(out_dir).await?;
                    failure = Some(e);
                }
            }
        }

        Err(failure.or(missing).unwrap_or_else(|| AttemptError::ToolNotFound {
            program: self.name.to_string(),
        }))
    }
}

/// In-process rendering with pdfium.
///
/// The library is bound at call time from [`ENV_PDFIUM_LIB_PATH`] (a file or
/// a directory) or else from the system library search path. pdfium is
/// blocking and CPU-bound, so all work runs under `spawn_blocking`.
pub struct PdfiumStrategy {
    dpi: u32,
    max_rendered_pixels: u32,
    library_path: Option<PathBuf>,
}

impl PdfiumStrategy {
    pub fn new(dpi: u32, max_rendered_pixels: u32) -> Self {
        Self {
            dpi,
            max_rendered_pixels,
            library_path: std::env::var_os(ENV_PDFIUM_LIB_PATH).map(PathBuf::from),
        }
    }

    /// Bind a specific `libpdfium` file or directory instead of the environment's.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }
}

fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, AttemptError> {
    let bindings = match library_path {
        Some(p) if p.is_dir() => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(p)),
        Some(p) => Pdfium::bind_to_library(p),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| AttemptError::Library {
        detail: format!("pdfium library unavailable: {:?}", e),
    })?;
    Ok(Pdfium::new(bindings))
}

fn render_blocking(
    pdf_path: &Path,
    out_dir: &Path,
    dpi: u32,
    max_pixels: u32,
    library_path: Option<&Path>,
) -> Result<usize, AttemptError> {
    let pdfium = bind_pdfium(library_path)?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| AttemptError::Library {
            detail: format!("pdfium could not open '{}': {:?}", pdf_path.display(), e),
        })?;

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut written = 0;
    for (index, page) in document.pages().iter().enumerate() {
        let image = page
            .render_with_config(&render_config)
            .map_err(|e| AttemptError::Library {
                detail: format!("pdfium failed on page {}: {:?}", index + 1, e),
            })?
            .as_image();
        let target = out_dir.join(slide_file_name(index + 1));
        image
            .save_with_format(&target, ImageFormat::Png)
            .map_err(|e| AttemptError::Library {
                detail: format!("cannot write '{}': {}", target.display(), e),
            })?;
        written += 1;
    }
    Ok(written)
}

#[async_trait]
impl RasterStrategy for PdfiumStrategy {
    fn name(&self) -> &str {
        "pdfium"
    }

    async fn probe(&self) -> bool {
        let path = self.library_path.clone();
        tokio::task::spawn_blocking(move || bind_pdfium(path.as_deref()).is_ok())
            .await
            .unwrap_or(false)
    }

    async fn rasterize(&self, pdf_path: &Path, out_dir: &Path) -> Result<(), AttemptError> {
        let pdf = pdf_path.to_path_buf();
        let out = out_dir.to_path_buf();
        let (dpi, max_pixels) = (self.dpi, self.max_rendered_pixels);
        let library = self.library_path.clone();

        let pages = tokio::task::spawn_blocking(move || {
            render_blocking(&pdf, &out, dpi, max_pixels, library.as_deref())
        })
        .await
        .map_err(|e| AttemptError::Library {
            detail: format!("pdfium render task panicked: {}", e),
        })??;

        info!("pdfium rendered {} page(s)", pages);
        Ok(())
    }
}
