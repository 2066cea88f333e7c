//! Slide collection: turn a directory of rendered pages into an ordered list.
//!
//! Each raster tool names its pages differently (`slide-1.png`,
//! `slide-01.png`, `slide-001.png`, ...). Files are ordered by the first run
//! of digits in the name, compared as numbers, so `slide-2` precedes
//! `slide-10`. A name without digits sorts as page 0.
//!
//! Accepted output is then renamed to `slide-NNN.png` so the on-disk layout
//! is the same whichever tool produced it.

use crate::config::ConversionConfig;
use crate::error::AttemptError;
use crate::output::SlideImage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

static RE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// Numeric sort key of a slide file name: its first run of digits, or 0.
pub fn slide_number_hint(file_name: &str) -> u64 {
    RE_DIGITS
        .find(file_name)
        .map(|m| m.as_str().parse::<u64>().unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Sort file names by [`slide_number_hint`], then by name for ties.
pub fn sort_slide_files(names: &mut [String]) {
    names.sort_by(|a, b| {
        slide_number_hint(a)
            .cmp(&slide_number_hint(b))
            .then_with(|| a.cmp(b))
    });
}

/// Canonical file name for a 1-indexed slide.
pub fn slide_file_name(slide_number: usize) -> String {
    format!("slide-{slide_number:03}.png")
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("png"))
        .unwrap_or(false)
}

/// Names of the PNG files directly inside `dir`. A missing directory has none.
pub async fn list_pngs(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_png(&path) && entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

/// Delete every PNG directly inside `dir`. Returns how many were removed.
pub async fn clear_pngs(dir: &Path) -> std::io::Result<usize> {
    let names = list_pngs(dir).await?;
    for name in &names {
        tokio::fs::remove_file(dir.join(name)).await?;
    }
    if !names.is_empty() {
        debug!("Cleared {} stale PNG(s) from {}", names.len(), dir.display());
    }
    Ok(names.len())
}

/// Scans a working directory and normalises its PNGs into slide order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlideCollector;

impl SlideCollector {
    /// Order the PNGs in `dir` and rename them to `slide-001.png`...
    ///
    /// # Errors
    /// [`AttemptError::NoSlidesGenerated`] when the directory holds no PNG.
    pub async fn collect(&self, dir: &Path) -> Result<Vec<PathBuf>, AttemptError> {
        let mut names = list_pngs(dir).await?;
        if names.is_empty() {
            return Err(AttemptError::NoSlidesGenerated {
                dir: dir.to_path_buf(),
            });
        }
        sort_slide_files(&mut names);

        // Two passes: a direct rename could overwrite a file whose turn
        // has not come yet (e.g. slide-2.png → slide-002.png when slide-002
        // already exists from a zero-padding tool).
        let mut staged = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let tmp = dir.join(format!(".renumber-{}.tmp", i + 1));
            tokio::fs::rename(dir.join(name), &tmp).await?;
            staged.push(tmp);
        }

        let mut files = Vec::with_capacity(staged.len());
        for (i, tmp) in staged.into_iter().enumerate() {
            let target = dir.join(slide_file_name(i + 1));
            tokio::fs::rename(&tmp, &target).await?;
            files.push(target);
        }

        debug!("Collected {} slide(s) in {}", files.len(), dir.display());
        Ok(files)
    }

    /// Build the slide list for collected files, in the order given.
    pub fn slide_images(
        &self,
        files: &[PathBuf],
        presentation_id: &str,
        config: &ConversionConfig,
    ) -> Vec<SlideImage> {
        files
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| slide_file_name(i + 1));
                SlideImage {
                    slide_number: i + 1,
                    local_url: config.local_image_path(presentation_id, &file_name),
                    file_name,
                    local_path: path.clone(),
                    remote_url: None,
                }
            })
            .collect()
    }
}
