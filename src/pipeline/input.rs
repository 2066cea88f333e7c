//! Input validation: turn a caller-supplied path and presentation id into a
//! [`ConversionJob`].
//!
//! Everything here runs before any external tool is invoked, so an
//! unsupported upload (a `.txt`, a mislabelled PDF, a presentation id that
//! would escape the slides root) is rejected deterministically and cheaply.

use crate::config::ConversionConfig;
use crate::error::ConversionError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Office extensions handed to the office-to-PDF stage.
pub const OFFICE_EXTENSIONS: &[&str] = &["ppt", "pptx", "pps", "ppsx", "odp"];

/// Format of the uploaded deck, detected from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Already a PDF: the office stage is skipped.
    Pdf,
    /// Legacy binary or XML office deck.
    Office,
}

impl SourceFormat {
    /// Detect the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, ConversionError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if ext == "pdf" {
            Ok(SourceFormat::Pdf)
        } else if OFFICE_EXTENSIONS.contains(&ext.as_str()) {
            Ok(SourceFormat::Office)
        } else {
            Err(ConversionError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: ext,
            })
        }
    }
}

/// One conversion, from submission to returned slide list.
///
/// The job exclusively owns `working_dir` (`{root}/{presentation_id}`) for
/// its lifetime; the directory is reused, not recreated, across retries of
/// the same presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub source_path: PathBuf,
    pub presentation_id: String,
    pub working_dir: PathBuf,
    pub format: SourceFormat,
}

impl ConversionJob {
    /// Validate the inputs and build the job.
    ///
    /// Order matters: the presentation id and the extension are checked
    /// before the filesystem is touched.
    pub fn new(
        source_path: impl AsRef<Path>,
        presentation_id: &str,
        config: &ConversionConfig,
    ) -> Result<Self, ConversionError> {
        let source_path = source_path.as_ref().to_path_buf();
        validate_presentation_id(presentation_id)?;
        let format = SourceFormat::from_path(&source_path)?;
        check_readable(&source_path, format)?;

        let job = Self {
            working_dir: config.presentation_dir(presentation_id),
            presentation_id: presentation_id.to_string(),
            source_path,
            format,
        };
        debug!(
            "Job '{}': {:?} source {}",
            job.presentation_id,
            job.format,
            job.source_path.display()
        );
        Ok(job)
    }

    /// Create the working directory if needed.
    pub async fn prepare_working_dir(&self) -> Result<(), ConversionError> {
        tokio::fs::create_dir_all(&self.working_dir)
            .await
            .map_err(|e| ConversionError::WorkingDir {
                path: self.working_dir.clone(),
                source: e,
            })
    }
}

/// A presentation id is used as a single directory name under the slides
/// root, so it must be one plain path segment.
pub fn validate_presentation_id(id: &str) -> Result<(), ConversionError> {
    let reject = |reason: &str| {
        Err(ConversionError::InvalidPresentationId {
            id: id.to_string(),
            reason: reason.to_string(),
        })
    };

    if id.is_empty() {
        return reject("must not be empty");
    }
    if id.len() > 128 {
        return reject("must be at most 128 characters");
    }
    if id == "." || id == ".." {
        return reject("must not be a relative directory reference");
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return reject("only ASCII letters, digits, '-', '_' and '.' are allowed");
    }
    Ok(())
}

/// Check the source exists and is readable; PDFs must start with `%PDF`.
fn check_readable(path: &Path, format: SourceFormat) -> Result<(), ConversionError> {
    if !path.is_file() {
        return Err(ConversionError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            if format == SourceFormat::Pdf {
                let mut magic = [0u8; 4];
                if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                    return Err(ConversionError::NotAPdf {
                        path: path.to_path_buf(),
                        magic,
                    });
                }
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ConversionError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(ConversionError::SourceNotFound {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn detects_formats_case_insensitively() {
        assert_eq!(
            SourceFormat::from_path(Path::new("/u/Deck.PDF")).unwrap(),
            SourceFormat::Pdf
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("/u/lecture.pptx")).unwrap(),
            SourceFormat::Office
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("/u/old.PPT")).unwrap(),
            SourceFormat::Office
        );
    }

    #[test]
    fn rejects_unsupported_extensions() {
        for name in ["notes.txt", "image.png", "no_extension"] {
            let err = SourceFormat::from_path(Path::new(name)).unwrap_err();
            assert!(
                matches!(err, ConversionError::UnsupportedFormat { .. }),
                "{name}: {err:?}"
            );
        }
    }

    #[test]
    fn presentation_id_must_be_one_segment() {
        assert!(validate_presentation_id("65f0c2a9e4b0a1b2c3d4e5f6").is_ok());
        assert!(validate_presentation_id("deck_2024-03.v2").is_ok());
        for bad in ["", ".", "..", "a/b", r"a\b", "../etc", "sp ace"] {
            assert!(
                matches!(
                    validate_presentation_id(bad),
                    Err(ConversionError::InvalidPresentationId { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn job_rejects_missing_source() {
        let config = ConversionConfig::default();
        let err = ConversionJob::new("/definitely/not/here.pdf", "p1", &config).unwrap_err();
        assert!(matches!(err, ConversionError::SourceNotFound { .. }));
    }

    #[test]
    fn job_rejects_mislabelled_pdf() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"PK\x03\x04 not a pdf").unwrap();
        let err = ConversionJob::new(&path, "p1", &ConversionConfig::default()).unwrap_err();
        assert!(matches!(err, ConversionError::NotAPdf { magic, .. } if &magic == b"PK\x03\x04"));
    }

    #[test]
    fn job_namespaces_working_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deck.pdf");
        std::fs::write(&path, b"%PDF-1.7\n").unwrap();
        let config = ConversionConfig::builder()
            .converted_slides_root(dir.path().join("converted-slides"))
            .build()
            .unwrap();

        let job = ConversionJob::new(&path, "abc", &config).unwrap();
        assert_eq!(job.format, SourceFormat::Pdf);
        assert_eq!(job.working_dir, dir.path().join("converted-slides").join("abc"));
    }

    #[test]
    fn unsupported_extension_checked_before_existence() {
        let err = ConversionJob::new("/nowhere/notes.txt", "p1", &ConversionConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedFormat { .. }));
    }
}
