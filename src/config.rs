//! Configuration types for slide-deck conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The only externally visible switch of
//! the core pipeline is whether [`CloudCredentials`] are present: with them,
//! slides are promoted to durable storage; without them, every slide keeps its
//! local static-serving path.

use crate::error::ConversionError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable holding the cloud name of the slide store.
pub const ENV_CLOUD_NAME: &str = "CLOUDINARY_CLOUD_NAME";
/// Environment variable holding the API key of the slide store.
pub const ENV_API_KEY: &str = "CLOUDINARY_API_KEY";
/// Environment variable holding the API secret of the slide store.
pub const ENV_API_SECRET: &str = "CLOUDINARY_API_SECRET";

/// Configuration for one or more slide-deck conversions.
///
/// # Example
/// ```rust
/// use deck2slides::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .converted_slides_root("/srv/app/converted-slides")
///     .dpi(150)
///     .process_timeout_secs(120)
///     .build()
///     .unwrap();
/// assert!(config.cloud.is_none());
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Root under which each presentation gets its own `{presentationId}/`
    /// directory. Default: `./converted-slides`.
    pub converted_slides_root: PathBuf,

    /// URL prefix used for slides served by the static file layer.
    /// Default: `/converted-slides`.
    pub public_path_prefix: String,

    /// Rasterisation resolution. Range: 72–600. Default: 150.
    pub dpi: u32,

    /// Longest edge, in pixels, for the in-process renderer. Default: 4000.
    ///
    /// External tools honour `dpi` only; pdfium additionally caps the bitmap
    /// so an A0 poster page cannot exhaust memory.
    pub max_rendered_pixels: u32,

    /// Hard time budget for every external process call. Default: 120.
    pub process_timeout_secs: u64,

    /// Number of slide uploads in flight at once. Default: 1 (sequential).
    ///
    /// Output order is always the slide order regardless of this value.
    pub upload_concurrency: usize,

    /// Per-upload HTTP timeout. Default: 60.
    pub upload_timeout_secs: u64,

    /// What to do with generated PNGs when the job fails fatally.
    pub failure_artifacts: FailureArtifacts,

    /// Remote storage credentials. `None` means local/dev mode.
    pub cloud: Option<CloudCredentials>,

    /// Remote folder prefix; the folder is `{prefix}/{presentationId}`.
    /// Default: `slides`.
    pub cloud_folder_prefix: String,

    /// Optional per-stage progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            converted_slides_root: PathBuf::from("converted-slides"),
            public_path_prefix: "/converted-slides".to_string(),
            dpi: 150,
            max_rendered_pixels: 4000,
            process_timeout_secs: 120,
            upload_concurrency: 1,
            upload_timeout_secs: 60,
            failure_artifacts: FailureArtifacts::default(),
            cloud: None,
            cloud_folder_prefix: "slides".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("converted_slides_root", &self.converted_slides_root)
            .field("public_path_prefix", &self.public_path_prefix)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("process_timeout_secs", &self.process_timeout_secs)
            .field("upload_concurrency", &self.upload_concurrency)
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .field("failure_artifacts", &self.failure_artifacts)
            .field("cloud", &self.cloud)
            .field("cloud_folder_prefix", &self.cloud_folder_prefix)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Directory owned by the job for `presentation_id`.
    pub fn presentation_dir(&self, presentation_id: &str) -> PathBuf {
        self.converted_slides_root.join(presentation_id)
    }

    /// Local static-serving path for a slide file.
    pub fn local_image_path(&self, presentation_id: &str, file_name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_path_prefix.trim_end_matches('/'),
            presentation_id,
            file_name
        )
    }

    /// Remote folder for a presentation's slides.
    pub fn cloud_folder(&self, presentation_id: &str) -> String {
        format!(
            "{}/{}",
            self.cloud_folder_prefix.trim_end_matches('/'),
            presentation_id
        )
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn converted_slides_root(mut self, root: impl AsRef<Path>) -> Self {
        self.config.converted_slides_root = root.as_ref().to_path_buf();
        self
    }

    pub fn public_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.public_path_prefix = prefix.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn process_timeout_secs(mut self, secs: u64) -> Self {
        self.config.process_timeout_secs = secs;
        self
    }

    pub fn upload_concurrency(mut self, n: usize) -> Self {
        self.config.upload_concurrency = n.max(1);
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs;
        self
    }

    pub fn failure_artifacts(mut self, policy: FailureArtifacts) -> Self {
        self.config.failure_artifacts = policy;
        self
    }

    pub fn cloud(mut self, credentials: Option<CloudCredentials>) -> Self {
        self.config.cloud = credentials;
        self
    }

    /// Read cloud credentials from the environment (see [`CloudCredentials::from_env`]).
    pub fn cloud_from_env(mut self) -> Self {
        self.config.cloud = CloudCredentials::from_env();
        self
    }

    pub fn cloud_folder_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.cloud_folder_prefix = prefix.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConversionError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(ConversionError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.process_timeout_secs == 0 {
            return Err(ConversionError::InvalidConfig(
                "Process timeout must be ≥ 1 second".into(),
            ));
        }
        if c.upload_timeout_secs == 0 {
            return Err(ConversionError::InvalidConfig(
                "Upload timeout must be ≥ 1 second".into(),
            ));
        }
        if c.converted_slides_root.as_os_str().is_empty() {
            return Err(ConversionError::InvalidConfig(
                "converted_slides_root must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Supporting types ─────────────────────────────────────────────────────

/// Policy for slide images left behind by a job that failed fatally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailureArtifacts {
    /// Delete every generated PNG and remove the directory if it is empty. (default)
    #[default]
    Remove,
    /// Leave whatever the last strategy produced for inspection.
    Keep,
}

/// Credentials for the remote slide store.
///
/// All three values must be present; a partial set counts as "not
/// configured" and the pipeline runs in local mode.
#[derive(Clone, PartialEq, Eq)]
pub struct CloudCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl CloudCredentials {
    /// Build credentials if every value is non-empty.
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Option<Self> {
        let creds = Self {
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        };
        let complete = [&creds.cloud_name, &creds.api_key, &creds.api_secret]
            .iter()
            .all(|v| !v.trim().is_empty());
        complete.then_some(creds)
    }

    /// Read [`ENV_CLOUD_NAME`], [`ENV_API_KEY`] and [`ENV_API_SECRET`].
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        Self::new(
            lookup(ENV_CLOUD_NAME)?,
            lookup(ENV_API_KEY)?,
            lookup(ENV_API_SECRET)?,
        )
    }
}

impl fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudCredentials")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}
