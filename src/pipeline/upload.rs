//! Slide promotion to durable remote storage.
//!
//! Every slide is uploaded on its own. A failed upload is logged and that one
//! slide keeps its local static path; the job never fails because of it.
//! Without credentials nothing is uploaded and every slide stays local.
//!
//! Uploads may run concurrently; the returned list is always re-sorted by
//! `slide_number`.

use crate::config::{CloudCredentials, ConversionConfig};
use crate::error::UploadError;
use crate::output::SlideImage;
use crate::progress::ProgressCallback;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::stream::{self, StreamExt};
use sha1::{Digest, Sha1};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A remote store for slide images.
#[async_trait]
pub trait SlideStore: Send + Sync {
    fn name(&self) -> &str;

    /// Upload the image at `local_path` into `folder`; returns its durable URL.
    async fn upload(&self, local_path: &Path, folder: &str) -> Result<String, UploadError>;
}

/// Cloudinary signed upload API.
pub struct CloudinaryStore {
    client: reqwest::Client,
    credentials: CloudCredentials,
    upload_url: String,
}

impl CloudinaryStore {
    pub fn new(credentials: CloudCredentials, timeout: Duration) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let upload_url = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            credentials.cloud_name
        );
        Ok(Self {
            client,
            credentials,
            upload_url,
        })
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    /// SHA-1 request signature: the signed parameters sorted by name, joined
    /// as `k=v&k=v`, with the API secret appended.
    pub fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let joined = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{:x}", Sha1::digest(format!("{joined}{api_secret}").as_bytes()))
    }
}

#[async_trait]
impl SlideStore for CloudinaryStore {
    fn name(&self) -> &str {
        "cloudinary"
    }

    async fn upload(&self, local_path: &Path, folder: &str) -> Result<String, UploadError> {
        let bytes = tokio::fs::read(local_path).await?;
        let file = format!("data:image/png;base64,{}", STANDARD.encode(&bytes));
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = Self::sign(
            &[("folder", folder), ("timestamp", timestamp.as_str())],
            &self.credentials.api_secret,
        );

        let form = [
            ("file", file.as_str()),
            ("api_key", self.credentials.api_key.as_str()),
            ("timestamp", timestamp.as_str()),
            ("folder", folder),
            ("signature", signature.as_str()),
        ];
        let response = self.client.post(&self.upload_url).form(&form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }

        let json: serde_json::Value = response.json().await?;
        json.get("secure_url")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or(UploadError::MalformedResponse {
                field: "secure_url",
            })
    }
}

/// Promotes slides to a [`SlideStore`], isolating failures per slide.
pub struct CloudUploader {
    store: Option<Arc<dyn SlideStore>>,
    concurrency: usize,
}

impl CloudUploader {
    pub fn new(store: Option<Arc<dyn SlideStore>>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Cloudinary when credentials are configured, local mode otherwise.
    pub fn from_config(config: &ConversionConfig) -> Self {
        let store: Option<Arc<dyn SlideStore>> = match &config.cloud {
            Some(creds) => {
                match CloudinaryStore::new(creds.clone(), Duration::from_secs(config.upload_timeout_secs)) {
                    Ok(store) => Some(Arc::new(store)),
                    Err(e) => {
                        warn!("Slide store unavailable, keeping slides local: {}", e);
                        None
                    }
                }
            }
            None => None,
        };
        Self::new(store, config.upload_concurrency)
    }

    /// `true` when a store is configured.
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Set `remote_url` on every slide whose upload succeeds.
    pub async fn promote(
        &self,
        slides: Vec<SlideImage>,
        folder: &str,
        progress: Option<&ProgressCallback>,
    ) -> Vec<SlideImage> {
        let total = slides.len();
        let store = match &self.store {
            Some(store) => store,
            None => {
                debug!("No slide store configured; {} slide(s) stay local", total);
                if let Some(cb) = progress {
                    for s in &slides {
                        cb.on_slide_promoted(s.slide_number, total, false);
                    }
                }
                return slides;
            }
        };

        info!("Uploading {} slide(s) to {} folder '{}'", total, store.name(), folder);

        let mut promoted: Vec<SlideImage> = stream::iter(slides.into_iter().map(|mut slide| {
            let store = Arc::clone(store);
            async move {
                match store.upload(&slide.local_path, folder).await {
                    Ok(url) => {
                        debug!("Slide {} → {}", slide.slide_number, url);
                        slide.remote_url = Some(url);
                    }
                    Err(e) => {
                        let err = UploadError::UploadFailure {
                            slide_number: slide.slide_number,
                            detail: e.to_string(),
                        };
                        warn!("{}; serving {}", err, slide.local_url);
                    }
                }
                if let Some(cb) = progress {
                    cb.on_slide_promoted(slide.slide_number, total, slide.remote_url.is_some());
                }
                slide
            }
        }))
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        promoted.sort_by_key(|s| s.slide_number);
        promoted
    }
}
