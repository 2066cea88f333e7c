//! Output types: the ordered slide list handed back to the caller.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One rendered page of the deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideImage {
    /// 1-indexed, contiguous, matches the source page order.
    pub slide_number: usize,
    /// File name inside the presentation directory, e.g. `slide-003.png`.
    pub file_name: String,
    /// Absolute local file path.
    pub local_path: PathBuf,
    /// Static-serving path, `/converted-slides/{presentationId}/{file_name}`.
    pub local_url: String,
    /// Durable URL once promoted to remote storage.
    pub remote_url: Option<String>,
}

impl SlideImage {
    /// The path the presentation layer should display: the remote URL when
    /// the upload succeeded, otherwise the local static path.
    pub fn image_path(&self) -> &str {
        self.remote_url.as_deref().unwrap_or(&self.local_url)
    }

    pub fn is_remote(&self) -> bool {
        self.remote_url.is_some()
    }

    pub fn record(&self) -> SlideRecord {
        SlideRecord {
            slide_number: self.slide_number,
            image_path: self.image_path().to_string(),
        }
    }
}

/// The wire shape consumed by the presentation-management layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideRecord {
    pub slide_number: usize,
    pub image_path: String,
}

/// Result of a successful conversion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub presentation_id: String,
    /// Slides in ascending `slide_number` order, starting at 1, no gaps.
    pub slides: Vec<SlideImage>,
    pub stats: ConversionStats,
}

impl ConversionResult {
    /// The ordered `{slideNumber, imagePath}` list.
    pub fn records(&self) -> Vec<SlideRecord> {
        self.slides.iter().map(SlideImage::record).collect()
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }
}

/// Statistics for one job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionStats {
    /// Name of the office candidate that produced the PDF, if any ran.
    pub office_converter: Option<String>,
    /// Name of the raster strategy whose output was accepted.
    pub raster_strategy: String,
    /// Raster strategies attempted, including the winning one.
    pub strategies_tried: usize,
    pub slide_count: usize,
    pub uploaded: usize,
    pub local_fallbacks: usize,
    pub office_duration_ms: u64,
    pub raster_duration_ms: u64,
    pub upload_duration_ms: u64,
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide(n: usize, remote: Option<&str>) -> SlideImage {
        SlideImage {
            slide_number: n,
            file_name: format!("slide-{n:03}.png"),
            local_path: PathBuf::from(format!("/srv/p1/slide-{n:03}.png")),
            local_url: format!("/converted-slides/p1/slide-{n:03}.png"),
            remote_url: remote.map(str::to_string),
        }
    }

    #[test]
    fn image_path_prefers_remote() {
        assert_eq!(
            slide(1, Some("https://cdn.example/s1.png")).image_path(),
            "https://cdn.example/s1.png"
        );
        assert_eq!(slide(2, None).image_path(), "/converted-slides/p1/slide-002.png");
    }

    #[test]
    fn records_serialise_in_camel_case() {
        let result = ConversionResult {
            presentation_id: "p1".into(),
            slides: vec![slide(1, None), slide(2, Some("https://cdn.example/s2.png"))],
            stats: ConversionStats::default(),
        };
        let json = serde_json::to_value(result.records()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"slideNumber": 1, "imagePath": "/converted-slides/p1/slide-001.png"},
                {"slideNumber": 2, "imagePath": "https://cdn.example/s2.png"}
            ])
        );
    }
}
