//! Progress-callback trait for conversion stage events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the job moves through office conversion, the raster strategy
//! chain and slide promotion.
//!
//! # Example
//!
//! ```rust
//! use deck2slides::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct StrategyCounter {
//!     tried: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for StrategyCounter {
//!     fn on_strategy_start(&self, name: &str) {
//!         self.tried.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("trying {name}");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(StrategyCounter { tried: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it moves through each stage.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. With `upload_concurrency > 1`,
/// `on_slide_promoted` may be called from several tasks at once.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after the input has been validated.
    fn on_conversion_start(&self, presentation_id: &str) {
        let _ = presentation_id;
    }

    /// Called before the office deck is converted to PDF.
    fn on_office_conversion_start(&self) {}

    /// Called when the office-to-PDF stage finished successfully.
    ///
    /// # Arguments
    /// * `via` — name of the candidate that produced the PDF
    fn on_office_conversion_complete(&self, via: &str) {
        let _ = via;
    }

    /// Called just before a raster strategy is invoked.
    fn on_strategy_start(&self, name: &str) {
        let _ = name;
    }

    /// Called when a raster strategy failed or produced nothing.
    fn on_strategy_failed(&self, name: &str, error: &str) {
        let _ = (name, error);
    }

    /// Called when a raster strategy's output is accepted.
    fn on_strategy_succeeded(&self, name: &str, slide_count: usize) {
        let _ = (name, slide_count);
    }

    /// Called once per slide after the upload stage decided its image path.
    ///
    /// # Arguments
    /// * `slide_number` — 1-indexed slide number
    /// * `total`        — number of slides in the job
    /// * `remote`       — `true` if the slide now has a durable remote URL
    fn on_slide_promoted(&self, slide_number: usize, total: usize, remote: bool) {
        let _ = (slide_number, total, remote);
    }

    /// Called once when the job returns a complete slide list.
    fn on_conversion_complete(&self, slide_count: usize) {
        let _ = slide_count;
    }

    /// Called once when the job ends with a fatal error, including input
    /// errors raised before `on_conversion_start`.
    fn on_conversion_failed(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        strategies: Mutex<Vec<String>>,
        failures: AtomicUsize,
        remote: AtomicUsize,
        local: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_strategy_start(&self, name: &str) {
            self.strategies.lock().unwrap().push(name.to_string());
        }

        fn on_strategy_failed(&self, _name: &str, _error: &str) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }

        fn on_slide_promoted(&self, _slide_number: usize, _total: usize, remote: bool) {
            if remote {
                self.remote.fetch_add(1, Ordering::SeqCst);
            } else {
                self.local.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start("p1");
        cb.on_office_conversion_start();
        cb.on_office_conversion_complete("soffice");
        cb.on_strategy_start("poppler");
        cb.on_strategy_failed("poppler", "not found");
        cb.on_strategy_succeeded("ghostscript", 3);
        cb.on_slide_promoted(1, 3, false);
        cb.on_conversion_complete(3);
        cb.on_conversion_failed("no raster tool");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_strategy_start("poppler");
        tracker.on_strategy_failed("poppler", "not found");
        tracker.on_strategy_start("ghostscript");
        tracker.on_slide_promoted(1, 2, true);
        tracker.on_slide_promoted(2, 2, false);

        assert_eq!(
            *tracker.strategies.lock().unwrap(),
            vec!["poppler".to_string(), "ghostscript".to_string()]
        );
        assert_eq!(tracker.failures.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.remote.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.local.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_conversion_start("p1");
        cb.on_conversion_complete(0);
    }
}
