//! Pipeline integration tests with scripted tools.
//!
//! Every external collaborator (office suite, raster tools, slide store) is
//! replaced by a fake, so these run anywhere:
//!
//!   cargo test --test pipeline

use async_trait::async_trait;
use deck2slides::pipeline::office::OfficeToPdfConverter;
use deck2slides::probe::CommandTemplate;
use deck2slides::process::{CommandSpec, ProcessError, ProcessOutput};
use deck2slides::{
    AttemptError, CloudUploader, ConversionConfig, ConversionError, ConversionProgressCallback,
    FailureArtifacts, PdfToImageConverter, ProcessRunner, RasterStrategy, SlideConverter, SlideStore,
    StrategyProbe, UploadError,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Office suite stand-in: `fake-soffice` writes `{outdir}/{stem}.pdf`.
#[derive(Default)]
struct FakeOffice {
    calls: AtomicUsize,
    broken: bool,
}

#[async_trait]
impl ProcessRunner for FakeOffice {
    async fn run(&self, spec: &CommandSpec, _t: Duration) -> Result<ProcessOutput, ProcessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken || spec.program != "fake-soffice" {
            return Err(ProcessError::NotFound {
                program: spec.program.clone(),
            });
        }
        let outdir = Path::new(&spec.args[spec.args.len() - 2]);
        let input = Path::new(spec.args.last().unwrap());
        let pdf = outdir.join(input.with_extension("pdf").file_name().unwrap());
        std::fs::write(pdf, b"%PDF-1.7 from office").unwrap();
        Ok(ProcessOutput {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 1,
        })
    }
}

/// Raster tool stand-in writing `slide-{n}.png` (unpadded) with `page {n}` inside.
struct FakeRaster {
    name: &'static str,
    installed: bool,
    fails: bool,
    pages: usize,
    runs: AtomicUsize,
    seen_pdf: Mutex<Option<PathBuf>>,
}

impl FakeRaster {
    fn build(name: &'static str, installed: bool, fails: bool, pages: usize) -> Arc<Self> {
        Arc::new(Self {
            name,
            installed,
            fails,
            pages,
            runs: AtomicUsize::new(0),
            seen_pdf: Mutex::new(None),
        })
    }

    fn pages(name: &'static str, pages: usize) -> Arc<Self> {
        Self::build(name, true, false, pages)
    }

    fn absent(name: &'static str) -> Arc<Self> {
        Self::build(name, false, false, 0)
    }

    /// Writes two pages, then times out.
    fn failing(name: &'static str) -> Arc<Self> {
        Self::build(name, true, true, 2)
    }
}

#[async_trait]
impl RasterStrategy for FakeRaster {
    fn name(&self) -> &str {
        self.name
    }

    async fn probe(&self) -> bool {
        self.installed
    }

    async fn rasterize(&self, pdf_path: &Path, out_dir: &Path) -> Result<(), AttemptError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        *self.seen_pdf.lock().unwrap() = Some(pdf_path.to_path_buf());
        for n in 1..=self.pages {
            std::fs::write(out_dir.join(format!("slide-{n}.png")), format!("page {n}"))?;
        }
        if self.fails {
            return Err(AttemptError::Timeout {
                program: self.name.to_string(),
                secs: 120,
            });
        }
        Ok(())
    }
}

/// Slide store that rejects the listed slide files.
struct FakeStore {
    failing: Vec<&'static str>,
    uploads: AtomicUsize,
}

#[async_trait]
impl SlideStore for FakeStore {
    fn name(&self) -> &str {
        "fake-store"
    }

    async fn upload(&self, local_path: &Path, folder: &str) -> Result<String, UploadError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let file = local_path.file_name().unwrap().to_string_lossy().into_owned();
        if self.failing.contains(&file.as_str()) {
            return Err(UploadError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        Ok(format!("https://res.example.com/{folder}/{file}"))
    }
}

// ── Test helpers ─────────────────────────────────────────────────────────────

struct Harness {
    dir: TempDir,
    office: Arc<FakeOffice>,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            office: Arc::new(FakeOffice::default()),
        }
    }

    fn root(&self) -> PathBuf {
        self.dir.path().join("converted-slides")
    }

    fn config(&self) -> ConversionConfig {
        ConversionConfig::builder()
            .converted_slides_root(self.root())
            .build()
            .unwrap()
    }

    fn upload(&self, name: &str, body: &[u8]) -> PathBuf {
        let uploads = self.dir.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        let p = uploads.join(name);
        std::fs::write(&p, body).unwrap();
        p
    }

    fn pdf(&self, name: &str) -> PathBuf {
        self.upload(name, b"%PDF-1.7\n")
    }

    fn converter(
        &self,
        config: ConversionConfig,
        strategies: &[Arc<FakeRaster>],
        store: Option<Arc<FakeStore>>,
    ) -> SlideConverter {
        let office = OfficeToPdfConverter::new(
            self.office.clone(),
            &StrategyProbe::default(),
            Duration::from_secs(5),
        )
        .with_candidates(vec![CommandTemplate::new(
            "fake-soffice",
            &["--headless", "--convert-to", "pdf", "--outdir", "{outdir}", "{input}"],
        )])
        .with_fallback(None);
        let raster = PdfToImageConverter::new(
            strategies
                .iter()
                .map(|s| s.clone() as Arc<dyn RasterStrategy>)
                .collect(),
        );
        let uploader = CloudUploader::new(
            store.map(|s| s as Arc<dyn SlideStore>),
            config.upload_concurrency,
        );
        SlideConverter::from_parts(config, office, raster, uploader)
    }

    fn png_names(&self, id: &str) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.root().join(id))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".png"))
            .collect();
        names.sort();
        names
    }
}

// ── Example scenarios ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pptx_local_mode_eight_slides() {
    let h = Harness::new();
    let source = h.upload("lecture.pptx", b"PK\x03\x04deck");
    let raster = FakeRaster::pages("poppler", 8);
    let conv = h.converter(h.config(), &[raster.clone()], None);

    let result = conv.convert(&source, "abc123").await.unwrap();

    let records = result.records();
    assert_eq!(records.len(), 8);
    for (i, r) in records.iter().enumerate() {
        assert_eq!(r.slide_number, i + 1);
        assert_eq!(r.image_path, format!("/converted-slides/abc123/slide-{:03}.png", i + 1));
    }
    assert_eq!(result.stats.office_converter.as_deref(), Some("fake-soffice"));

    // the raster stage read the office output, which is gone afterwards
    let intermediate = source.with_extension("pdf");
    assert_eq!(raster.seen_pdf.lock().unwrap().as_deref(), Some(intermediate.as_path()));
    assert!(!intermediate.exists());
    assert!(source.exists());
}

#[tokio::test]
async fn test_pdf_second_strategy_used_when_first_absent() {
    let h = Harness::new();
    let source = h.pdf("deck.pdf");
    let absent = FakeRaster::absent("poppler");
    let gs = FakeRaster::pages("ghostscript", 5);
    let conv = h.converter(h.config(), &[absent.clone(), gs.clone()], None);

    let result = conv.convert(&source, "p2").await.unwrap();
    assert_eq!(result.len(), 5);
    assert_eq!(result.stats.raster_strategy, "ghostscript");
    assert_eq!(result.stats.strategies_tried, 2);
    assert_eq!(absent.runs.load(Ordering::SeqCst), 0);
    assert_eq!(h.office.calls.load(Ordering::SeqCst), 0, "PDF input skips the office stage");
    assert!(source.exists(), "caller's PDF must never be deleted");
}

#[tokio::test]
async fn test_upload_failure_of_slide_two_falls_back() {
    let h = Harness::new();
    let source = h.pdf("deck.pdf");
    let store = Arc::new(FakeStore {
        failing: vec!["slide-002.png"],
        uploads: AtomicUsize::new(0),
    });
    let conv = h.converter(h.config(), &[FakeRaster::pages("poppler", 3)], Some(store.clone()));

    let result = conv.convert(&source, "p3").await.unwrap();
    let paths: Vec<_> = result.records().into_iter().map(|r| r.image_path).collect();
    assert_eq!(
        paths,
        vec![
            "https://res.example.com/slides/p3/slide-001.png".to_string(),
            "/converted-slides/p3/slide-002.png".to_string(),
            "https://res.example.com/slides/p3/slide-003.png".to_string(),
        ]
    );
    assert_eq!(result.stats.uploaded, 2);
    assert_eq!(result.stats.local_fallbacks, 1);
}

#[tokio::test]
async fn test_all_strategies_failing_is_fatal() {
    let h = Harness::new();
    let source = h.pdf("deck.pdf");
    let conv = h.converter(
        h.config(),
        &[
            FakeRaster::absent("poppler"),
            FakeRaster::failing("ghostscript"),
            FakeRaster::pages("mupdf", 0),
            FakeRaster::absent("pdfium"),
        ],
        None,
    );

    let err = conv.convert(&source, "p4").await.unwrap_err();
    match &err {
        ConversionError::NoRasterToolAvailable { attempts } => assert_eq!(attempts.len(), 4),
        other => panic!("expected NoRasterToolAvailable, got {other:?}"),
    }
    // default policy removes partial output and the then-empty directory
    assert!(!h.root().join("p4").exists());
}

// ── Testable properties ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_numeric_order_past_nine_pages() {
    let h = Harness::new();
    let source = h.pdf("deck.pdf");
    let conv = h.converter(h.config(), &[FakeRaster::pages("poppler", 12)], None);

    let result = conv.convert(&source, "p5").await.unwrap();
    let numbers: Vec<_> = result.slides.iter().map(|s| s.slide_number).collect();
    assert_eq!(numbers, (1..=12).collect::<Vec<_>>());
    // slide-10.png (page 10) must not land between page 1 and page 2
    for slide in &result.slides {
        let body = std::fs::read_to_string(&slide.local_path).unwrap();
        assert_eq!(body, format!("page {}", slide.slide_number));
    }
}

#[tokio::test]
async fn test_retry_does_not_mix_runs() {
    let h = Harness::new();
    let first = h.pdf("first.pdf");
    let second = h.pdf("second.pdf");

    h.converter(h.config(), &[FakeRaster::pages("poppler", 5)], None)
        .convert(&first, "same")
        .await
        .unwrap();
    assert_eq!(h.png_names("same").len(), 5);

    let result = h
        .converter(h.config(), &[FakeRaster::pages("poppler", 3)], None)
        .convert(&second, "same")
        .await
        .unwrap();
    assert_eq!(result.len(), 3);
    assert_eq!(
        h.png_names("same"),
        vec!["slide-001.png", "slide-002.png", "slide-003.png"]
    );
}

#[tokio::test]
async fn test_first_success_wins() {
    let h = Harness::new();
    let source = h.pdf("deck.pdf");
    let a = FakeRaster::pages("poppler", 4);
    let b = FakeRaster::pages("ghostscript", 4);
    h.converter(h.config(), &[a.clone(), b.clone()], None)
        .convert(&source, "p6")
        .await
        .unwrap();
    assert_eq!(a.runs.load(Ordering::SeqCst), 1);
    assert_eq!(b.runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_upload_isolation_one_of_five() {
    let h = Harness::new();
    let source = h.pdf("deck.pdf");
    let store = Arc::new(FakeStore {
        failing: vec!["slide-004.png"],
        uploads: AtomicUsize::new(0),
    });
    let config = ConversionConfig::builder()
        .converted_slides_root(h.root())
        .upload_concurrency(3)
        .build()
        .unwrap();
    let conv = h.converter(config, &[FakeRaster::pages("poppler", 5)], Some(store.clone()));

    let result = conv.convert(&source, "p7").await.unwrap();
    assert_eq!(result.len(), 5);
    assert_eq!(store.uploads.load(Ordering::SeqCst), 5);
    let remote: Vec<bool> = result.slides.iter().map(|s| s.is_remote()).collect();
    assert_eq!(remote, vec![true, true, true, false, true]);
    assert_eq!(result.slides[3].image_path(), "/converted-slides/p7/slide-004.png");
}

#[tokio::test]
async fn test_unsupported_extension_invokes_nothing() {
    let h = Harness::new();
    let source = h.upload("notes.txt", b"hello");
    let raster = FakeRaster::pages("poppler", 1);
    let err = h
        .converter(h.config(), &[raster.clone()], None)
        .convert(&source, "p8")
        .await
        .unwrap_err();
    assert!(matches!(err, ConversionError::UnsupportedFormat { .. }));
    assert_eq!(raster.runs.load(Ordering::SeqCst), 0);
    assert_eq!(h.office.calls.load(Ordering::SeqCst), 0);
    assert!(!h.root().join("p8").exists());
}

// ── Failure policy and office stage ──────────────────────────────────────────

#[tokio::test]
async fn test_keep_policy_leaves_failed_output() {
    let h = Harness::new();
    let source = h.pdf("deck.pdf");
    let config = ConversionConfig::builder()
        .converted_slides_root(h.root())
        .failure_artifacts(FailureArtifacts::Keep)
        .build()
        .unwrap();
    let err = h
        .converter(config, &[FakeRaster::failing("ghostscript")], None)
        .convert(&source, "p9")
        .await
        .unwrap_err();
    assert!(matches!(err, ConversionError::NoRasterToolAvailable { .. }));
    assert_eq!(h.png_names("p9").len(), 2, "partial pages kept for inspection");
}

#[tokio::test]
async fn test_office_unavailable_is_fatal_and_skips_raster() {
    let h = Harness {
        dir: TempDir::new().unwrap(),
        office: Arc::new(FakeOffice {
            calls: AtomicUsize::new(0),
            broken: true,
        }),
    };
    let source = h.upload("lecture.pptx", b"PK\x03\x04deck");
    let raster = FakeRaster::pages("poppler", 3);
    let err = h
        .converter(h.config(), &[raster.clone()], None)
        .convert(&source, "p10")
        .await
        .unwrap_err();
    assert!(matches!(err, ConversionError::OfficeConversionUnavailable { .. }));
    assert_eq!(raster.runs.load(Ordering::SeqCst), 0);
    assert!(source.exists());
    assert!(!h.root().join("p10").exists(), "no working dir without a PDF");
}

#[tokio::test]
async fn test_intermediate_pdf_removed_after_raster_failure() {
    let h = Harness::new();
    let source = h.upload("lecture.ppt", b"\xd0\xcf\x11\xe0legacy");
    let err = h
        .converter(h.config(), &[FakeRaster::absent("poppler")], None)
        .convert(&source, "p11")
        .await
        .unwrap_err();
    assert!(matches!(err, ConversionError::NoRasterToolAvailable { .. }));
    assert!(!source.with_extension("pdf").exists());
    assert!(source.exists());
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl ConversionProgressCallback for Recorder {
    fn on_conversion_start(&self, presentation_id: &str) {
        self.events.lock().unwrap().push(format!("start {presentation_id}"));
    }
    fn on_office_conversion_complete(&self, via: &str) {
        self.events.lock().unwrap().push(format!("office {via}"));
    }
    fn on_strategy_failed(&self, name: &str, _error: &str) {
        self.events.lock().unwrap().push(format!("failed {name}"));
    }
    fn on_strategy_succeeded(&self, name: &str, slide_count: usize) {
        self.events.lock().unwrap().push(format!("ok {name} {slide_count}"));
    }
    fn on_conversion_complete(&self, slide_count: usize) {
        self.events.lock().unwrap().push(format!("done {slide_count}"));
    }
    fn on_conversion_failed(&self, _error: &str) {
        self.events.lock().unwrap().push("fatal".to_string());
    }
}

#[tokio::test]
async fn test_progress_events_in_stage_order() {
    let h = Harness::new();
    let source = h.upload("lecture.pptx", b"PK\x03\x04deck");
    let recorder = Arc::new(Recorder::default());
    let config = ConversionConfig::builder()
        .converted_slides_root(h.root())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    h.converter(
        config,
        &[FakeRaster::absent("poppler"), FakeRaster::pages("mupdf", 2)],
        None,
    )
    .convert(&source, "p12")
    .await
    .unwrap();

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec![
            "start p12",
            "office fake-soffice",
            "failed poppler",
            "ok mupdf 2",
            "done 2"
        ]
    );
}

#[tokio::test]
async fn test_fatal_error_ends_progress_with_failure() {
    let h = Harness::new();
    let source = h.pdf("deck.pdf");
    let recorder = Arc::new(Recorder::default());
    let config = ConversionConfig::builder()
        .converted_slides_root(h.root())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let err = h
        .converter(config, &[FakeRaster::absent("poppler")], None)
        .convert(&source, "p14")
        .await
        .unwrap_err();
    assert!(matches!(err, ConversionError::NoRasterToolAvailable { .. }));
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["start p14", "failed poppler", "fatal"]
    );
}

#[test]
fn test_result_serialises_for_presentation_layer() {
    let h = Harness::new();
    let source = h.pdf("deck.pdf");
    let result = tokio_test::block_on(
        h.converter(h.config(), &[FakeRaster::pages("poppler", 1)], None)
            .convert(&source, "p13"),
    )
    .unwrap();
    let json = serde_json::to_value(result.records()).unwrap();
    assert_eq!(
        json,
        serde_json::json!([{"slideNumber": 1, "imagePath": "/converted-slides/p13/slide-001.png"}])
    );
}
