// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the scan pipeline
//!
//! A scripted camera backend feeds frames whose pixel bytes are the barcode
//! text a fake scanner "decodes". A fake recognizer stands in for tesseract.

use card_scanner::backends::camera::{
    BackendError, BackendResult, CameraBackend, CameraBackendType, CameraFormat, Frame,
    FrameSource, PixelFormat, RawFrame,
};
use card_scanner::backends::shutter::ShutterCue;
use card_scanner::errors::{DecodeError, PipelineError, RecognitionError};
use card_scanner::frame_processor::{
    BarcodeDetection, BarcodeScanner, FrameRegion, RecognizedText, TextRecognizer,
};
use card_scanner::pipelines::photo::{EncodingFormat, StoredImage};
use card_scanner::pipelines::scan::{
    Callback, Handler, HostLifecycle, PipelineState, ScanPipeline, ScanSettings,
};
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc as std_mpsc};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio::time::timeout;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(3);
const QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Camera whose live frames are pushed by the test
struct ScriptedBackend {
    frames: std_mpsc::Receiver<RawFrame>,
    open: bool,
    still_failure: Option<String>,
}

impl CameraBackend for ScriptedBackend {
    fn open(&mut self) -> BackendResult<CameraFormat> {
        self.open = true;
        Ok(CameraFormat {
            width: 2,
            height: 2,
            pixel_format: PixelFormat::RGBA,
        })
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn next_frame(&mut self) -> BackendResult<Option<RawFrame>> {
        if !self.open {
            return Err(BackendError::NotInitialized);
        }
        match self.frames.recv_timeout(Duration::from_millis(5)) {
            Ok(frame) => Ok(Some(frame)),
            Err(std_mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                Err(BackendError::Disconnected("script ended".into()))
            }
        }
    }

    fn capture_still(&mut self) -> BackendResult<RawFrame> {
        match &self.still_failure {
            Some(reason) => Err(BackendError::Disconnected(reason.clone())),
            None => Ok(RawFrame::rgba(2, 2, vec![200; 16])),
        }
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::ImageFiles
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Treats frame bytes as the decoded text; "FAIL" is an unreadable symbol
#[derive(Default)]
struct FakeScanner {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    scans: AtomicUsize,
}

impl FakeScanner {
    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

impl BarcodeScanner for FakeScanner {
    fn scan(&self, frame: &Frame) -> Result<Vec<BarcodeDetection>, DecodeError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);

        let content = String::from_utf8_lossy(&frame.data).to_string();
        let result = match content.as_str() {
            "FAIL" => Err(DecodeError::Undecodable("bad checksum".into())),
            "" => Ok(Vec::new()),
            _ => Ok(vec![BarcodeDetection::new(
                FrameRegion::from_pixels(0, 0, 1, 1, 2, 2),
                content,
            )]),
        };

        self.scans.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Returns fixed text, optionally after being released by the test
#[derive(Default)]
struct FakeRecognizer {
    gate: Option<Arc<Notify>>,
    failure: Option<String>,
    started: AtomicBool,
    seen: Mutex<Vec<PathBuf>>,
}

impl TextRecognizer for FakeRecognizer {
    fn recognize<'a>(
        &'a self,
        image: &'a StoredImage,
    ) -> BoxFuture<'a, Result<RecognizedText, RecognitionError>> {
        Box::pin(async move {
            self.started.store(true, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if !image.path.exists() {
                return Err(RecognitionError::ImageUnavailable(
                    image.path.display().to_string(),
                ));
            }
            self.seen.lock().unwrap().push(image.path.clone());
            match &self.failure {
                Some(message) => Err(RecognitionError::Engine(message.clone())),
                None => Ok(RecognizedText::from_blocks(vec!["Alice's Card".into()])),
            }
        })
    }
}

/// Shutter whose speaker is always unavailable
struct BrokenShutter {
    plays: Arc<AtomicUsize>,
}

impl ShutterCue for BrokenShutter {
    fn play(&self) -> std::io::Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no sound device",
        ))
    }
}

struct Harness {
    pipeline: ScanPipeline,
    frames: std_mpsc::Sender<RawFrame>,
    scanner: Arc<FakeScanner>,
    recognizer: Arc<FakeRecognizer>,
    dir: PathBuf,
}

impl Harness {
    fn new(scanner: FakeScanner, recognizer: FakeRecognizer) -> Self {
        Self::with_camera(scanner, recognizer, None, |source| source)
    }

    fn with_camera(
        scanner: FakeScanner,
        recognizer: FakeRecognizer,
        still_failure: Option<&str>,
        configure: impl FnOnce(FrameSource) -> FrameSource,
    ) -> Self {
        let dir = std::env::temp_dir().join(format!("card-scanner-test-{}", uuid::Uuid::new_v4()));
        let (frames, receiver) = std_mpsc::channel();
        let backend = ScriptedBackend {
            frames: receiver,
            open: false,
            still_failure: still_failure.map(str::to_string),
        };

        let scanner = Arc::new(scanner);
        let recognizer = Arc::new(recognizer);
        let pipeline = ScanPipeline::new(
            configure(FrameSource::new(Box::new(backend))),
            Arc::clone(&scanner) as Arc<dyn BarcodeScanner>,
            Arc::clone(&recognizer) as Arc<dyn TextRecognizer>,
            ScanSettings::new(&dir).with_format(EncodingFormat::Png),
        );

        Self {
            pipeline,
            frames,
            scanner,
            recognizer,
            dir,
        }
    }

    fn push(&self, content: &str) {
        let data = content.as_bytes().to_vec();
        self.frames.send(RawFrame::rgba(2, 2, data)).unwrap();
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.pipeline.stop();
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

/// Handler that forwards every message into a channel
fn channel_handler() -> (Handler, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler: Handler = Arc::new(move |message: String| {
        let _ = tx.send(message);
    });
    (handler, rx)
}

async fn next_message(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    timeout(CALLBACK_TIMEOUT, rx.recv())
        .await
        .expect("callback did not fire in time")
        .expect("handler dropped")
}

async fn assert_silent(rx: &mut mpsc::UnboundedReceiver<String>) {
    if let Ok(Some(message)) = timeout(QUIET_PERIOD, rx.recv()).await {
        panic!("unexpected callback: {message}");
    }
}

async fn wait_until(condition: impl Fn() -> bool) {
    timeout(CALLBACK_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_capture_delivers_recognized_text() {
    let harness = Harness::new(FakeScanner::default(), FakeRecognizer::default());
    let (on_text, mut texts) = channel_handler();
    let (on_error, mut errors) = channel_handler();
    harness
        .pipeline
        .set_callback(Callback::OnCaptureSuccess(on_text))
        .set_callback(Callback::OnCaptureError(on_error));

    harness.pipeline.start(&HostLifecycle::new()).unwrap();
    harness.pipeline.capture_still().unwrap();

    assert_eq!(next_message(&mut texts).await, "Alice's Card");
    assert_silent(&mut errors).await;

    // Recognition ran on a still that had already been written
    let seen = harness.recognizer.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].starts_with(&harness.dir));
    assert_eq!(seen[0].extension().and_then(|ext| ext.to_str()), Some("png"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_recognition_failure_reports_engine_diagnostic() {
    let recognizer = FakeRecognizer {
        failure: Some("Failed loading language 'kor'".into()),
        ..FakeRecognizer::default()
    };
    let harness = Harness::new(FakeScanner::default(), recognizer);
    let (on_text, mut texts) = channel_handler();
    let (on_error, mut errors) = channel_handler();
    harness
        .pipeline
        .set_callback(Callback::OnCaptureSuccess(on_text))
        .set_callback(Callback::OnCaptureError(on_error));

    harness.pipeline.start(&HostLifecycle::new()).unwrap();
    harness.pipeline.capture_still().unwrap();

    assert_eq!(next_message(&mut errors).await, "Failed loading language 'kor'");
    assert_silent(&mut texts).await;
    assert_eq!(harness.pipeline.state(), PipelineState::Bound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_still_capture_failure_reports_display_text() {
    let harness = Harness::with_camera(
        FakeScanner::default(),
        FakeRecognizer::default(),
        Some("sensor busy"),
        |source| source,
    );
    let (on_text, mut texts) = channel_handler();
    let (on_error, mut errors) = channel_handler();
    harness
        .pipeline
        .set_callback(Callback::OnCaptureSuccess(on_text))
        .set_callback(Callback::OnCaptureError(on_error));

    harness.pipeline.start(&HostLifecycle::new()).unwrap();
    harness.pipeline.capture_still().unwrap();

    assert_eq!(
        next_message(&mut errors).await,
        "Capture failed: Camera disconnected: sensor busy"
    );
    assert_silent(&mut texts).await;
    assert!(!harness.recognizer.started.load(Ordering::SeqCst));
    assert_eq!(harness.pipeline.state(), PipelineState::Bound);

    // Barcode analysis keeps running after a failed still
    let (on_barcode, mut barcodes) = channel_handler();
    harness
        .pipeline
        .set_callback(Callback::OnBarcodeSuccess(on_barcode));
    harness.push("https://example.com/still-live");
    assert_eq!(
        next_message(&mut barcodes).await,
        "https://example.com/still-live"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failing_shutter_cue_does_not_fail_capture() {
    let plays = Arc::new(AtomicUsize::new(0));
    let shutter = BrokenShutter {
        plays: Arc::clone(&plays),
    };
    let harness = Harness::with_camera(
        FakeScanner::default(),
        FakeRecognizer::default(),
        None,
        |source| source.with_shutter(Box::new(shutter)),
    );
    let (on_text, mut texts) = channel_handler();
    let (on_error, mut errors) = channel_handler();
    harness
        .pipeline
        .set_callback(Callback::OnCaptureSuccess(on_text))
        .set_callback(Callback::OnCaptureError(on_error));

    harness.pipeline.start(&HostLifecycle::new()).unwrap();
    harness.pipeline.capture_still().unwrap();

    assert_eq!(next_message(&mut texts).await, "Alice's Card");
    assert_silent(&mut errors).await;
    assert_eq!(plays.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_capture_before_start_is_rejected() {
    let harness = Harness::new(FakeScanner::default(), FakeRecognizer::default());

    assert_eq!(harness.pipeline.state(), PipelineState::Idle);
    assert!(matches!(
        harness.pipeline.capture_still(),
        Err(PipelineError::NotBound)
    ));
    assert!(matches!(
        harness.pipeline.recognize_still().await,
        Err(PipelineError::NotBound)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_recognize_still_returns_text_directly() {
    let harness = Harness::new(FakeScanner::default(), FakeRecognizer::default());
    let (on_text, mut texts) = channel_handler();
    harness
        .pipeline
        .set_callback(Callback::OnCaptureSuccess(on_text));

    harness.pipeline.start(&HostLifecycle::new()).unwrap();
    let text = harness.pipeline.recognize_still().await.unwrap();

    assert_eq!(text, "Alice's Card");
    assert_silent(&mut texts).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bookmark_barcode_delivers_url_only() {
    let harness = Harness::new(FakeScanner::default(), FakeRecognizer::default());
    let (on_barcode, mut barcodes) = channel_handler();
    harness
        .pipeline
        .set_callback(Callback::OnBarcodeSuccess(on_barcode));

    harness.pipeline.start(&HostLifecycle::new()).unwrap();
    harness.push("MEBKM:TITLE:Example;URL:https://example.com;;");

    assert_eq!(next_message(&mut barcodes).await, "https://example.com");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wifi_barcode_delivers_credentials() {
    let harness = Harness::new(FakeScanner::default(), FakeRecognizer::default());
    let (on_barcode, mut barcodes) = channel_handler();
    harness
        .pipeline
        .set_callback(Callback::OnBarcodeSuccess(on_barcode));

    harness.pipeline.start(&HostLifecycle::new()).unwrap();
    harness.push("WIFI:S:Home;T:WPA;P:secret;;");

    assert_eq!(
        next_message(&mut barcodes).await,
        "SSID: Home\nPassword: secret\nEncryption: WPA"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unclassified_barcode_is_silent() {
    let harness = Harness::new(FakeScanner::default(), FakeRecognizer::default());
    let (on_barcode, mut barcodes) = channel_handler();
    let (on_error, mut errors) = channel_handler();
    harness
        .pipeline
        .set_callback(Callback::OnBarcodeSuccess(on_barcode))
        .set_callback(Callback::OnBarcodeError(on_error));

    harness.pipeline.start(&HostLifecycle::new()).unwrap();
    harness.push("tel:+82101234567");
    wait_until(|| harness.scanner.scans.load(Ordering::SeqCst) == 1).await;
    harness.push("https://example.com/after");

    assert_eq!(next_message(&mut barcodes).await, "https://example.com/after");
    assert_silent(&mut errors).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_decode_failure_does_not_wedge_pipeline() {
    let harness = Harness::new(FakeScanner::default(), FakeRecognizer::default());
    let (on_barcode, mut barcodes) = channel_handler();
    let (on_error, mut errors) = channel_handler();
    harness
        .pipeline
        .set_callback(Callback::OnBarcodeSuccess(on_barcode))
        .set_callback(Callback::OnBarcodeError(on_error));

    harness.pipeline.start(&HostLifecycle::new()).unwrap();
    harness.push("FAIL");
    assert_eq!(next_message(&mut errors).await, "Barcode scan failed.");

    harness.push("https://example.com/next");
    assert_eq!(next_message(&mut barcodes).await, "https://example.com/next");
    assert_eq!(harness.pipeline.state(), PipelineState::Bound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_at_most_one_frame_in_analysis_and_none_leaked() {
    let harness = Harness::new(
        FakeScanner::slow(Duration::from_millis(15)),
        FakeRecognizer::default(),
    );
    harness.pipeline.start(&HostLifecycle::new()).unwrap();

    for i in 0..40 {
        harness.push(&format!("https://example.com/{i}"));
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    wait_until(|| harness.pipeline.frame_stats().acquired == 40).await;

    harness.pipeline.stop();
    wait_until(|| {
        let stats = harness.pipeline.frame_stats();
        stats.acquired == stats.released
    })
    .await;

    let stats = harness.pipeline.frame_stats();
    assert_eq!(harness.scanner.max_in_flight.load(Ordering::SeqCst), 1);
    assert!(stats.superseded > 0, "slow analysis should supersede frames");
    assert!(harness.scanner.scans.load(Ordering::SeqCst) < 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_suppresses_in_flight_barcode() {
    let harness = Harness::new(
        FakeScanner::slow(Duration::from_millis(150)),
        FakeRecognizer::default(),
    );
    let (on_barcode, mut barcodes) = channel_handler();
    harness
        .pipeline
        .set_callback(Callback::OnBarcodeSuccess(on_barcode));

    harness.pipeline.start(&HostLifecycle::new()).unwrap();
    harness.push("https://example.com/late");
    wait_until(|| harness.scanner.in_flight.load(Ordering::SeqCst) == 1).await;

    harness.pipeline.stop();
    assert_eq!(harness.pipeline.state(), PipelineState::Unbound);
    assert_silent(&mut barcodes).await;

    // The frame under analysis is still released
    wait_until(|| {
        let stats = harness.pipeline.frame_stats();
        stats.acquired == stats.released
    })
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_suppresses_in_flight_capture() {
    let gate = Arc::new(Notify::new());
    let recognizer = FakeRecognizer {
        gate: Some(Arc::clone(&gate)),
        ..FakeRecognizer::default()
    };
    let harness = Harness::new(FakeScanner::default(), recognizer);
    let (on_text, mut texts) = channel_handler();
    let (on_error, mut errors) = channel_handler();
    harness
        .pipeline
        .set_callback(Callback::OnCaptureSuccess(on_text))
        .set_callback(Callback::OnCaptureError(on_error));

    harness.pipeline.start(&HostLifecycle::new()).unwrap();
    harness.pipeline.capture_still().unwrap();
    wait_until(|| harness.recognizer.started.load(Ordering::SeqCst)).await;

    harness.pipeline.stop();
    gate.notify_one();

    assert_silent(&mut texts).await;
    assert_silent(&mut errors).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_replaced_handler_receives_late_outcome_alone() {
    let harness = Harness::new(
        FakeScanner::slow(Duration::from_millis(150)),
        FakeRecognizer::default(),
    );
    let (first, mut first_rx) = channel_handler();
    let (second, mut second_rx) = channel_handler();
    harness
        .pipeline
        .set_callback(Callback::OnBarcodeSuccess(first));

    harness.pipeline.start(&HostLifecycle::new()).unwrap();
    harness.push("https://example.com/replaced");
    wait_until(|| harness.scanner.in_flight.load(Ordering::SeqCst) == 1).await;

    harness
        .pipeline
        .set_callback(Callback::OnBarcodeSuccess(second));

    assert_eq!(
        next_message(&mut second_rx).await,
        "https://example.com/replaced"
    );
    assert_silent(&mut first_rx).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_lifecycle_end_unbinds_pipeline() {
    let harness = Harness::new(
        FakeScanner::slow(Duration::from_millis(150)),
        FakeRecognizer::default(),
    );
    let (on_barcode, mut barcodes) = channel_handler();
    harness
        .pipeline
        .set_callback(Callback::OnBarcodeSuccess(on_barcode));

    let lifecycle = HostLifecycle::new();
    harness.pipeline.start(&lifecycle).unwrap();
    harness.push("https://example.com/ending");
    wait_until(|| harness.scanner.in_flight.load(Ordering::SeqCst) == 1).await;

    lifecycle.end();
    wait_until(|| harness.pipeline.state() == PipelineState::Unbound).await;
    assert_silent(&mut barcodes).await;

    assert!(matches!(
        harness.pipeline.start(&lifecycle),
        Err(PipelineError::LifecycleEnded)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_discards_previous_session_outcomes() {
    let harness = Harness::new(
        FakeScanner::slow(Duration::from_millis(150)),
        FakeRecognizer::default(),
    );
    let (on_barcode, mut barcodes) = channel_handler();
    harness
        .pipeline
        .set_callback(Callback::OnBarcodeSuccess(on_barcode));

    let first = HostLifecycle::new();
    harness.pipeline.start(&first).unwrap();
    harness.push("https://example.com/old");
    wait_until(|| harness.scanner.in_flight.load(Ordering::SeqCst) == 1).await;

    let second = HostLifecycle::new();
    harness.pipeline.start(&second).unwrap();
    assert_silent(&mut barcodes).await;

    // Ending the replaced lifecycle leaves the new session alone
    first.end();
    harness.push("https://example.com/new");
    assert_eq!(next_message(&mut barcodes).await, "https://example.com/new");
    assert_eq!(harness.pipeline.state(), PipelineState::Bound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_waits_for_previous_scan_before_analyzing() {
    let harness = Harness::new(
        FakeScanner::slow(Duration::from_millis(300)),
        FakeRecognizer::default(),
    );
    let (on_barcode, mut barcodes) = channel_handler();
    harness
        .pipeline
        .set_callback(Callback::OnBarcodeSuccess(on_barcode));

    harness.pipeline.start(&HostLifecycle::new()).unwrap();
    harness.push("https://example.com/old");
    wait_until(|| harness.scanner.in_flight.load(Ordering::SeqCst) == 1).await;

    harness.pipeline.start(&HostLifecycle::new()).unwrap();
    harness.push("https://example.com/new");
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(next_message(&mut barcodes).await, "https://example.com/new");
    assert_eq!(harness.scanner.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(harness.scanner.scans.load(Ordering::SeqCst), 2);
}
