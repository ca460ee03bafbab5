// SPDX-License-Identifier: GPL-3.0-only

//! Capture and recognition pipeline
//!
//! Binds a [`FrameSource`] to two analysis paths and reports their outcomes
//! through a four-slot [`CallbackSet`]:
//!
//! ```text
//! FrameSource ─┬─ live frames ─► LatestFrameSlot ─► BarcodeAnalyzer ─┐
//!              │                                                     ├─► dispatcher ─► CallbackSet
//!              └─ still ─► PhotoPipeline ─► TextRecognizer ──────────┘
//! ```
//!
//! All handlers run on a single dispatcher task, so handlers of one
//! pipeline never run concurrently. Every binding is a new generation;
//! outcomes of an earlier generation are discarded.

pub mod backpressure;
pub mod callbacks;
mod dispatch;
pub mod lifecycle;
pub mod outcome;

pub use backpressure::LatestFrameSlot;
pub use callbacks::{Callback, CallbackSet, CallbackSlot, Handler};
pub use lifecycle::{HostLifecycle, LifecycleState};
pub use outcome::RecognitionOutcome;

use crate::backends::camera::types::{FrameSink, PreviewSurface};
use crate::backends::camera::{CameraBackend, FrameSource};
use crate::config::Config;
use crate::constants::barcode;
use crate::errors::{PipelineError, PipelineResult, lock_or_recover};
use crate::frame_processor::{
    BarcodeAnalyzer, BarcodeScanner, QrDetector, TesseractRecognizer, TextRecognizer,
};
use crate::pipelines::photo::{
    CaptureRequest, EncodingFormat, PhotoEncoder, PhotoPipeline,
};
use dispatch::{Dispatch, Dispatcher};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Externally observable pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Constructed, nothing attached
    Idle,
    /// Preview and analysis attached to a host lifecycle
    Bound,
    /// Stopped, or the host lifecycle ended
    Unbound,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::Bound => write!(f, "bound"),
            PipelineState::Unbound => write!(f, "unbound"),
        }
    }
}

/// Live frame accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames handed out by the frame source
    pub acquired: u64,
    /// Frames released again
    pub released: u64,
    /// Frames dropped without analysis
    pub superseded: u64,
}

/// Settings for stills and barcode failures
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub output_dir: PathBuf,
    pub format: EncodingFormat,
    pub failure_message: String,
}

impl ScanSettings {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            format: EncodingFormat::default(),
            failure_message: barcode::DEFAULT_FAILURE_MESSAGE.to_string(),
        }
    }

    pub fn with_format(mut self, format: EncodingFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.captures_dir())
            .with_format(config.photo_format.into())
            .with_failure_message(config.barcode_failure_message.clone())
    }
}

struct Session {
    state: PipelineState,
    generation: u64,
    slot: Option<Arc<LatestFrameSlot>>,
    outcomes: Option<mpsc::UnboundedSender<Dispatch>>,
    tasks: Vec<JoinHandle<()>>,
    /// Superseded count of slots from earlier generations
    retired_superseded: u64,
}

struct Inner {
    source: Arc<FrameSource>,
    analyzer: BarcodeAnalyzer,
    recognizer: Arc<dyn TextRecognizer>,
    dispatcher: Arc<Dispatcher>,
    settings: ScanSettings,
    generations: AtomicU64,
    session: Mutex<Session>,
}

/// Orchestrates live barcode analysis and still capture with recognition
///
/// `start` and `capture_still` spawn tasks and must be called within a
/// tokio runtime.
pub struct ScanPipeline {
    inner: Arc<Inner>,
}

impl ScanPipeline {
    pub fn new(
        source: FrameSource,
        scanner: Arc<dyn BarcodeScanner>,
        recognizer: Arc<dyn TextRecognizer>,
        settings: ScanSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source: Arc::new(source),
                analyzer: BarcodeAnalyzer::new(scanner),
                recognizer,
                dispatcher: Arc::new(Dispatcher::default()),
                settings,
                generations: AtomicU64::new(0),
                session: Mutex::new(Session {
                    state: PipelineState::Idle,
                    generation: dispatch::INACTIVE,
                    slot: None,
                    outcomes: None,
                    tasks: Vec::new(),
                    retired_superseded: 0,
                }),
            }),
        }
    }

    /// Pipeline with the QR scanner and tesseract configured by `config`
    pub fn from_config(config: &Config, backend: Box<dyn CameraBackend>) -> Self {
        let mut encoder = PhotoEncoder::new();
        encoder.set_format(config.photo_format.into());

        let source = FrameSource::new(backend)
            .with_shutter(config.shutter_sound.cue())
            .with_photo_pipeline(PhotoPipeline::new(encoder));
        let scanner = Arc::new(QrDetector::with_max_dimension(config.qr_max_dimension));
        let recognizer = Arc::new(TesseractRecognizer::new(
            &config.tesseract_path,
            config.ocr_languages.clone(),
            config.ocr_timeout(),
        ));

        Self::new(source, scanner, recognizer, ScanSettings::from_config(config))
    }

    /// Bind the camera to `lifecycle` and start barcode analysis
    ///
    /// A running session is unbound first. When `lifecycle` ends, the
    /// session started here is unbound, unless it was already replaced.
    pub fn start(&self, lifecycle: &HostLifecycle) -> PipelineResult<PreviewSurface> {
        if lifecycle.is_ended() {
            return Err(PipelineError::LifecycleEnded);
        }

        // Revoked before taking the session lock; a handler may be calling in
        self.inner.dispatcher.revoke();

        let mut session = lock_or_recover(&self.inner.session);
        self.inner.teardown(&mut session);

        let generation = self.inner.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let slot = LatestFrameSlot::new();
        let sink: Arc<dyn FrameSink> = Arc::clone(&slot) as Arc<dyn FrameSink>;
        let preview = self.inner.source.bind(sink)?;

        self.inner.dispatcher.activate(generation);
        let (outcomes, receiver) = mpsc::unbounded_channel();

        let tasks = vec![
            tokio::spawn(run_dispatcher(Arc::clone(&self.inner.dispatcher), receiver)),
            tokio::spawn(run_barcode_worker(
                generation,
                Arc::clone(&slot),
                self.inner.analyzer.clone(),
                outcomes.clone(),
                self.inner.settings.failure_message.clone(),
            )),
            tokio::spawn(watch_lifecycle(
                generation,
                lifecycle.clone(),
                Arc::downgrade(&self.inner),
            )),
        ];

        session.state = PipelineState::Bound;
        session.generation = generation;
        session.slot = Some(slot);
        session.outcomes = Some(outcomes);
        session.tasks = tasks;

        info!(generation, format = %preview.format(), "Scan pipeline bound");
        Ok(preview)
    }

    /// Detach everything and suppress outcomes still in flight
    ///
    /// No callback runs once this returns. Idempotent.
    pub fn stop(&self) {
        self.inner.dispatcher.revoke();
        let mut session = lock_or_recover(&self.inner.session);
        self.inner.teardown(&mut session);
    }

    /// Capture a still and report recognized text through the capture slots
    ///
    /// Returns as soon as the capture is scheduled.
    pub fn capture_still(&self) -> PipelineResult<()> {
        let mut session = lock_or_recover(&self.inner.session);
        let (PipelineState::Bound, Some(outcomes)) = (session.state, session.outcomes.clone())
        else {
            return Err(PipelineError::NotBound);
        };
        let generation = session.generation;

        let source = Arc::clone(&self.inner.source);
        let recognizer = Arc::clone(&self.inner.recognizer);
        let request = self.inner.capture_request();

        let task = tokio::spawn(async move {
            let (slot, outcome) = match capture_and_recognize(&source, &*recognizer, request).await
            {
                Ok(text) => (
                    CallbackSlot::CaptureSuccess,
                    RecognitionOutcome::RecognizedText(text),
                ),
                Err(e) => {
                    warn!(error = %e, "Still capture failed");
                    (
                        CallbackSlot::CaptureError,
                        RecognitionOutcome::Failure(e.callback_message()),
                    )
                }
            };
            send(&outcomes, generation, slot, outcome);
        });

        session.tasks.retain(|task| !task.is_finished());
        session.tasks.push(task);
        Ok(())
    }

    /// Capture a still and recognize it, returning the text to the caller
    ///
    /// Bypasses the callback table.
    pub async fn recognize_still(&self) -> PipelineResult<String> {
        if self.state() != PipelineState::Bound {
            return Err(PipelineError::NotBound);
        }
        let request = self.inner.capture_request();
        capture_and_recognize(&self.inner.source, &*self.inner.recognizer, request).await
    }

    /// Install `callback` in its slot, replacing the previous handler
    pub fn set_callback(&self, callback: Callback) -> &Self {
        self.inner.dispatcher.callbacks().register(callback);
        self
    }

    pub fn callbacks(&self) -> &CallbackSet {
        self.inner.dispatcher.callbacks()
    }

    pub fn state(&self) -> PipelineState {
        lock_or_recover(&self.inner.session).state
    }

    pub fn frame_stats(&self) -> FrameStats {
        let session = lock_or_recover(&self.inner.session);
        let current = session.slot.as_ref().map_or(0, |slot| slot.superseded());
        let ledger = self.inner.source.ledger();
        FrameStats {
            acquired: ledger.acquired(),
            released: ledger.released(),
            superseded: session.retired_superseded + current,
        }
    }
}

impl Drop for ScanPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn capture_request(&self) -> CaptureRequest {
        CaptureRequest::new(self.settings.output_dir.clone(), self.settings.format)
    }

    /// Unbind the current session, if any
    ///
    /// The dispatcher must already be revoked.
    fn teardown(&self, session: &mut Session) {
        if session.state != PipelineState::Bound {
            return;
        }

        session.outcomes = None;
        for task in session.tasks.drain(..) {
            task.abort();
        }
        if let Some(slot) = session.slot.take() {
            slot.close();
            session.retired_superseded += slot.superseded();
        }
        self.source.unbind_all();

        session.state = PipelineState::Unbound;
        info!(generation = session.generation, "Scan pipeline unbound");
    }

    /// Unbind the session of `generation` when its lifecycle ends
    fn end_generation(&self, generation: u64) {
        if !self.dispatcher.revoke_generation(generation) {
            debug!(generation, "Lifecycle ended for a replaced session");
            return;
        }
        let mut session = lock_or_recover(&self.session);
        if session.generation == generation {
            self.teardown(&mut session);
        }
    }
}

fn send(
    outcomes: &mpsc::UnboundedSender<Dispatch>,
    generation: u64,
    slot: CallbackSlot,
    outcome: RecognitionOutcome,
) {
    let dispatch = Dispatch {
        generation,
        slot,
        outcome,
    };
    if outcomes.send(dispatch).is_err() {
        debug!(generation, %slot, "Pipeline unbound, outcome discarded");
    }
}

/// Persist one still, then recognize text on the stored image
async fn capture_and_recognize(
    source: &FrameSource,
    recognizer: &dyn TextRecognizer,
    request: CaptureRequest,
) -> PipelineResult<String> {
    let stored = source.capture_still(request).await?;
    debug!(path = %stored.path.display(), "Still stored, recognizing text");

    let recognized = recognizer.recognize(&stored).await?;
    info!(
        path = %stored.path.display(),
        blocks = recognized.blocks().len(),
        "Text recognized"
    );
    Ok(recognized.text())
}

async fn run_dispatcher(dispatcher: Arc<Dispatcher>, mut receiver: mpsc::UnboundedReceiver<Dispatch>) {
    while let Some(dispatch) = receiver.recv().await {
        dispatcher.deliver(dispatch);
    }
}

async fn run_barcode_worker(
    generation: u64,
    slot: Arc<LatestFrameSlot>,
    analyzer: BarcodeAnalyzer,
    outcomes: mpsc::UnboundedSender<Dispatch>,
    failure_message: String,
) {
    while let Some(frame) = slot.next().await {
        let sequence = frame.sequence;
        match analyzer.analyze(frame).await {
            Ok(detections) => {
                for detection in detections {
                    let kind = detection.payload.kind();
                    match detection.payload.classify() {
                        Some(payload) => send(
                            &outcomes,
                            generation,
                            CallbackSlot::BarcodeSuccess,
                            RecognitionOutcome::DecodedBarcode { kind, payload },
                        ),
                        None => debug!(sequence, %kind, "Ignoring unclassified barcode"),
                    }
                }
            }
            Err(e) => {
                debug!(sequence, error = %e, "Barcode decode failed");
                send(
                    &outcomes,
                    generation,
                    CallbackSlot::BarcodeError,
                    RecognitionOutcome::Failure(failure_message.clone()),
                );
            }
        }
    }
    debug!(generation, "Barcode worker finished");
}

async fn watch_lifecycle(generation: u64, lifecycle: HostLifecycle, pipeline: Weak<Inner>) {
    lifecycle.ended().await;
    let Some(inner) = pipeline.upgrade() else {
        return;
    };
    info!(generation, "Host lifecycle ended, unbinding");
    // Unbinding joins the capture thread
    tokio::task::spawn_blocking(move || inner.end_generation(generation));
}
