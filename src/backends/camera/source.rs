// SPDX-License-Identifier: GPL-3.0-only

//! Frame source: binds a camera backend to one frame consumer
//!
//! Binding opens the device and starts the capture thread. Every live frame
//! is numbered, published to the preview surface and then handed, leased, to
//! the bound [`FrameSink`]. Binding again first unbinds, so at most one
//! consumer is ever attached.

use super::CameraBackend;
use super::frame_loop::{CaptureLoopController, LoopAction};
use super::types::*;
use crate::backends::shutter::{ShutterCue, SilentShutter};
use crate::constants::timing;
use crate::errors::{CaptureError, lock_or_recover};
use crate::pipelines::photo::{CaptureRequest, PhotoPipeline, StoredImage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Pause after a transient backend error before polling again
const ERROR_BACKOFF: Duration = Duration::from_millis(10);

struct Binding {
    capture_loop: CaptureLoopController,
    format: CameraFormat,
}

/// Owns a camera backend and feeds its frames to a single consumer
pub struct FrameSource {
    backend: Arc<Mutex<Box<dyn CameraBackend>>>,
    shutter: Arc<dyn ShutterCue>,
    photos: PhotoPipeline,
    ledger: Arc<FrameLedger>,
    sequence: Arc<AtomicU64>,
    binding: Mutex<Option<Binding>>,
}

impl FrameSource {
    pub fn new(backend: Box<dyn CameraBackend>) -> Self {
        Self {
            backend: Arc::new(Mutex::new(backend)),
            shutter: Arc::new(SilentShutter),
            photos: PhotoPipeline::default(),
            ledger: FrameLedger::new(),
            sequence: Arc::new(AtomicU64::new(0)),
            binding: Mutex::new(None),
        }
    }

    /// Play `shutter` before every still capture
    pub fn with_shutter(mut self, shutter: Box<dyn ShutterCue>) -> Self {
        self.shutter = Arc::from(shutter);
        self
    }

    /// Encode and store stills with `photos`
    pub fn with_photo_pipeline(mut self, photos: PhotoPipeline) -> Self {
        self.photos = photos;
        self
    }

    /// Attach `sink` to the live feed and return the preview target
    ///
    /// Any existing binding is torn down first.
    pub fn bind(&self, sink: Arc<dyn FrameSink>) -> BackendResult<PreviewSurface> {
        self.unbind_all();

        let format = lock_or_recover(&self.backend).open()?;
        let (preview_tx, preview_rx) = watch::channel(None);

        let backend = Arc::clone(&self.backend);
        let ledger = Arc::clone(&self.ledger);
        let sequence = Arc::clone(&self.sequence);

        let capture_loop = CaptureLoopController::start("camera-frames", move || {
            let next = lock_or_recover(&backend).next_frame();
            match next {
                Ok(Some(raw)) => {
                    let seq = sequence.fetch_add(1, Ordering::SeqCst) + 1;
                    preview_tx.send_replace(Some(PreviewFrame::from_raw(&raw, seq)));
                    sink.offer(Frame::leased(raw, seq, &ledger));

                    if seq % timing::FRAME_LOG_INTERVAL == 0 {
                        debug!(
                            sequence = seq,
                            outstanding = ledger.outstanding(),
                            "Live frames flowing"
                        );
                    }
                    LoopAction::Continue
                }
                Ok(None) => LoopAction::Continue,
                Err(BackendError::Disconnected(msg)) => {
                    error!(error = %msg, "Camera disconnected, stopping live feed");
                    LoopAction::Stop
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read frame");
                    std::thread::sleep(ERROR_BACKOFF);
                    LoopAction::Continue
                }
            }
        });

        let capture_loop = match capture_loop {
            Ok(controller) => controller,
            Err(e) => {
                lock_or_recover(&self.backend).close();
                return Err(BackendError::InitializationFailed(format!(
                    "Failed to spawn capture thread: {}",
                    e
                )));
            }
        };

        info!(
            backend = %lock_or_recover(&self.backend).describe(),
            format = %format,
            "Frame source bound"
        );

        *lock_or_recover(&self.binding) = Some(Binding {
            capture_loop,
            format,
        });

        Ok(PreviewSurface::new(format, preview_rx))
    }

    /// Detach the consumer, stop the live feed and close the device
    ///
    /// Returns once the capture thread has exited, so no frame is offered
    /// after this call. Idempotent.
    pub fn unbind_all(&self) {
        let binding = lock_or_recover(&self.binding).take();
        let Some(mut binding) = binding else {
            return;
        };

        binding.capture_loop.stop();
        lock_or_recover(&self.backend).close();
        info!(
            frames = binding.capture_loop.iterations(),
            outstanding = self.ledger.outstanding(),
            "Frame source unbound"
        );
    }

    pub fn is_bound(&self) -> bool {
        lock_or_recover(&self.binding).is_some()
    }

    /// Format negotiated by the current binding
    pub fn current_format(&self) -> Option<CameraFormat> {
        lock_or_recover(&self.binding).as_ref().map(|b| b.format)
    }

    /// Accounting of live frames handed out by this source
    pub fn ledger(&self) -> &Arc<FrameLedger> {
        &self.ledger
    }

    /// Capture one still image and store it durably
    ///
    /// Plays the shutter cue first; a failing cue is logged and ignored.
    pub async fn capture_still(&self, request: CaptureRequest) -> Result<StoredImage, CaptureError> {
        if !self.is_bound() {
            return Err(CaptureError::NotBound);
        }

        if let Err(e) = self.shutter.play() {
            warn!(error = %e, "Shutter cue failed");
        }

        let backend = Arc::clone(&self.backend);
        let raw = tokio::task::spawn_blocking(move || lock_or_recover(&backend).capture_still())
            .await
            .map_err(|e| CaptureError::Device(format!("Capture task error: {}", e)))?
            .map_err(|e| CaptureError::Device(e.to_string()))?;

        debug!(
            width = raw.width,
            height = raw.height,
            format = ?raw.format,
            "Still frame captured"
        );

        self.photos.store(raw, request).await
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.unbind_all();
    }
}
