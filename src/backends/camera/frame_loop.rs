// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for the live frame loop
//!
//! Camera backends block while waiting for the next frame, so the live feed
//! is pulled on a dedicated thread. The controller owns that thread: it can
//! be asked to stop, and stopping joins so no frame is produced afterwards.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Action returned by the loop body to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a capture loop running in a separate thread
pub struct CaptureLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    iterations: Arc<AtomicU64>,
    name: String,
}

impl CaptureLoopController {
    /// Start a new capture loop in a separate thread
    ///
    /// `body` runs repeatedly until it returns [`LoopAction::Stop`] or
    /// [`stop`](Self::stop) is called. The stop signal is checked between
    /// iterations, so one iteration should not block for long.
    pub fn start<F>(name: &str, mut body: F) -> std::io::Result<Self>
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let iterations = Arc::new(AtomicU64::new(0));
        let thread_stop = Arc::clone(&stop_signal);
        let thread_iterations = Arc::clone(&iterations);
        let thread_name = name.to_string();

        info!(name = %name, "Starting capture loop");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %thread_name, "Capture loop thread started");

                while !thread_stop.load(Ordering::SeqCst) {
                    thread_iterations.fetch_add(1, Ordering::Relaxed);
                    if body() == LoopAction::Stop {
                        debug!(name = %thread_name, "Loop requested stop");
                        break;
                    }
                }

                info!(name = %thread_name, "Capture loop thread exiting");
            })?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            iterations,
            name: name.to_string(),
        })
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Number of loop iterations executed so far
    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Signal the loop to stop without waiting for it
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the loop to end on its own, without signalling it
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for capture loop thread to finish");
            if handle.join().is_err() {
                warn!(name = %self.name, "Capture loop thread panicked");
            } else {
                debug!(name = %self.name, "Capture loop thread finished");
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoopController dropped, stopping loop");
            self.stop();
        }
    }
}
