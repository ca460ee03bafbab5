// SPDX-License-Identifier: GPL-3.0-only

//! Async barcode analysis over owned frames

use super::BarcodeScanner;
use crate::backends::camera::types::Frame;
use crate::errors::DecodeError;
use crate::frame_processor::types::BarcodeDetection;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{trace, warn};

/// Runs a [`BarcodeScanner`] off the async executor
///
/// The analyzer takes ownership of each frame and drops it on the worker as
/// soon as scanning finishes, so the frame is released before the result is
/// returned. If the awaiting task is cancelled the worker still runs to
/// completion and releases the frame.
///
/// Clones share one analysis permit, so at most one frame is being scanned
/// at a time even when an abandoned worker is still finishing.
#[derive(Clone)]
pub struct BarcodeAnalyzer {
    scanner: Arc<dyn BarcodeScanner>,
    permit: Arc<Semaphore>,
}

impl BarcodeAnalyzer {
    pub fn new(scanner: Arc<dyn BarcodeScanner>) -> Self {
        Self {
            scanner,
            permit: Arc::new(Semaphore::new(1)),
        }
    }

    /// Decode every symbol in `frame`
    ///
    /// Waits for any scan still running on this analyzer to finish first.
    pub async fn analyze(&self, frame: Frame) -> Result<Vec<BarcodeDetection>, DecodeError> {
        let scanner = Arc::clone(&self.scanner);
        let sequence = frame.sequence;
        let permit = Arc::clone(&self.permit)
            .acquire_owned()
            .await
            .map_err(|e| DecodeError::Aborted(e.to_string()))?;

        tokio::task::spawn_blocking(move || {
            let result = scanner.scan(&frame);
            drop(frame);
            drop(permit);
            trace!(sequence, "Frame analyzed");
            result
        })
        .await
        .map_err(|e| {
            warn!(sequence, error = %e, "Barcode scan task failed");
            DecodeError::Aborted(e.to_string())
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::{FrameLedger, RawFrame};
    use crate::frame_processor::types::FrameRegion;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct EchoScanner;

    impl BarcodeScanner for EchoScanner {
        fn scan(&self, frame: &Frame) -> Result<Vec<BarcodeDetection>, DecodeError> {
            let content = String::from_utf8_lossy(&frame.data).to_string();
            if content == "FAIL" {
                return Err(DecodeError::Undecodable("checksum".into()));
            }
            Ok(vec![BarcodeDetection::new(
                FrameRegion::from_pixels(0, 0, 1, 1, 1, 1),
                content,
            )])
        }
    }

    fn frame(content: &str, ledger: &Arc<FrameLedger>) -> Frame {
        let raw = RawFrame::rgba(1, 1, content.as_bytes().to_vec());
        Frame::leased(raw, 1, ledger)
    }

    #[tokio::test]
    async fn test_frame_released_after_success() {
        let ledger = FrameLedger::new();
        let analyzer = BarcodeAnalyzer::new(Arc::new(EchoScanner));

        let detections = analyzer.analyze(frame("https://example.com", &ledger)).await.unwrap();

        assert_eq!(detections[0].content, "https://example.com");
        assert_eq!(ledger.released(), 1);
    }

    #[tokio::test]
    async fn test_frame_released_after_failure() {
        let ledger = FrameLedger::new();
        let analyzer = BarcodeAnalyzer::new(Arc::new(EchoScanner));

        let result = analyzer.analyze(frame("FAIL", &ledger)).await;

        assert!(matches!(result, Err(DecodeError::Undecodable(_))));
        assert_eq!(ledger.acquired(), 1);
        assert_eq!(ledger.released(), 1);
    }

    #[derive(Default)]
    struct CountingScanner {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl BarcodeScanner for CountingScanner {
        fn scan(&self, _frame: &Frame) -> Result<Vec<BarcodeDetection>, DecodeError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(100));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abandoned_scan_blocks_next_analysis() {
        let ledger = FrameLedger::new();
        let scanner = Arc::new(CountingScanner::default());
        let analyzer = BarcodeAnalyzer::new(Arc::clone(&scanner) as Arc<dyn BarcodeScanner>);

        let abandoned = {
            let analyzer = analyzer.clone();
            let frame = frame("first", &ledger);
            tokio::spawn(async move { analyzer.analyze(frame).await })
        };
        while scanner.in_flight.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        abandoned.abort();

        analyzer.analyze(frame("second", &ledger)).await.unwrap();

        assert_eq!(scanner.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.outstanding(), 0);
    }
}
