// SPDX-License-Identifier: GPL-3.0-only

//! Latest-only frame hand-off between the capture thread and the analyzer
//!
//! The slot holds at most one pending frame. A newer frame replaces a pending
//! one, and the replaced frame is dropped (and so released) right away. The
//! analyzer takes the pending frame when it is ready for more work, so at
//! most one frame is under analysis and at most one is waiting.

use crate::backends::camera::types::{Frame, FrameSink};
use crate::errors::lock_or_recover;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::trace;

#[derive(Debug, Default)]
pub struct LatestFrameSlot {
    pending: Mutex<Option<Frame>>,
    ready: Notify,
    closed: AtomicBool,
    offered: AtomicU64,
    superseded: AtomicU64,
}

impl LatestFrameSlot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store `frame` as the pending frame, dropping whatever it replaces
    pub fn offer_frame(&self, frame: Frame) {
        self.offered.fetch_add(1, Ordering::Relaxed);

        let replaced = {
            let mut pending = lock_or_recover(&self.pending);
            // Checked under the lock so a frame never lands after close emptied the slot
            if self.closed.load(Ordering::SeqCst) {
                drop(pending);
                self.superseded.fetch_add(1, Ordering::Relaxed);
                trace!(sequence = frame.sequence, "Slot closed, dropping frame");
                return;
            }
            pending.replace(frame)
        };
        if let Some(old) = replaced {
            self.superseded.fetch_add(1, Ordering::Relaxed);
            trace!(sequence = old.sequence, "Frame superseded before analysis");
            // Released here, outside the lock
            drop(old);
        }

        self.ready.notify_one();
    }

    /// Wait for the next pending frame
    ///
    /// Returns `None` once the slot is closed.
    pub async fn next(&self) -> Option<Frame> {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(frame) = lock_or_recover(&self.pending).take() {
                return Some(frame);
            }
            self.ready.notified().await;
        }
    }

    /// Reject further frames and release the pending one
    pub fn close(&self) {
        let pending = {
            let mut pending = lock_or_recover(&self.pending);
            self.closed.store(true, Ordering::SeqCst);
            pending.take()
        };
        if pending.is_some() {
            self.superseded.fetch_add(1, Ordering::Relaxed);
        }
        drop(pending);
        self.ready.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Frames offered so far
    pub fn offered(&self) -> u64 {
        self.offered.load(Ordering::Relaxed)
    }

    /// Frames dropped without analysis
    pub fn superseded(&self) -> u64 {
        self.superseded.load(Ordering::Relaxed)
    }
}

impl FrameSink for LatestFrameSlot {
    fn offer(&self, frame: Frame) {
        self.offer_frame(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::{FrameLedger, RawFrame};
    use std::time::Duration;

    fn frame(sequence: u64, ledger: &Arc<FrameLedger>) -> Frame {
        Frame::leased(RawFrame::rgba(1, 1, vec![0; 4]), sequence, ledger)
    }

    #[tokio::test]
    async fn test_newest_frame_supersedes_pending() {
        let ledger = FrameLedger::new();
        let slot = LatestFrameSlot::new();

        for seq in 1..=5 {
            slot.offer_frame(frame(seq, &ledger));
        }

        let next = slot.next().await.unwrap();
        assert_eq!(next.sequence, 5);
        assert_eq!(slot.superseded(), 4);
        assert_eq!(ledger.released(), 4);

        drop(next);
        assert_eq!(ledger.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_offer() {
        let ledger = FrameLedger::new();
        let slot = LatestFrameSlot::new();

        let waiter = {
            let slot = Arc::clone(&slot);
            tokio::spawn(async move { slot.next().await.map(|f| f.sequence) })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        slot.offer_frame(frame(9, &ledger));

        let seq = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seq, Some(9));
    }

    #[tokio::test]
    async fn test_close_releases_pending_and_wakes_waiter() {
        let ledger = FrameLedger::new();
        let slot = LatestFrameSlot::new();
        slot.offer_frame(frame(1, &ledger));

        slot.close();
        assert_eq!(ledger.released(), 1);
        assert!(slot.next().await.is_none());

        // Frames arriving after close are released immediately
        slot.offer_frame(frame(2, &ledger));
        assert_eq!(ledger.acquired(), 2);
        assert_eq!(ledger.released(), 2);
    }

    #[test]
    fn test_offer_racing_close_never_strands_a_frame() {
        for _ in 0..200 {
            let ledger = FrameLedger::new();
            let slot = LatestFrameSlot::new();

            let producer = {
                let slot = Arc::clone(&slot);
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for seq in 1..=20 {
                        slot.offer_frame(frame(seq, &ledger));
                    }
                })
            };
            slot.close();
            producer.join().unwrap();

            // Everything offered is released while the slot is still alive
            assert_eq!(ledger.outstanding(), 0);
            assert_eq!(slot.superseded(), 20);
        }
    }
}
