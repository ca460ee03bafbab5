// SPDX-License-Identifier: GPL-3.0-only

//! Host lifecycle handle
//!
//! The host (a screen, a terminal session) owns start/stop timing. A pipeline
//! started against a lifecycle unbinds itself when that lifecycle ends.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Active,
    Ended,
}

/// Cloneable handle to one host lifecycle
#[derive(Debug, Clone)]
pub struct HostLifecycle {
    state: Arc<watch::Sender<LifecycleState>>,
}

impl HostLifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Active);
        Self {
            state: Arc::new(state),
        }
    }

    /// End the lifecycle. Idempotent.
    pub fn end(&self) {
        self.state.send_replace(LifecycleState::Ended);
    }

    pub fn is_ended(&self) -> bool {
        *self.state.borrow() == LifecycleState::Ended
    }

    /// Resolve once the lifecycle has ended
    pub async fn ended(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as self, so this only fails if it is dropped
        let _ = rx.wait_for(|state| *state == LifecycleState::Ended).await;
    }
}

impl Default for HostLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
