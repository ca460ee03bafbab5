// SPDX-License-Identifier: GPL-3.0-only

//! Generation-gated delivery of outcomes to the callback table
//!
//! Every binding of the pipeline gets a generation number. Outcomes are
//! tagged with the generation that produced them and delivered only while
//! that generation is still active. Revoking waits for a delivery that is
//! already running, so once `revoke` returns no handler is called for the
//! revoked generation.

use super::callbacks::{CallbackSet, CallbackSlot};
use super::outcome::RecognitionOutcome;
use crate::errors::lock_or_recover;
use std::cell::Cell;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// No generation is active
pub(crate) const INACTIVE: u64 = 0;

thread_local! {
    static IN_HANDLER: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as running a handler until dropped
struct HandlerScope;

impl HandlerScope {
    fn enter() -> Self {
        IN_HANDLER.with(|flag| flag.set(true));
        HandlerScope
    }
}

impl Drop for HandlerScope {
    fn drop(&mut self) {
        IN_HANDLER.with(|flag| flag.set(false));
    }
}

/// Outcome on its way to a callback slot
#[derive(Debug)]
pub(crate) struct Dispatch {
    pub generation: u64,
    pub slot: CallbackSlot,
    pub outcome: RecognitionOutcome,
}

#[derive(Debug, Default)]
pub(crate) struct Dispatcher {
    callbacks: CallbackSet,
    active: AtomicU64,
    delivering: Mutex<()>,
}

impl Dispatcher {
    pub fn callbacks(&self) -> &CallbackSet {
        &self.callbacks
    }

    pub fn activate(&self, generation: u64) {
        self.active.store(generation, Ordering::SeqCst);
    }

    /// Stop delivering for every generation
    ///
    /// Called from inside a handler this only closes the gate; the running
    /// handler is the caller itself.
    pub fn revoke(&self) {
        self.active.store(INACTIVE, Ordering::SeqCst);
        if !IN_HANDLER.with(Cell::get) {
            drop(lock_or_recover(&self.delivering));
        }
    }

    /// Stop delivering for `generation` only, if it is still the active one
    pub fn revoke_generation(&self, generation: u64) -> bool {
        let revoked = self
            .active
            .compare_exchange(generation, INACTIVE, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if revoked && !IN_HANDLER.with(Cell::get) {
            drop(lock_or_recover(&self.delivering));
        }
        revoked
    }

    /// Deliver `dispatch` if its generation is still active
    ///
    /// Returns whether a handler was called.
    pub fn deliver(&self, dispatch: Dispatch) -> bool {
        let _delivering = lock_or_recover(&self.delivering);
        if self.active.load(Ordering::SeqCst) != dispatch.generation {
            debug!(
                slot = %dispatch.slot,
                outcome = %dispatch.outcome,
                "Discarding outcome from an unbound session"
            );
            return false;
        }

        trace!(slot = %dispatch.slot, outcome = %dispatch.outcome, "Delivering outcome");
        let delivered = {
            let _scope = HandlerScope::enter();
            self.callbacks
                .invoke(dispatch.slot, dispatch.outcome.into_message())
        };

        if !delivered {
            debug!(slot = %dispatch.slot, "No handler registered, outcome dropped");
        }
        delivered
    }
}
