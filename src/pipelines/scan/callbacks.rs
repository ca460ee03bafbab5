// SPDX-License-Identifier: GPL-3.0-only

//! Four-slot handler table for pipeline outcomes
//!
//! Each slot holds at most one handler. Setting a slot swaps the handler
//! atomically; an outcome that resolves afterwards reaches only the new one.

use crate::errors::lock_or_recover;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Single-argument outcome handler
pub type Handler = Arc<dyn Fn(String) + Send + Sync>;

/// Outcome channel a handler is registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackSlot {
    CaptureSuccess,
    CaptureError,
    BarcodeSuccess,
    BarcodeError,
}

impl CallbackSlot {
    pub const ALL: [CallbackSlot; 4] = [
        CallbackSlot::CaptureSuccess,
        CallbackSlot::CaptureError,
        CallbackSlot::BarcodeSuccess,
        CallbackSlot::BarcodeError,
    ];

    fn index(self) -> usize {
        match self {
            CallbackSlot::CaptureSuccess => 0,
            CallbackSlot::CaptureError => 1,
            CallbackSlot::BarcodeSuccess => 2,
            CallbackSlot::BarcodeError => 3,
        }
    }
}

impl fmt::Display for CallbackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallbackSlot::CaptureSuccess => "capture-success",
            CallbackSlot::CaptureError => "capture-error",
            CallbackSlot::BarcodeSuccess => "barcode-success",
            CallbackSlot::BarcodeError => "barcode-error",
        };
        f.write_str(name)
    }
}

/// A handler tagged with the slot it belongs to
pub enum Callback {
    OnCaptureSuccess(Handler),
    OnCaptureError(Handler),
    OnBarcodeSuccess(Handler),
    OnBarcodeError(Handler),
}

impl Callback {
    pub fn slot(&self) -> CallbackSlot {
        match self {
            Callback::OnCaptureSuccess(_) => CallbackSlot::CaptureSuccess,
            Callback::OnCaptureError(_) => CallbackSlot::CaptureError,
            Callback::OnBarcodeSuccess(_) => CallbackSlot::BarcodeSuccess,
            Callback::OnBarcodeError(_) => CallbackSlot::BarcodeError,
        }
    }

    fn into_handler(self) -> Handler {
        match self {
            Callback::OnCaptureSuccess(h)
            | Callback::OnCaptureError(h)
            | Callback::OnBarcodeSuccess(h)
            | Callback::OnBarcodeError(h) => h,
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({})", self.slot())
    }
}

/// Handler table owned by one pipeline
#[derive(Default)]
pub struct CallbackSet {
    slots: [Mutex<Option<Handler>>; 4],
}

impl CallbackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` for `slot`, returning the handler it replaced
    pub fn set<F>(&self, slot: CallbackSlot, handler: F) -> Option<Handler>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.set_handler(slot, Arc::new(handler))
    }

    /// Install an already shared handler
    pub fn set_handler(&self, slot: CallbackSlot, handler: Handler) -> Option<Handler> {
        lock_or_recover(&self.slots[slot.index()]).replace(handler)
    }

    /// Install a tagged callback into its own slot
    pub fn register(&self, callback: Callback) -> Option<Handler> {
        let slot = callback.slot();
        self.set_handler(slot, callback.into_handler())
    }

    pub fn on_capture_success<F>(&self, handler: F) -> Option<Handler>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.set(CallbackSlot::CaptureSuccess, handler)
    }

    pub fn on_capture_error<F>(&self, handler: F) -> Option<Handler>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.set(CallbackSlot::CaptureError, handler)
    }

    pub fn on_barcode_success<F>(&self, handler: F) -> Option<Handler>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.set(CallbackSlot::BarcodeSuccess, handler)
    }

    pub fn on_barcode_error<F>(&self, handler: F) -> Option<Handler>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.set(CallbackSlot::BarcodeError, handler)
    }

    /// Remove the handler for `slot`
    pub fn clear(&self, slot: CallbackSlot) -> Option<Handler> {
        lock_or_recover(&self.slots[slot.index()]).take()
    }

    /// Current handler for `slot`
    pub fn handler(&self, slot: CallbackSlot) -> Option<Handler> {
        lock_or_recover(&self.slots[slot.index()]).clone()
    }

    pub fn is_set(&self, slot: CallbackSlot) -> bool {
        lock_or_recover(&self.slots[slot.index()]).is_some()
    }

    /// Call the handler for `slot` with `message`
    ///
    /// The handler is called without holding the slot lock, so it may
    /// replace itself. Returns whether a handler was present.
    pub fn invoke(&self, slot: CallbackSlot, message: String) -> bool {
        match self.handler(slot) {
            Some(handler) => {
                handler(message);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for CallbackSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_map();
        for slot in CallbackSlot::ALL {
            list.entry(&slot, &self.is_set(slot));
        }
        list.finish()
    }
}
