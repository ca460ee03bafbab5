// SPDX-License-Identifier: GPL-3.0-only

use crate::frame_processor::types::BarcodeKind;
use std::fmt;

/// Result of one analysis, as delivered to a callback slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionOutcome {
    /// Text recognized on a stored still
    RecognizedText(String),
    /// Classified barcode with its formatted payload
    DecodedBarcode { kind: BarcodeKind, payload: String },
    /// Capture, recognition or decode failure
    Failure(String),
}

impl RecognitionOutcome {
    /// The string handed to the callback
    pub fn into_message(self) -> String {
        match self {
            RecognitionOutcome::RecognizedText(text) => text,
            RecognitionOutcome::DecodedBarcode { payload, .. } => payload,
            RecognitionOutcome::Failure(reason) => reason,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RecognitionOutcome::Failure(_))
    }
}

impl fmt::Display for RecognitionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognitionOutcome::RecognizedText(text) => write!(f, "text ({} chars)", text.len()),
            RecognitionOutcome::DecodedBarcode { kind, .. } => write!(f, "{} barcode", kind),
            RecognitionOutcome::Failure(reason) => write!(f, "failure: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_payload_only() {
        let outcome = RecognitionOutcome::DecodedBarcode {
            kind: BarcodeKind::Url,
            payload: "https://example.com".into(),
        };
        assert!(!outcome.is_failure());
        assert_eq!(outcome.into_message(), "https://example.com");
    }

    #[test]
    fn test_failure_carries_reason() {
        let outcome = RecognitionOutcome::Failure("Barcode scan failed.".into());
        assert!(outcome.is_failure());
        assert_eq!(outcome.into_message(), "Barcode scan failed.");
    }
}
