// SPDX-License-Identifier: GPL-3.0-only

//! Text recognition over stored stills
//!
//! Recognition runs on a file that has already been written durably. The
//! default engine is the `tesseract` command line tool, driven through
//! `tokio::process` so the executor is never blocked.

use crate::errors::RecognitionError;
use crate::pipelines::photo::StoredImage;
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Text recognized in one image
///
/// Only block texts are kept, in reading order. Layout detail such as line
/// geometry is not part of the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognizedText {
    blocks: Vec<String>,
}

impl RecognizedText {
    pub fn from_blocks(blocks: Vec<String>) -> Self {
        Self {
            blocks: blocks.into_iter().filter(|b| !b.trim().is_empty()).collect(),
        }
    }

    /// Split plain engine output into blocks at blank lines
    pub fn from_plain_text(output: &str) -> Self {
        let mut blocks = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        // Tesseract ends every page with a form feed
        for line in output.split('\n').map(|l| l.trim_end_matches(['\r', '\x0c'])) {
            if line.trim().is_empty() {
                if !current.is_empty() {
                    blocks.push(current.join("\n"));
                    current.clear();
                }
            } else {
                current.push(line);
            }
        }
        if !current.is_empty() {
            blocks.push(current.join("\n"));
        }

        Self { blocks }
    }

    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    /// Full text, blocks joined with newlines
    pub fn text(&self) -> String {
        self.blocks.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Asynchronous text recognition engine
pub trait TextRecognizer: Send + Sync {
    fn recognize<'a>(
        &'a self,
        image: &'a StoredImage,
    ) -> BoxFuture<'a, Result<RecognizedText, RecognitionError>>;
}

/// Runs `tesseract <image> stdout -l <languages>`
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: PathBuf,
    languages: String,
    timeout: Duration,
}

impl TesseractRecognizer {
    pub fn new(binary: impl Into<PathBuf>, languages: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            languages: languages.into(),
            timeout,
        }
    }

    async fn run(&self, image: &StoredImage) -> Result<RecognizedText, RecognitionError> {
        tokio::fs::metadata(&image.path).await.map_err(|e| {
            RecognitionError::ImageUnavailable(format!("{}: {}", image.path.display(), e))
        })?;

        info!(
            path = %image.path.display(),
            languages = %self.languages,
            "Starting text recognition"
        );
        let start = std::time::Instant::now();

        let mut command = Command::new(&self.binary);
        command
            .arg(&image.path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                warn!(timeout_secs = self.timeout.as_secs(), "Text recognition timed out");
                RecognitionError::Timeout(self.timeout)
            })?
            .map_err(|e| {
                RecognitionError::Engine(format!(
                    "failed to run {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let diagnostic = if stderr.is_empty() {
                format!("{} exited with {}", self.binary.display(), output.status)
            } else {
                stderr
            };
            return Err(RecognitionError::Engine(diagnostic));
        }

        let text = RecognizedText::from_plain_text(&String::from_utf8_lossy(&output.stdout));
        debug!(
            blocks = text.blocks().len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Text recognition complete"
        );
        Ok(text)
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize<'a>(
        &'a self,
        image: &'a StoredImage,
    ) -> BoxFuture<'a, Result<RecognizedText, RecognitionError>> {
        Box::pin(self.run(image))
    }
}
