// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for scanning and recognition
//!
//! This module provides command-line functionality for:
//! - Running the live scan pipeline
//! - Capturing and recognizing a single still
//! - Decoding barcodes and recognizing text in image files

use card_scanner::backends::camera::{Frame, get_backend};
use card_scanner::backends::virtual_camera::load_image_as_frame;
use card_scanner::frame_processor::{
    BarcodeAnalyzer, QrDetector, TesseractRecognizer, TextRecognizer,
};
use card_scanner::pipelines::scan::{Callback, HostLifecycle, ScanPipeline};
use card_scanner::{Config, storage};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Camera selection shared by the live commands
pub struct SourceArgs {
    pub device: Option<String>,
    pub images: Vec<PathBuf>,
}

impl SourceArgs {
    fn pipeline(&self, config: &Config) -> Result<ScanPipeline, Box<dyn std::error::Error>> {
        let mut config = config.clone();
        if let Some(device) = &self.device {
            config.device_path = device.clone();
        }
        let backend = get_backend(&config, &self.images)?;
        println!("Using camera: {}", backend.describe());
        Ok(ScanPipeline::from_config(&config, backend))
    }
}

/// Run the live pipeline until Ctrl+C or end of input
///
/// Every line read from stdin triggers a still capture.
pub async fn scan(config: &Config, source: SourceArgs) -> CliResult {
    let pipeline = source.pipeline(config)?;
    pipeline
        .set_callback(Callback::OnCaptureSuccess(Arc::new(|text| {
            println!("[text]\n{}", text);
        })))
        .set_callback(Callback::OnCaptureError(Arc::new(|reason| {
            eprintln!("[capture error] {}", reason);
        })))
        .set_callback(Callback::OnBarcodeSuccess(Arc::new(|payload| {
            println!("[barcode]\n{}", payload);
        })))
        .set_callback(Callback::OnBarcodeError(Arc::new(|message| {
            eprintln!("[barcode error] {}", message);
        })));

    let lifecycle = HostLifecycle::new();
    {
        let lifecycle = lifecycle.clone();
        ctrlc::set_handler(move || lifecycle.end())?;
    }

    let preview = pipeline.start(&lifecycle)?;
    let format = preview.format();
    println!("Scanning at {}. Press Enter to capture, Ctrl+C to quit.", format);

    let (line_tx, mut line_rx) = mpsc::channel::<()>(4);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            if line.is_err() || line_tx.blocking_send(()).is_err() {
                break;
            }
        }
    });

    let mut input_open = true;
    loop {
        tokio::select! {
            _ = lifecycle.ended() => break,
            line = line_rx.recv(), if input_open => match line {
                Some(()) => {
                    if let Err(e) = pipeline.capture_still() {
                        eprintln!("Capture not started: {}", e);
                    }
                }
                None => input_open = false,
            },
        }
    }

    pipeline.stop();
    let stats = pipeline.frame_stats();
    println!(
        "Stopped. Frames: {} received, {} skipped",
        stats.acquired, stats.superseded
    );
    Ok(())
}

/// Capture one still, recognize it and print the text
pub async fn capture(config: &Config, source: SourceArgs, warmup: Duration) -> CliResult {
    let pipeline = source.pipeline(config)?;
    let lifecycle = HostLifecycle::new();
    pipeline.start(&lifecycle)?;

    // Give auto exposure a moment before the still
    tokio::time::sleep(warmup).await;
    let result = pipeline.recognize_still().await;
    pipeline.stop();

    println!("{}", result?);
    Ok(())
}

/// Decode barcodes in image files and print their classification
pub async fn decode(config: &Config, images: Vec<PathBuf>) -> CliResult {
    let analyzer = BarcodeAnalyzer::new(Arc::new(QrDetector::with_max_dimension(
        config.qr_max_dimension,
    )));

    for (index, path) in images.iter().enumerate() {
        let raw = load_image_as_frame(path)?;
        let frame = Frame::detached(raw, index as u64 + 1);

        match analyzer.analyze(frame).await {
            Ok(detections) if detections.is_empty() => {
                println!("{}: no barcode", path.display());
            }
            Ok(detections) => {
                for detection in detections {
                    match detection.payload.classify() {
                        Some(payload) => println!("{}:\n{}", path.display(), payload),
                        None => println!(
                            "{}: {} barcode (not used)",
                            path.display(),
                            detection.payload.kind()
                        ),
                    }
                }
            }
            Err(e) => {
                eprintln!("{}: {} ({})", path.display(), config.barcode_failure_message, e);
            }
        }
    }
    Ok(())
}

/// Recognize text in an existing image file
pub async fn recognize(config: &Config, image: PathBuf) -> CliResult {
    let stored = storage::load_stored_image(&image)?;
    let recognizer = TesseractRecognizer::new(
        &config.tesseract_path,
        config.ocr_languages.clone(),
        config.ocr_timeout(),
    );

    let text = recognizer.recognize(&stored).await?;
    println!("{}", text.text());
    Ok(())
}

/// List captured stills, newest first
pub async fn captures(config: &Config, limit: usize) -> CliResult {
    let dir = config.captures_dir();
    let files = storage::list_captures(dir.clone()).await?;
    if files.is_empty() {
        println!("No captures in {}", dir.display());
        return Ok(());
    }
    for path in files.into_iter().take(limit) {
        println!("{}", path.display());
    }
    Ok(())
}

/// Print the effective configuration, or where it is read from
pub fn config(config: &Config, path_only: bool) -> CliResult {
    if path_only {
        match Config::config_path() {
            Some(path) => println!("{}", path.display()),
            None => return Err("No config directory available".into()),
        }
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
