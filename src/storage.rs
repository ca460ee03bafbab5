// SPDX-License-Identifier: MPL-2.0

//! Storage utilities for captured stills

use crate::errors::{AppError, AppResult};
use crate::pipelines::photo::{EncodingFormat, StoredImage};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Captured stills in `dir`, newest first
///
/// Only JPEG and PNG files count. A missing directory has no captures.
pub async fn list_captures(dir: PathBuf) -> AppResult<Vec<PathBuf>> {
    tokio::task::spawn_blocking(move || {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Storage(format!("{}: {}", dir.display(), e))),
        };

        let mut files: Vec<_> = entries
            .flatten()
            .filter(|entry| encoding_of(&entry.path()).is_some())
            .filter_map(|entry| {
                let modified = entry.metadata().ok()?.modified().ok()?;
                Some((modified, entry.path()))
            })
            .collect();

        // Newest first; names are capture millis, so they break ties
        files.sort_by(|a, b| b.cmp(a));
        debug!(dir = %dir.display(), count = files.len(), "Listed captures");
        Ok(files.into_iter().map(|(_, path)| path).collect())
    })
    .await
    .map_err(|e| AppError::Storage(format!("Capture listing task error: {}", e)))?
}

/// Most recent captured still in `dir`
pub async fn latest_capture(dir: PathBuf) -> AppResult<Option<PathBuf>> {
    Ok(list_captures(dir).await?.into_iter().next())
}

/// Describe an existing image file as a stored still
///
/// Lets text recognition run on images that were not captured here.
pub fn load_stored_image(path: &Path) -> AppResult<StoredImage> {
    let format = encoding_of(path).ok_or_else(|| {
        AppError::Storage(format!("Not a JPEG or PNG image: {}", path.display()))
    })?;
    let (width, height) = image::image_dimensions(path)
        .map_err(|e| AppError::Storage(format!("{}: {}", path.display(), e)))?;
    let modified = std::fs::metadata(path)?.modified()?;

    Ok(StoredImage {
        path: path.to_path_buf(),
        width,
        height,
        format,
        captured_at: DateTime::<Local>::from(modified),
    })
}

fn encoding_of(path: &Path) -> Option<EncodingFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some(EncodingFormat::Jpeg),
        "png" => Some(EncodingFormat::Png),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("card-scanner-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_missing_dir_has_no_captures() {
        let dir = std::env::temp_dir().join("card-scanner-does-not-exist");
        assert!(list_captures(dir.clone()).await.unwrap().is_empty());
        assert!(latest_capture(dir).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lists_only_images_newest_first() {
        let dir = scratch_dir("list");
        let old = dir.join("1000.png");
        let new = dir.join("2000.jpg");
        image::RgbImage::new(2, 2).save(&old).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        image::RgbImage::new(2, 2).save(&new).unwrap();
        std::fs::write(dir.join("notes.txt"), "x").unwrap();

        let listed = list_captures(dir.clone()).await.unwrap();
        assert_eq!(listed, vec![new.clone(), old]);
        assert_eq!(latest_capture(dir.clone()).await.unwrap(), Some(new));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_stored_image_reads_dimensions() {
        let dir = scratch_dir("stored");
        let path = dir.join("card.png");
        image::RgbImage::new(5, 3).save(&path).unwrap();

        let stored = load_stored_image(&path).unwrap();
        assert_eq!((stored.width, stored.height), (5, 3));
        assert_eq!(stored.format, EncodingFormat::Png);

        assert!(load_stored_image(&dir.join("card.gif")).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
