// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion utilities
//!
//! Barcode scanning only needs luminance, still encoding needs RGB. These
//! helpers produce both from any [`PixelFormat`] a backend can deliver,
//! honoring row stride padding.

use super::types::{BackendError, BackendResult, PixelFormat};
use image::{GrayImage, RgbImage};

/// Borrowed view over a frame's pixel buffer
#[derive(Debug, Clone, Copy)]
pub struct PixelView<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: PixelFormat,
}

impl<'a> PixelView<'a> {
    fn row(&self, y: u32) -> BackendResult<&'a [u8]> {
        let bpp = self.format.bytes_per_pixel().unwrap_or(1) as usize;
        let stride = if self.stride == 0 {
            self.width as usize * bpp
        } else {
            self.stride as usize
        };
        let start = y as usize * stride;
        let end = start + self.width as usize * bpp;
        self.data.get(start..end).ok_or_else(|| {
            BackendError::Other(format!(
                "Frame buffer too short: row {} needs {} bytes, have {}",
                y,
                end,
                self.data.len()
            ))
        })
    }
}

/// BT.601 luma from RGB
fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8
}

/// BT.601 YUV to RGB
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    [
        (y + 1.402 * v).clamp(0.0, 255.0) as u8,
        (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8,
        (y + 1.772 * u).clamp(0.0, 255.0) as u8,
    ]
}

/// Extract an 8-bit luminance image
pub fn to_luma(view: PixelView<'_>) -> BackendResult<GrayImage> {
    if view.format == PixelFormat::MJPEG {
        return image::load_from_memory(view.data)
            .map(|img| img.to_luma8())
            .map_err(|e| BackendError::FormatNotSupported(format!("MJPEG decode failed: {}", e)));
    }

    let mut out = Vec::with_capacity((view.width * view.height) as usize);
    for y in 0..view.height {
        let row = view.row(y)?;
        match view.format {
            PixelFormat::RGBA => out.extend(row.chunks_exact(4).map(|p| luma(p[0], p[1], p[2]))),
            PixelFormat::RGB24 => out.extend(row.chunks_exact(3).map(|p| luma(p[0], p[1], p[2]))),
            // NV12's first plane is already luma
            PixelFormat::Gray8 | PixelFormat::NV12 => out.extend_from_slice(row),
            // YUYV: Y0 U Y1 V, luma on even bytes
            PixelFormat::YUYV => out.extend(row.iter().step_by(2).copied()),
            PixelFormat::MJPEG => unreachable!("handled above"),
        }
    }

    GrayImage::from_raw(view.width, view.height, out)
        .ok_or_else(|| BackendError::Other("Luma buffer does not match dimensions".into()))
}

/// Convert to a packed RGB image
pub fn to_rgb(view: PixelView<'_>) -> BackendResult<RgbImage> {
    if view.format == PixelFormat::MJPEG {
        return image::load_from_memory(view.data)
            .map(|img| img.to_rgb8())
            .map_err(|e| BackendError::FormatNotSupported(format!("MJPEG decode failed: {}", e)));
    }
    if view.format == PixelFormat::NV12 {
        return nv12_to_rgb(view);
    }

    let mut out = Vec::with_capacity((view.width * view.height * 3) as usize);
    for y in 0..view.height {
        let row = view.row(y)?;
        match view.format {
            PixelFormat::RGBA => {
                for p in row.chunks_exact(4) {
                    out.extend_from_slice(&p[..3]);
                }
            }
            PixelFormat::RGB24 => out.extend_from_slice(row),
            PixelFormat::Gray8 => {
                for &g in row {
                    out.extend_from_slice(&[g, g, g]);
                }
            }
            PixelFormat::YUYV => {
                // Y0 U Y1 V encodes two pixels
                for chunk in row.chunks_exact(4) {
                    out.extend_from_slice(&yuv_to_rgb(chunk[0], chunk[1], chunk[3]));
                    out.extend_from_slice(&yuv_to_rgb(chunk[2], chunk[1], chunk[3]));
                }
            }
            PixelFormat::NV12 | PixelFormat::MJPEG => unreachable!("handled above"),
        }
    }

    RgbImage::from_raw(view.width, view.height, out)
        .ok_or_else(|| BackendError::Other("RGB buffer does not match dimensions".into()))
}

/// NV12: full resolution Y plane followed by a half resolution interleaved UV plane
fn nv12_to_rgb(view: PixelView<'_>) -> BackendResult<RgbImage> {
    let width = view.width as usize;
    let height = view.height as usize;
    let stride = if view.stride == 0 { width } else { view.stride as usize };
    let uv_offset = stride * height;
    let needed = uv_offset + stride * height.div_ceil(2);
    if view.data.len() < needed {
        return Err(BackendError::Other(format!(
            "NV12 buffer too short: need {} bytes, have {}",
            needed,
            view.data.len()
        )));
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            let luma = view.data[y * stride + x];
            let uv = uv_offset + (y / 2) * stride + (x / 2) * 2;
            out.extend_from_slice(&yuv_to_rgb(luma, view.data[uv], view.data[uv + 1]));
        }
    }

    RgbImage::from_raw(view.width, view.height, out)
        .ok_or_else(|| BackendError::Other("RGB buffer does not match dimensions".into()))
}
