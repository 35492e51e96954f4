//! RGB to NV12 frame conversion
//!
//! One entry point, two paths: a WebGPU compute kernel when a device is
//! available and the dimensions fit the kernel's block layout, otherwise a
//! scalar fallback. The path is decided once at construction and never
//! changes for the converter's lifetime.

pub mod gpu;
pub mod software;

use std::time::Instant;

use bytes::Bytes;
use color_eyre::{eyre::eyre, Result};
use thiserror::Error;
use tracing::{info, warn};

use crate::frame::{Nv12Frame, RgbFrame};
use gpu::GpuKernel;

#[derive(Debug, Error)]
pub enum ConvertError {
    /// Caller supplied a frame that does not match the configured geometry.
    /// Fatal to the call; retrying with the same input cannot succeed.
    #[error("invalid input frame: {0}")]
    InvalidInput(String),
    /// The accelerated backend failed mid-dispatch after successful
    /// initialization. Fatal to the call; no automatic path switch.
    #[error("accelerated conversion failed: {0}")]
    Conversion(String),
}

/// Conversion backend, fixed at construction
pub enum ConverterMode {
    Accelerated(GpuKernel),
    Software,
}

/// Deterministic RGB to NV12 converter bound to fixed frame dimensions
pub struct FrameConverter {
    width: u32,
    height: u32,
    mode: ConverterMode,
}

impl FrameConverter {
    /// Build a converter, probing for an accelerated compute context.
    ///
    /// Probe failure is not an error: it is logged and the converter degrades
    /// to the software path. Odd dimensions are a configuration error since
    /// 4:2:0 chroma subsampling needs integer half-dimensions.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Self::check_dims(width, height)?;

        let mode = match GpuKernel::new(width, height) {
            Ok(kernel) => {
                info!("Using GPU kernel for RGB to NV12 conversion");
                ConverterMode::Accelerated(kernel)
            }
            Err(e) => {
                warn!("GPU conversion unavailable, falling back to software path: {e:#}");
                ConverterMode::Software
            }
        };

        Ok(Self {
            width,
            height,
            mode,
        })
    }

    /// Build a converter pinned to the software path
    pub fn software(width: u32, height: u32) -> Result<Self> {
        Self::check_dims(width, height)?;
        Ok(Self {
            width,
            height,
            mode: ConverterMode::Software,
        })
    }

    fn check_dims(width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(eyre!(
                "frame dimensions must be even and non-zero, got {width}x{height}"
            ));
        }
        Ok(())
    }

    pub fn is_accelerated(&self) -> bool {
        matches!(self.mode, ConverterMode::Accelerated(_))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Convert one RGB frame to NV12. Synchronous on both paths; the
    /// accelerated path blocks until the device completes.
    pub fn convert(&self, frame: &RgbFrame) -> Result<Nv12Frame, ConvertError> {
        if frame.width != self.width || frame.height != self.height {
            return Err(ConvertError::InvalidInput(format!(
                "expected {}x{}, got {}x{}",
                self.width, self.height, frame.width, frame.height
            )));
        }
        let expected = RgbFrame::expected_len(self.width, self.height);
        if frame.data.len() != expected {
            return Err(ConvertError::InvalidInput(format!(
                "pixel buffer is {} bytes, expected {expected}",
                frame.data.len()
            )));
        }

        let convert_start = Instant::now();

        let data = match &self.mode {
            ConverterMode::Accelerated(kernel) => kernel.convert(&frame.data)?,
            ConverterMode::Software => {
                let mut out = vec![0u8; Nv12Frame::byte_len(self.width, self.height)];
                software::rgb_to_nv12(
                    &frame.data,
                    self.width as usize,
                    self.height as usize,
                    &mut out,
                );
                out
            }
        };

        metrics::histogram!("convert_time_us").record(convert_start.elapsed().as_micros() as f64);

        Ok(Nv12Frame::from_bytes(
            self.width,
            self.height,
            Bytes::from(data),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise_frame(width: u32, height: u32) -> RgbFrame {
        let mut data = Vec::with_capacity(RgbFrame::expected_len(width, height));
        let mut state = 0x2545f491u32;
        for _ in 0..data.capacity() {
            // xorshift, deterministic across runs
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            data.push(state as u8);
        }
        RgbFrame::new(width, height, data.into())
    }

    #[test]
    fn rejects_odd_dimensions() {
        assert!(FrameConverter::software(63, 64).is_err());
        assert!(FrameConverter::software(64, 63).is_err());
        assert!(FrameConverter::software(0, 64).is_err());
    }

    #[test]
    fn output_size_matches_nv12() {
        for (w, h) in [(2, 2), (6, 6), (64, 64), (1928, 8)] {
            let conv = FrameConverter::software(w, h).unwrap();
            let out = conv.convert(&noise_frame(w, h)).unwrap();
            assert_eq!(out.data().len(), (w * h * 3 / 2) as usize);
        }
    }

    #[test]
    fn mismatched_dimensions_are_invalid_input() {
        let conv = FrameConverter::software(64, 64).unwrap();
        let err = conv.convert(&noise_frame(32, 32)).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidInput(_)));
    }

    #[test]
    fn short_pixel_buffer_is_invalid_input() {
        let conv = FrameConverter::software(64, 64).unwrap();
        let frame = RgbFrame::new(64, 64, vec![0u8; 64].into());
        let err = conv.convert(&frame).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidInput(_)));
    }

    #[test]
    fn gpu_agrees_with_software_path() {
        let gpu = match FrameConverter::new(64, 64) {
            Ok(c) if c.is_accelerated() => c,
            // No adapter on this machine, nothing to compare
            _ => return,
        };
        let sw = FrameConverter::software(64, 64).unwrap();

        let frame = noise_frame(64, 64);
        let accel = gpu.convert(&frame).unwrap();
        let scalar = sw.convert(&frame).unwrap();

        for (i, (a, b)) in accel.data().iter().zip(scalar.data().iter()).enumerate() {
            assert!(
                (*a as i32 - *b as i32).abs() <= 2,
                "sample {i}: gpu={a} software={b}"
            );
        }
    }
}
