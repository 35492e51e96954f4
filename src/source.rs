//! Synthetic RGB frame source
//!
//! Stands in for the simulator's renderer: produces a deterministic moving
//! test pattern so the conversion and publication path can be exercised
//! without any upstream.

use bytes::Bytes;

use crate::frame::RgbFrame;

pub struct SyntheticCamera {
    width: u32,
    height: u32,
    sequence: u64,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            sequence: 0,
        }
    }

    /// Produce the next frame: a horizontal/vertical gradient with a phase
    /// that advances each call, so consecutive frames differ
    pub fn next_frame(&mut self) -> RgbFrame {
        let phase = (self.sequence % 256) as u32;
        let mut data = Vec::with_capacity(RgbFrame::expected_len(self.width, self.height));

        for y in 0..self.height {
            for x in 0..self.width {
                data.push(((x * 255 / self.width) as u8).wrapping_add(phase as u8));
                data.push((y * 255 / self.height) as u8);
                data.push(phase as u8);
            }
        }

        let mut frame = RgbFrame::new(self.width, self.height, Bytes::from(data));
        frame.sequence = self.sequence;
        self.sequence += 1;
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_have_expected_geometry() {
        let mut camera = SyntheticCamera::new(64, 32);
        let frame = camera.next_frame();
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 32);
        assert_eq!(frame.data.len(), 64 * 32 * 3);
    }

    #[test]
    fn sequence_advances_and_pattern_moves() {
        let mut camera = SyntheticCamera::new(64, 64);
        let a = camera.next_frame();
        let b = camera.next_frame();
        assert_eq!(a.sequence, 0);
        assert_eq!(b.sequence, 1);
        assert_ne!(a.data, b.data);
    }
}
