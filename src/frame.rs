use bytes::Bytes;

/// Raw RGB frame as produced by the simulator
///
/// Row-major, 3 bytes per pixel (R, G, B). The pixel buffer is immutable and
/// can be shared across threads without copying.
#[derive(Debug, Clone)]
pub struct RgbFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    /// Producer-side sequence number for latency tracking; not the
    /// publisher's frame_id
    pub sequence: u64,
}

impl RgbFrame {
    pub fn new(width: u32, height: u32, data: Bytes) -> Self {
        Self {
            data,
            width,
            height,
            sequence: 0,
        }
    }

    /// Expected pixel buffer length for these dimensions
    pub fn expected_len(width: u32, height: u32) -> usize {
        (width * height * 3) as usize
    }
}

/// Converted frame in NV12 layout: full-resolution Y plane followed by an
/// interleaved half-resolution UV plane
#[derive(Debug, Clone)]
pub struct Nv12Frame {
    data: Bytes,
    width: u32,
    height: u32,
}

impl Nv12Frame {
    pub(crate) fn from_bytes(width: u32, height: u32, data: Bytes) -> Self {
        debug_assert_eq!(data.len(), Self::byte_len(width, height));
        Self {
            data,
            width,
            height,
        }
    }

    /// NV12 byte count for the given dimensions (both must be even)
    pub fn byte_len(width: u32, height: u32) -> usize {
        let luma = (width * height) as usize;
        luma + luma / 2
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn y_plane(&self) -> &[u8] {
        &self.data[..(self.width * self.height) as usize]
    }

    pub fn uv_plane(&self) -> &[u8] {
        &self.data[(self.width * self.height) as usize..]
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv12_plane_split() {
        let frame = Nv12Frame::from_bytes(64, 32, Bytes::from(vec![0u8; 64 * 32 * 3 / 2]));
        assert_eq!(frame.y_plane().len(), 64 * 32);
        assert_eq!(frame.uv_plane().len(), 64 * 32 / 2);
    }

    #[test]
    fn nv12_byte_len() {
        assert_eq!(Nv12Frame::byte_len(1928, 1208), 1928 * 1208 * 3 / 2);
        assert_eq!(Nv12Frame::byte_len(64, 64), 6144);
    }
}
