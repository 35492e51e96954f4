pub mod convert;
pub mod frame;
pub mod ipc;
pub mod publisher;
pub mod source;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

pub use convert::{ConvertError, FrameConverter};
pub use frame::{Nv12Frame, RgbFrame};
pub use publisher::FramePublisher;

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub camera: CameraConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Frame width in pixels, must be even
    pub width: u32,
    /// Frame height in pixels, must be even
    pub height: u32,
    /// Nominal frame interval in nanoseconds (50ms = 20Hz)
    pub frame_interval_ns: u64,
    /// Whether the secondary wide-road stream is active
    pub dual_camera: bool,
    /// Shared frame buffers allocated per stream in the transport
    pub buffer_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                width: 1928,
                height: 1208,
                frame_interval_ns: 50_000_000,
                dual_camera: false,
                buffer_count: 5,
            },
        }
    }
}
