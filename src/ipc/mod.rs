//! Interfaces to the external frame transport and messaging bus
//!
//! The shared-memory frame service and the pub/sub bus are separate daemons;
//! this crate only speaks to them through these traits. The loopback
//! implementations exist so the simulator runs end-to-end in one process.

pub mod loopback;

use bytes::Bytes;
use color_eyre::Result;
use serde::{Deserialize, Serialize};

pub use loopback::{LoopbackBus, LoopbackTransport};

/// One logical camera feed with its own frame sequence and channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamType {
    Road,
    WideRoad,
}

impl StreamType {
    /// Channel name the stream's metadata messages are published under
    pub fn channel_name(self) -> &'static str {
        match self {
            StreamType::Road => "roadCameraState",
            StreamType::WideRoad => "wideRoadCameraState",
        }
    }
}

/// Per-frame metadata message published on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub frame_id: u32,
    /// Placeholder extrinsic calibration; the simulator does not model real
    /// camera transforms
    pub transform: [f32; 9],
}

/// 3x3 identity, flattened row-major
pub const IDENTITY_TRANSFORM: [f32; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Shared-memory frame buffer service
pub trait FrameTransport {
    /// Allocate a ring of `count` frame buffers for the stream
    fn create_buffers(
        &mut self,
        stream: StreamType,
        count: usize,
        width: u32,
        height: u32,
    ) -> Result<()>;

    /// Begin accepting subscribers
    fn start_listener(&mut self) -> Result<()>;

    /// Publish one converted frame under the stream's channel
    fn send(
        &mut self,
        stream: StreamType,
        data: Bytes,
        frame_id: u32,
        start_timestamp_ns: u64,
        end_timestamp_ns: u64,
    ) -> Result<()>;
}

/// Publish/subscribe messaging bus
pub trait MessageBus {
    fn publish(&mut self, channel: &str, msg: &CameraState) -> Result<()>;
}
