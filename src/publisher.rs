//! Frame sequencing and publication
//!
//! Owns the converter and one monotonic frame counter per active stream.
//! Ordering per send is fixed: transport publish, then bus publish, then
//! counter increment, so a bus message never references a frame the
//! transport has not already published.

use color_eyre::{eyre::eyre, Result};
use tracing::{debug, info};

use crate::convert::FrameConverter;
use crate::frame::RgbFrame;
use crate::ipc::{CameraState, FrameTransport, MessageBus, StreamType, IDENTITY_TRANSFORM};
use crate::CameraConfig;

/// Publishes converted frames for the road stream and, optionally, the
/// wide-road stream. Single-producer: `send` is not locked internally and
/// must be driven from one thread.
pub struct FramePublisher<T: FrameTransport, B: MessageBus> {
    transport: T,
    bus: B,
    converter: FrameConverter,
    frame_interval_ns: u64,
    road_frame_id: u32,
    /// None when the wide-road stream is not configured
    wide_frame_id: Option<u32>,
}

impl<T: FrameTransport, B: MessageBus> FramePublisher<T, B> {
    pub fn new(transport: T, bus: B, config: &CameraConfig) -> Result<Self> {
        let converter = FrameConverter::new(config.width, config.height)?;
        Self::with_converter(transport, bus, converter, config)
    }

    /// Build a publisher around an explicitly chosen converter
    pub fn with_converter(
        mut transport: T,
        bus: B,
        converter: FrameConverter,
        config: &CameraConfig,
    ) -> Result<Self> {
        transport.create_buffers(
            StreamType::Road,
            config.buffer_count,
            config.width,
            config.height,
        )?;
        if config.dual_camera {
            transport.create_buffers(
                StreamType::WideRoad,
                config.buffer_count,
                config.width,
                config.height,
            )?;
        }
        transport.start_listener()?;

        info!(
            "Frame publisher ready: {}x{} at {}ns interval, dual_camera={}",
            config.width, config.height, config.frame_interval_ns, config.dual_camera
        );

        Ok(Self {
            transport,
            bus,
            converter,
            frame_interval_ns: config.frame_interval_ns,
            road_frame_id: 0,
            wide_frame_id: config.dual_camera.then_some(0),
        })
    }

    /// Convert and publish one frame on the given stream.
    ///
    /// Conversion errors propagate unchanged with no side effects; nothing is
    /// retried here, that is the simulator loop's call.
    pub fn send(&mut self, stream: StreamType, frame: &RgbFrame) -> Result<()> {
        let frame_id = match stream {
            StreamType::Road => self.road_frame_id,
            StreamType::WideRoad => self
                .wide_frame_id
                .ok_or_else(|| eyre!("wide-road stream is not configured"))?,
        };

        let nv12 = self.converter.convert(frame)?;

        // Start and end of frame share the nominal timestamp; exposure time
        // is not modeled
        let timestamp_ns = frame_id as u64 * self.frame_interval_ns;

        self.transport.send(
            stream,
            nv12.into_bytes(),
            frame_id,
            timestamp_ns,
            timestamp_ns,
        )?;
        self.bus.publish(
            stream.channel_name(),
            &CameraState {
                frame_id,
                transform: IDENTITY_TRANSFORM,
            },
        )?;

        match stream {
            StreamType::Road => self.road_frame_id += 1,
            StreamType::WideRoad => {
                if let Some(id) = self.wide_frame_id.as_mut() {
                    *id += 1;
                }
            }
        }

        debug!("Published {stream:?} frame {frame_id} at {timestamp_ns}ns");
        Ok(())
    }

    pub fn converter(&self) -> &FrameConverter {
        &self.converter
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
