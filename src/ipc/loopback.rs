//! In-process transport and bus over flume channels
//!
//! Stand-ins for the external frame service and messaging bus with the same
//! surface: bounded per-stream frame rings that drop the newest frame when a
//! subscriber falls behind, and fire-and-forget topic publication.

use std::collections::HashMap;

use bytes::Bytes;
use color_eyre::{eyre::eyre, Result};
use tracing::debug;

use super::{CameraState, FrameTransport, MessageBus, StreamType};

/// Frame as seen by a transport subscriber
#[derive(Debug, Clone)]
pub struct FrameSlot {
    pub data: Bytes,
    pub frame_id: u32,
    pub start_timestamp_ns: u64,
    pub end_timestamp_ns: u64,
}

struct StreamRing {
    tx: flume::Sender<FrameSlot>,
    rx: Option<flume::Receiver<FrameSlot>>,
}

/// In-process frame transport with one bounded ring per stream
#[derive(Default)]
pub struct LoopbackTransport {
    rings: HashMap<StreamType, StreamRing>,
    listening: bool,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the subscriber end for a stream. One subscriber per stream.
    pub fn subscribe(&mut self, stream: StreamType) -> Result<flume::Receiver<FrameSlot>> {
        self.rings
            .get_mut(&stream)
            .and_then(|ring| ring.rx.take())
            .ok_or_else(|| eyre!("no subscribable ring for {stream:?}"))
    }
}

impl FrameTransport for LoopbackTransport {
    fn create_buffers(
        &mut self,
        stream: StreamType,
        count: usize,
        width: u32,
        height: u32,
    ) -> Result<()> {
        debug!("Creating {count} frame buffers for {stream:?} at {width}x{height}");
        let (tx, rx) = flume::bounded(count);
        self.rings.insert(stream, StreamRing { tx, rx: Some(rx) });
        Ok(())
    }

    fn start_listener(&mut self) -> Result<()> {
        self.listening = true;
        Ok(())
    }

    fn send(
        &mut self,
        stream: StreamType,
        data: Bytes,
        frame_id: u32,
        start_timestamp_ns: u64,
        end_timestamp_ns: u64,
    ) -> Result<()> {
        if !self.listening {
            return Err(eyre!("transport listener not started"));
        }
        let ring = self
            .rings
            .get(&stream)
            .ok_or_else(|| eyre!("no buffer ring for {stream:?}"))?;

        let slot = FrameSlot {
            data,
            frame_id,
            start_timestamp_ns,
            end_timestamp_ns,
        };
        // Ring full means the subscriber is behind; drop this frame rather
        // than block the publisher
        if ring.tx.try_send(slot).is_err() {
            metrics::counter!("transport_frames_dropped").increment(1);
        }
        Ok(())
    }
}

/// In-process pub/sub bus. Publishing to a topic nobody subscribed to is a
/// no-op, matching fire-and-forget bus semantics.
#[derive(Default)]
pub struct LoopbackBus {
    topics: HashMap<String, flume::Sender<CameraState>>,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, channel: &str) -> flume::Receiver<CameraState> {
        let (tx, rx) = flume::unbounded();
        self.topics.insert(channel.to_string(), tx);
        rx
    }
}

impl MessageBus for LoopbackBus {
    fn publish(&mut self, channel: &str, msg: &CameraState) -> Result<()> {
        if let Some(tx) = self.topics.get(channel) {
            let _ = tx.send(msg.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::IDENTITY_TRANSFORM;

    #[test]
    fn transport_delivers_in_order() {
        let mut transport = LoopbackTransport::new();
        transport
            .create_buffers(StreamType::Road, 5, 64, 64)
            .unwrap();
        transport.start_listener().unwrap();
        let rx = transport.subscribe(StreamType::Road).unwrap();

        for id in 0..3u32 {
            transport
                .send(StreamType::Road, Bytes::from_static(b"yuv"), id, 0, 0)
                .unwrap();
        }

        let ids: Vec<u32> = rx.drain().map(|slot| slot.frame_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn transport_drops_when_ring_full() {
        let mut transport = LoopbackTransport::new();
        transport
            .create_buffers(StreamType::Road, 2, 64, 64)
            .unwrap();
        transport.start_listener().unwrap();
        let rx = transport.subscribe(StreamType::Road).unwrap();

        for id in 0..5u32 {
            transport
                .send(StreamType::Road, Bytes::from_static(b"yuv"), id, 0, 0)
                .unwrap();
        }

        // Oldest two survive, the rest were dropped at the full ring
        let ids: Vec<u32> = rx.drain().map(|slot| slot.frame_id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn send_before_create_buffers_fails() {
        let mut transport = LoopbackTransport::new();
        transport.start_listener().unwrap();
        assert!(transport
            .send(StreamType::WideRoad, Bytes::new(), 0, 0, 0)
            .is_err());
    }

    #[test]
    fn bus_routes_by_channel() {
        let mut bus = LoopbackBus::new();
        let road_rx = bus.subscribe("roadCameraState");

        bus.publish(
            "roadCameraState",
            &CameraState {
                frame_id: 7,
                transform: IDENTITY_TRANSFORM,
            },
        )
        .unwrap();
        bus.publish(
            "wideRoadCameraState",
            &CameraState {
                frame_id: 9,
                transform: IDENTITY_TRANSFORM,
            },
        )
        .unwrap();

        let msgs: Vec<CameraState> = road_rx.drain().collect();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].frame_id, 7);
    }
}
