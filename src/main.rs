//! Simulated camerad: synthetic frames in, NV12 buffers and camera-state
//! messages out

use std::sync::Arc;
use std::time::Duration;

use camsim::ipc::{LoopbackBus, LoopbackTransport, StreamType};
use camsim::source::SyntheticCamera;
use camsim::{Config, FramePublisher};
use color_eyre::Result;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter("camsim=debug")
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Camsim launching...");

    // Load configuration
    let config = Config::default();
    camsim::CONFIG.store(Arc::new(config.clone()));
    let camera = config.camera;

    let transport = LoopbackTransport::new();
    let mut bus = LoopbackBus::new();

    // Liveness observer: count road camera-state messages once per second
    let state_rx = bus.subscribe(StreamType::Road.channel_name());
    let observer = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let received = state_rx.drain().count();
            if received > 0 {
                info!("roadCameraState alive: {received} msg/s");
            } else {
                error!("no roadCameraState messages in the last second");
            }
        }
    });

    let mut publisher = FramePublisher::new(transport, bus, &camera)?;

    // Drain the frame ring the way a downstream vision consumer would
    let frame_rx = publisher.transport_mut().subscribe(StreamType::Road)?;
    let consumer = tokio::spawn(async move {
        while let Ok(slot) = frame_rx.recv_async().await {
            tracing::debug!(
                "Consumed frame {} ({} bytes, eof {}ns)",
                slot.frame_id,
                slot.data.len(),
                slot.end_timestamp_ns
            );
        }
    });

    info!(
        "Conversion path: {}",
        if publisher.converter().is_accelerated() {
            "GPU kernel"
        } else {
            "software"
        }
    );

    let mut road_camera = SyntheticCamera::new(camera.width, camera.height);
    let mut wide_camera = camera
        .dual_camera
        .then(|| SyntheticCamera::new(camera.width, camera.height));

    let mut ticker = tokio::time::interval(Duration::from_nanos(camera.frame_interval_ns));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frame = road_camera.next_frame();
                if let Err(e) = publisher.send(StreamType::Road, &frame) {
                    error!("Road frame publish failed: {e:#}");
                    break;
                }
                if let Some(wide) = wide_camera.as_mut() {
                    let frame = wide.next_frame();
                    if let Err(e) = publisher.send(StreamType::WideRoad, &frame) {
                        error!("Wide road frame publish failed: {e:#}");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    observer.abort();
    consumer.abort();
    info!("Camsim shutting down");
    Ok(())
}
