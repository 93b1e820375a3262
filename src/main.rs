// src/main.rs

mod annotate;
mod backend;
mod config;
mod frame_source;
mod geometry;
mod occupancy;
mod pipeline;
mod types;
mod vehicle_detection;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use backend::BackendClient;
use pipeline::PipelineController;
use vehicle_detection::YoloDetector;

#[tokio::main]
async fn main() -> Result<()> {
    let config = types::Config::load("config.yaml")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.level))
        .init();

    info!("🅿 Parking occupancy detection starting");

    let backend = BackendClient::new(&config.backend)?;

    let spots = backend
        .fetch_spots()
        .await
        .context("Failed to fetch spot definitions")?;
    let evaluated = spots.iter().filter(|s| s.polygon.is_some()).count();
    if evaluated == 0 {
        anyhow::bail!(
            "No spots have defined polygons; upload corner definitions with define_spots first"
        );
    }
    info!("✓ {} spots to evaluate", evaluated);

    let detector = YoloDetector::new(&config.model, &config.detection)?;
    info!("✓ Detector ready");

    let source = frame_source::open(&config.source)?;
    let sink = backend.occupancy_sink();

    let (controller, handle) = PipelineController::new(
        source,
        Box::new(detector),
        Box::new(sink),
        spots,
        config.clone(),
    );

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping pipeline");
            handle.stop();
        }
    });

    let stats = controller.run().await?;

    info!("✓ Run complete");
    info!("  Frames read: {}", stats.frames_read);
    info!("  Frames classified: {}", stats.frames_classified);
    info!("  Snapshots dispatched: {}", stats.reports_dispatched);
    info!("  Duration: {:.1}s", stats.duration_secs);
    info!("  Processing speed: {:.1} FPS", stats.avg_fps);

    Ok(())
}
