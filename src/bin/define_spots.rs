// src/bin/define_spots.rs
//
// Offline setup utility. Takes a JSON file of spot corner polygons
// produced at setup time and uploads it to the backend in one batch.
// The steady-state pipeline only ever reads the resulting definitions.
//
// File format:
//   [ { "spotId": 1, "corners": [[120, 80], [260, 85], [255, 210], [115, 205]] }, ... ]

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpotCorners {
    spot_id: i64,
    corners: Vec<[f32; 2]>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("define_spots=info"))
        .init();

    let path = std::env::args()
        .nth(1)
        .context("Usage: define_spots <corners.json>")?;
    let base_url = std::env::var("PARKING_BACKEND_URL")
        .unwrap_or_else(|_| "http://localhost:8080".to_string());

    let contents =
        std::fs::read_to_string(&path).with_context(|| format!("Cannot read {}", path))?;
    let corners: Vec<SpotCorners> =
        serde_json::from_str(&contents).context("Malformed corners file")?;

    ensure!(!corners.is_empty(), "Corners file defines no spots");
    for spot in &corners {
        ensure!(
            spot.corners.len() >= 3,
            "Spot {} has fewer than 3 corners",
            spot.spot_id
        );
    }

    let url = format!(
        "{}/api/parking/define-corners",
        base_url.trim_end_matches('/')
    );
    info!("Uploading {} spot definitions to {}", corners.len(), url);

    let client = reqwest::Client::new();
    let response = client
        .post(&url)
        .json(&corners)
        .send()
        .await
        .context("Upload failed")?;
    ensure!(
        response.status().is_success(),
        "Backend returned {}",
        response.status()
    );

    info!("✓ Corners saved");
    Ok(())
}
