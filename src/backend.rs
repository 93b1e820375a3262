// src/backend.rs
//
// HTTP surface of the parking backend: spot definitions in, occupancy
// snapshots out. Snapshot delivery is fire-and-forget with at-most-once
// semantics; a lost update is superseded by the next interval's.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::types::{BackendConfig, OccupancyRecord, ParkingSpot, Point};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpotDto {
    id: i64,
    label: String,
    #[serde(default)]
    image_coordinates: Option<String>,
}

impl SpotDto {
    /// The backend stores spot corners as a JSON-encoded string,
    /// `"[[x,y], ...]"`. Malformed or degenerate polygon data demotes
    /// the spot to "no polygon" rather than failing the fetch.
    fn into_spot(self) -> ParkingSpot {
        let polygon = self.image_coordinates.as_deref().and_then(|coords| {
            match serde_json::from_str::<Vec<[f32; 2]>>(coords) {
                Ok(points) if points.len() >= 3 => {
                    Some(points.into_iter().map(|[x, y]| (x, y)).collect::<Vec<Point>>())
                }
                Ok(points) => {
                    warn!(
                        "Spot {} has a degenerate polygon ({} points), excluding it",
                        self.label,
                        points.len()
                    );
                    None
                }
                Err(e) => {
                    warn!("Spot {} has malformed corner data, excluding it: {}", self.label, e);
                    None
                }
            }
        });

        ParkingSpot {
            id: self.id,
            label: self.label,
            polygon,
        }
    }
}

pub struct BackendClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the spot list, called once at startup. Failure here is
    /// fatal-setup; spots without usable polygons are kept in the list
    /// but excluded from classification.
    pub async fn fetch_spots(&self) -> Result<Vec<ParkingSpot>> {
        let url = format!("{}/api/parking", self.base_url);
        info!("Fetching spot definitions from {}", url);

        let dtos: Vec<SpotDto> = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Spot fetch request failed")?
            .error_for_status()
            .context("Spot fetch rejected by backend")?
            .json()
            .await
            .context("Spot list is not valid JSON")?;

        let spots: Vec<ParkingSpot> = dtos.into_iter().map(SpotDto::into_spot).collect();
        let with_polygon = spots.iter().filter(|s| s.polygon.is_some()).count();
        info!("✓ {} spots fetched, {} with polygons", spots.len(), with_polygon);

        Ok(spots)
    }

    pub fn occupancy_sink(&self) -> HttpOccupancySink {
        HttpOccupancySink {
            http_client: self.http_client.clone(),
            url: format!("{}/api/parking/python-occupancies", self.base_url),
        }
    }
}

/// Dispatch of one occupancy snapshot to the remote consumer.
pub trait OccupancySink: Send {
    /// Must not block the caller; the snapshot is an owned value and
    /// the caller never touches it again.
    fn dispatch(&mut self, records: Vec<OccupancyRecord>);
}

/// Fire-and-forget HTTP delivery. Each dispatch runs as an independent
/// task that the pipeline neither awaits nor cancels; dispatches may
/// overlap and failures are logged and dropped.
pub struct HttpOccupancySink {
    http_client: reqwest::Client,
    url: String,
}

impl OccupancySink for HttpOccupancySink {
    fn dispatch(&mut self, records: Vec<OccupancyRecord>) {
        let http_client = self.http_client.clone();
        let url = self.url.clone();
        let occupied = records.iter().filter(|r| r.occupied).count();

        debug!(
            "📡 Dispatching snapshot: {} spots, {} occupied",
            records.len(),
            occupied
        );

        tokio::spawn(async move {
            match http_client.post(&url).json(&records).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("📡 Snapshot delivered");
                }
                Ok(response) => {
                    error!("📡 Backend returned {} for snapshot", response.status());
                }
                Err(e) => {
                    error!("📡 Snapshot delivery failed: {}", e);
                }
            }
        });
    }
}

/// Interval gate decoupling report cadence from frame cadence. The
/// first snapshot passes immediately; afterwards at most one per
/// configured interval.
pub struct DispatchGate {
    interval: Duration,
    last_dispatch: Option<Instant>,
}

impl DispatchGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_dispatch: None,
        }
    }

    pub fn try_pass(&mut self, now: Instant) -> bool {
        let due = match self.last_dispatch {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        };
        if due {
            self.last_dispatch = Some(now);
        }
        due
    }
}
