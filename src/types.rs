use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub detection: DetectionConfig,
    pub source: SourceConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
    pub backend: BackendConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub path: String,
    pub input_size: usize,
    pub num_threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub confidence_threshold: f32,
    pub nms_iou_threshold: f32,
    pub vehicle_classes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Camera { index: i32 },
    File { path: String },
    Image { path: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub frame_stride: u64,
    pub report_interval_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub save_annotated: bool,
    pub output_dir: String,
    pub latest_frame: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Planar pixel coordinate in frame space.
pub type Point = (f32, f32);

/// A marked parking spot. Spots are fetched once at startup and stay
/// immutable for the lifetime of a pipeline run. A spot without a
/// polygon is valid but excluded from occupancy evaluation.
#[derive(Debug, Clone)]
pub struct ParkingSpot {
    pub id: i64,
    pub label: String,
    pub polygon: Option<Vec<Point>>,
}

/// Per-spot occupancy verdict for one classification cycle. Produced
/// fresh every classified frame, never diffed against prior state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyRecord {
    pub spot_id: i64,
    pub occupied: bool,
}

#[derive(Debug, Clone)]
pub struct Frame {
    /// RGB24, row-major.
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp_ms: f64,
}
