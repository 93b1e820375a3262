use crate::types::Config;
use anyhow::{ensure, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.pipeline.frame_stride >= 1, "frame_stride must be >= 1");
        ensure!(
            self.pipeline.report_interval_secs >= 0.0,
            "report_interval_secs must not be negative"
        );
        ensure!(
            !self.detection.vehicle_classes.is_empty(),
            "at least one vehicle class must be configured"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::types::*;

    pub(crate) fn base_config() -> Config {
        Config {
            model: ModelConfig {
                path: "model.onnx".to_string(),
                input_size: 640,
                num_threads: 4,
            },
            detection: DetectionConfig {
                confidence_threshold: 0.25,
                nms_iou_threshold: 0.45,
                vehicle_classes: vec!["car".to_string()],
            },
            source: SourceConfig::File {
                path: "video.mp4".to_string(),
            },
            pipeline: PipelineConfig {
                frame_stride: 3,
                report_interval_secs: 2.0,
            },
            output: OutputConfig {
                save_annotated: false,
                output_dir: "output".to_string(),
                latest_frame: None,
            },
            backend: BackendConfig {
                base_url: "http://localhost:8080".to_string(),
                request_timeout_secs: 10,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_zero_stride_rejected() {
        let mut config = base_config();
        config.pipeline.frame_stride = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_vehicle_classes_rejected() {
        let mut config = base_config();
        config.detection.vehicle_classes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_source_config_yaml_roundtrip() {
        let yaml = "kind: camera\nindex: 0\n";
        let source: SourceConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(source, SourceConfig::Camera { index: 0 }));

        let yaml = "kind: file\npath: lot.mp4\n";
        let source: SourceConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(source, SourceConfig::File { .. }));
    }
}
