// src/annotate.rs
//
// Renders spot polygons colored by occupancy state, detection boxes,
// and a stats overlay onto a frame. Never mutates classifier output;
// the color mapping is fixed so rendered output is pixel-stable for a
// given input.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use opencv::{
    core::{self, Mat},
    imgcodecs, imgproc,
    prelude::*,
    videoio::VideoWriter,
};
use tracing::{info, warn};

use crate::types::{Frame, OccupancyRecord, OutputConfig, ParkingSpot};
use crate::vehicle_detection::Detection;

// Color policy (BGR): occupied red, free green, detections yellow.
fn spot_color(occupied: bool) -> core::Scalar {
    if occupied {
        core::Scalar::new(0.0, 0.0, 255.0, 0.0)
    } else {
        core::Scalar::new(0.0, 255.0, 0.0, 0.0)
    }
}

fn detection_color() -> core::Scalar {
    core::Scalar::new(0.0, 255.0, 255.0, 0.0)
}

/// Produce the annotated BGR frame: spot outlines with label:status
/// text, raw detection boxes with centroids, and a stats block.
pub fn render(
    frame: &Frame,
    spots: &[ParkingSpot],
    records: &[OccupancyRecord],
    detections: &[Detection],
    frame_id: u64,
) -> Result<Mat> {
    let mat = Mat::from_slice(&frame.data)?;
    let mat = mat.reshape(3, frame.height as i32)?;

    let mut bgr_mat = Mat::default();
    imgproc::cvt_color(&mat, &mut bgr_mat, imgproc::COLOR_RGB2BGR, 0)?;
    let mut output = bgr_mat.try_clone()?;

    let occ_map: HashMap<i64, bool> = records.iter().map(|r| (r.spot_id, r.occupied)).collect();

    // Spot outlines
    for spot in spots {
        let Some(polygon) = spot.polygon.as_ref() else {
            continue;
        };
        if polygon.len() < 3 {
            continue;
        }

        let occupied = occ_map.get(&spot.id).copied().unwrap_or(false);
        let color = spot_color(occupied);

        for i in 0..polygon.len() {
            let (x1, y1) = polygon[i];
            let (x2, y2) = polygon[(i + 1) % polygon.len()];
            imgproc::line(
                &mut output,
                core::Point::new(x1 as i32, y1 as i32),
                core::Point::new(x2 as i32, y2 as i32),
                color,
                2,
                imgproc::LINE_AA,
                0,
            )?;
        }

        let status = if occupied { "OCCUPIED" } else { "FREE" };
        let (tx, ty) = polygon[0];
        imgproc::put_text(
            &mut output,
            &format!("{}:{}", spot.label, status),
            core::Point::new(tx as i32, ty as i32 - 5),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.6,
            color,
            2,
            imgproc::LINE_8,
            false,
        )?;
    }

    // Raw detection boxes and centroid markers
    for detection in detections {
        let [x1, y1, x2, y2] = detection.bbox;
        let (cx, cy) = detection.centroid();

        imgproc::rectangle(
            &mut output,
            core::Rect::new(
                x1 as i32,
                y1 as i32,
                (x2 - x1) as i32,
                (y2 - y1) as i32,
            ),
            detection_color(),
            2,
            imgproc::LINE_8,
            0,
        )?;
        imgproc::circle(
            &mut output,
            core::Point::new(cx as i32, cy as i32),
            5,
            detection_color(),
            -1,
            imgproc::LINE_8,
            0,
        )?;
        imgproc::put_text(
            &mut output,
            &format!("{}: {:.2}", detection.class_name, detection.confidence),
            core::Point::new(x1 as i32, y1 as i32 - 10),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.5,
            detection_color(),
            2,
            imgproc::LINE_8,
            false,
        )?;
    }

    // Stats overlay
    let lines = stats_lines(frame_id, records, detections);
    let info_height = (lines.len() * 25 + 10) as i32;
    imgproc::rectangle(
        &mut output,
        core::Rect::new(10, 10, 220, info_height),
        core::Scalar::new(0.0, 0.0, 0.0, 0.0),
        -1,
        imgproc::LINE_8,
        0,
    )?;
    for (i, line) in lines.iter().enumerate() {
        imgproc::put_text(
            &mut output,
            line,
            core::Point::new(15, 30 + i as i32 * 25),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.6,
            core::Scalar::new(255.0, 255.0, 255.0, 0.0),
            2,
            imgproc::LINE_8,
            false,
        )?;
    }

    Ok(output)
}

// Derived only from passed-in data: no wall-clock text, so two renders
// of the same input are identical.
fn stats_lines(
    frame_id: u64,
    records: &[OccupancyRecord],
    detections: &[Detection],
) -> Vec<String> {
    let occupied = records.iter().filter(|r| r.occupied).count();
    vec![
        format!("Frame: {}", frame_id),
        format!("Occupied: {}/{}", occupied, records.len()),
        format!("Objects: {}", detections.len()),
    ]
}

/// Where annotated frames go: a video file, a continuously overwritten
/// latest-frame image, or both. Owned by the pipeline controller and
/// released with the other resources.
pub struct OutputWriter {
    writer: Option<VideoWriter>,
    latest_frame: Option<String>,
}

impl OutputWriter {
    pub fn create(config: &OutputConfig, width: i32, height: i32, fps: f64) -> Result<Self> {
        let writer = if config.save_annotated {
            std::fs::create_dir_all(&config.output_dir)?;
            let output_path = PathBuf::from(&config.output_dir).join("annotated.mp4");
            info!("Output video: {}", output_path.display());

            let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
            let fps = if fps > 0.0 { fps } else { 30.0 };
            let writer = VideoWriter::new(
                output_path.to_str().context("Output path is not valid UTF-8")?,
                fourcc,
                fps,
                core::Size::new(width, height),
                true,
            )?;
            Some(writer)
        } else {
            None
        };

        if let Some(path) = &config.latest_frame {
            if let Some(dir) = Path::new(path).parent() {
                std::fs::create_dir_all(dir)?;
            }
        }

        Ok(Self {
            writer,
            latest_frame: config.latest_frame.clone(),
        })
    }

    pub fn is_active(&self) -> bool {
        self.writer.is_some() || self.latest_frame.is_some()
    }

    pub fn write(&mut self, mat: &Mat) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.write(mat)?;
        }
        if let Some(path) = &self.latest_frame {
            imgcodecs::imwrite(path, mat, &core::Vector::new())?;
        }
        Ok(())
    }

    pub fn release(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.release() {
                warn!("Failed to release video writer: {}", e);
            }
        }
        self.writer = None;
    }
}
