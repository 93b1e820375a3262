// src/frame_source.rs
//
// Abstracts "next frame" over a live camera, a video file, or a still
// image. The pipeline only ever sees the three-way read signal.

use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use opencv::{
    core::Mat,
    imgcodecs, imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTrait, VideoCaptureTraitConst},
};
use tracing::{info, warn};

use crate::types::{Frame, SourceConfig};

pub enum FrameRead {
    Frame(Frame),
    /// Expected, terminal for finite sources; the pipeline stops cleanly.
    EndOfStream,
    /// Fatal for the current run; no in-core retry.
    Failure(anyhow::Error),
}

pub trait FrameSource: Send {
    fn next_frame(&mut self) -> FrameRead;
    fn fps(&self) -> f64;
    fn dimensions(&self) -> (usize, usize);
    fn close(&mut self);
}

/// Open the configured source. Failure here is fatal-setup: the
/// pipeline never enters `Running` without a readable source.
pub fn open(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    match config {
        SourceConfig::Camera { index } => Ok(Box::new(CaptureSource::open_camera(*index)?)),
        SourceConfig::File { path } => Ok(Box::new(CaptureSource::open_file(path)?)),
        SourceConfig::Image { path } => Ok(Box::new(StillImageSource::open(path)?)),
    }
}

/// Camera and video-file sources, both backed by `VideoCapture`. The
/// difference is what an exhausted read means: end of stream for a
/// file, a read failure for a live device.
struct CaptureSource {
    cap: VideoCapture,
    finite: bool,
    fps: f64,
    width: usize,
    height: usize,
    frames_read: u64,
    started: Instant,
}

impl CaptureSource {
    fn open_file(path: &str) -> Result<Self> {
        info!("Opening video file: {}", path);
        let cap = VideoCapture::from_file(path, videoio::CAP_ANY)
            .with_context(|| format!("Failed to open video file {}", path))?;
        Self::build(cap, true)
    }

    fn open_camera(index: i32) -> Result<Self> {
        info!("Opening camera device {}", index);
        let cap = VideoCapture::new(index, videoio::CAP_ANY)
            .with_context(|| format!("Failed to open camera {}", index))?;
        Self::build(cap, false)
    }

    fn build(cap: VideoCapture, finite: bool) -> Result<Self> {
        if !cap.is_opened()? {
            bail!("Frame source could not be opened");
        }

        let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
        let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH)? as usize;
        let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT)? as usize;

        info!("Source ready: {}x{} @ {:.1} FPS", width, height, fps);

        Ok(Self {
            cap,
            finite,
            fps,
            width,
            height,
            frames_read: 0,
            started: Instant::now(),
        })
    }

    fn timestamp_ms(&self) -> f64 {
        if self.finite && self.fps > 0.0 {
            (self.frames_read as f64 / self.fps) * 1000.0
        } else {
            self.started.elapsed().as_secs_f64() * 1000.0
        }
    }
}

impl FrameSource for CaptureSource {
    fn next_frame(&mut self) -> FrameRead {
        let mut mat = Mat::default();

        match VideoCaptureTrait::read(&mut self.cap, &mut mat) {
            Ok(true) if !mat.empty() => {
                self.frames_read += 1;
                match mat_to_frame(&mat, self.timestamp_ms()) {
                    Ok(frame) => FrameRead::Frame(frame),
                    Err(e) => FrameRead::Failure(e),
                }
            }
            Ok(_) => {
                if self.finite {
                    FrameRead::EndOfStream
                } else {
                    FrameRead::Failure(anyhow!("Camera read returned no frame"))
                }
            }
            Err(e) => FrameRead::Failure(e.into()),
        }
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn close(&mut self) {
        if let Err(e) = VideoCaptureTrait::release(&mut self.cap) {
            warn!("Failed to release capture handle: {}", e);
        }
    }
}

/// A still image served once, then end of stream.
struct StillImageSource {
    mat: Option<Mat>,
    width: usize,
    height: usize,
}

impl StillImageSource {
    fn open(path: &str) -> Result<Self> {
        info!("Opening still image: {}", path);
        let mat = imgcodecs::imread(path, imgcodecs::IMREAD_COLOR)
            .with_context(|| format!("Failed to read image {}", path))?;
        if mat.empty() {
            bail!("Image {} is empty or unreadable", path);
        }

        let width = mat.cols() as usize;
        let height = mat.rows() as usize;
        info!("Source ready: {}x{} still image", width, height);

        Ok(Self {
            mat: Some(mat),
            width,
            height,
        })
    }
}

impl FrameSource for StillImageSource {
    fn next_frame(&mut self) -> FrameRead {
        match self.mat.take() {
            Some(mat) => match mat_to_frame(&mat, 0.0) {
                Ok(frame) => FrameRead::Frame(frame),
                Err(e) => FrameRead::Failure(e),
            },
            None => FrameRead::EndOfStream,
        }
    }

    fn fps(&self) -> f64 {
        0.0
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn close(&mut self) {
        self.mat = None;
    }
}

fn mat_to_frame(mat: &Mat, timestamp_ms: f64) -> Result<Frame> {
    let mut rgb_mat = Mat::default();
    imgproc::cvt_color(mat, &mut rgb_mat, imgproc::COLOR_BGR2RGB, 0)?;

    let data = rgb_mat.data_bytes()?.to_vec();

    Ok(Frame {
        data,
        width: mat.cols() as usize,
        height: mat.rows() as usize,
        timestamp_ms,
    })
}
