// src/pipeline.rs
//
// Run loop and lifecycle for the occupancy pipeline. One sequential
// loop owns frame acquisition, classification, and annotation; the
// only concurrent activity is snapshot dispatch inside the sink.

use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::annotate::{self, OutputWriter};
use crate::backend::{DispatchGate, OccupancySink};
use crate::frame_source::{FrameRead, FrameSource};
use crate::occupancy;
use crate::types::{Config, ParkingSpot};
use crate::vehicle_detection::ObjectDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Stopped,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Pause,
    Resume,
    Stop,
}

impl PipelineState {
    /// `Stopped -> Running` happens only through `PipelineController::run`;
    /// commands move between the live states and `Stop` always wins.
    fn apply(self, command: ControlCommand) -> PipelineState {
        match (self, command) {
            (PipelineState::Running, ControlCommand::Pause) => PipelineState::Paused,
            (PipelineState::Paused, ControlCommand::Resume) => PipelineState::Running,
            (_, ControlCommand::Stop) => PipelineState::Stopped,
            (state, _) => state,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessingStats {
    pub frames_read: u64,
    pub frames_classified: u64,
    pub reports_dispatched: u64,
    pub duration_secs: f64,
    pub avg_fps: f64,
}

/// Cheap, cloneable control surface for a running pipeline. Sends are
/// best-effort: commands to an already-stopped pipeline are dropped.
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::UnboundedSender<ControlCommand>,
}

impl PipelineHandle {
    pub fn pause(&self) {
        let _ = self.tx.send(ControlCommand::Pause);
    }

    pub fn resume(&self) {
        let _ = self.tx.send(ControlCommand::Resume);
    }

    pub fn stop(&self) {
        let _ = self.tx.send(ControlCommand::Stop);
    }
}

pub struct PipelineController {
    source: Box<dyn FrameSource>,
    detector: Box<dyn ObjectDetector>,
    sink: Box<dyn OccupancySink>,
    spots: Vec<ParkingSpot>,
    config: Config,
    control: mpsc::UnboundedReceiver<ControlCommand>,
    output: Option<OutputWriter>,
    state: PipelineState,
}

impl PipelineController {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn ObjectDetector>,
        sink: Box<dyn OccupancySink>,
        spots: Vec<ParkingSpot>,
        config: Config,
    ) -> (Self, PipelineHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            source,
            detector,
            sink,
            spots,
            config,
            control: rx,
            output: None,
            state: PipelineState::Stopped,
        };
        (controller, PipelineHandle { tx })
    }

    /// Drive the pipeline until end of stream, a stop command, or a
    /// fatal runtime error. Resources are released on every exit path.
    pub async fn run(mut self) -> Result<ProcessingStats> {
        let started = Instant::now();
        let mut stats = ProcessingStats::default();

        let result = self.process(&mut stats).await;

        self.shutdown();

        stats.duration_secs = started.elapsed().as_secs_f64();
        if stats.duration_secs > 0.0 {
            stats.avg_fps = stats.frames_read as f64 / stats.duration_secs;
        }

        match result {
            Ok(()) => Ok(stats),
            Err(e) => {
                error!("Pipeline terminated: {:#}", e);
                Err(e)
            }
        }
    }

    async fn process(&mut self, stats: &mut ProcessingStats) -> Result<()> {
        let (width, height) = self.source.dimensions();
        self.output = Some(OutputWriter::create(
            &self.config.output,
            width as i32,
            height as i32,
            self.source.fps(),
        )?);

        let mut gate = DispatchGate::new(Duration::from_secs_f64(
            self.config.pipeline.report_interval_secs,
        ));

        self.state = PipelineState::Running;
        info!(
            "▶ Pipeline running: stride {}, report interval {:.1}s, {} spots",
            self.config.pipeline.frame_stride,
            self.config.pipeline.report_interval_secs,
            self.spots.len()
        );

        loop {
            // Commands take effect between frames.
            while let Ok(command) = self.control.try_recv() {
                self.transition(command);
            }

            match self.state {
                PipelineState::Stopped => {
                    info!("Stop requested after {} frames", stats.frames_read);
                    return Ok(());
                }
                PipelineState::Paused => {
                    // No frames are consumed while paused; resources
                    // stay held until resume or stop.
                    match self.control.recv().await {
                        Some(command) => {
                            self.transition(command);
                            continue;
                        }
                        None => {
                            self.state = PipelineState::Stopped;
                            return Ok(());
                        }
                    }
                }
                PipelineState::Running => {}
            }

            let frame = match self.source.next_frame() {
                FrameRead::Frame(frame) => frame,
                FrameRead::EndOfStream => {
                    info!("End of stream after {} frames", stats.frames_read);
                    return Ok(());
                }
                FrameRead::Failure(e) => {
                    return Err(e.context("Frame source failure"));
                }
            };
            stats.frames_read += 1;

            if stats.frames_read % self.config.pipeline.frame_stride != 0 {
                continue;
            }

            let detections = match self.detector.detect(&frame) {
                Ok(detections) => detections,
                Err(e) => {
                    warn!(
                        "Detector failed on frame {}, skipping: {:#}",
                        stats.frames_read, e
                    );
                    continue;
                }
            };

            let records = occupancy::classify(
                &detections,
                &self.spots,
                &self.config.detection.vehicle_classes,
            );
            stats.frames_classified += 1;
            debug!(
                "Frame {} ({:.0}ms): {} objects, {}/{} spots occupied",
                stats.frames_read,
                frame.timestamp_ms,
                detections.len(),
                records.iter().filter(|r| r.occupied).count(),
                records.len()
            );

            if let Some(output) = self.output.as_mut() {
                if output.is_active() {
                    match annotate::render(&frame, &self.spots, &records, &detections, stats.frames_read) {
                        Ok(annotated) => {
                            if let Err(e) = output.write(&annotated) {
                                warn!("Failed to write annotated frame: {:#}", e);
                            }
                        }
                        Err(e) => {
                            warn!("Annotation failed on frame {}: {:#}", stats.frames_read, e);
                        }
                    }
                }
            }

            if gate.try_pass(Instant::now()) {
                // The snapshot is handed off as an owned value; the
                // loop never touches it again and never waits for
                // delivery.
                self.sink.dispatch(records);
                stats.reports_dispatched += 1;
            }
        }
    }

    fn transition(&mut self, command: ControlCommand) {
        let next = self.state.apply(command);
        if next != self.state {
            info!("Pipeline state: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Runs on every exit from `Running`/`Paused`, including error
    /// exits. In-flight snapshot dispatches are neither tracked nor
    /// joined; they complete or fail on their own.
    fn shutdown(&mut self) {
        if let Some(mut output) = self.output.take() {
            output.release();
        }
        self.source.close();
        self.state = PipelineState::Stopped;
        info!("✓ Resources released, pipeline stopped");
    }
}
