//! The detector boundary: anything that turns a frame into labelled boxes.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::frame::Frame;
use crate::tracker::BBox;
use crate::tracks::ObjectClass;

/// Classes a football detector is expected to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectedClass {
    Player,
    Goalkeeper,
    Referee,
    Ball,
}

impl DetectedClass {
    /// Goalkeepers are tracked as players.
    pub fn object_class(self) -> ObjectClass {
        match self {
            DetectedClass::Player | DetectedClass::Goalkeeper => ObjectClass::Player,
            DetectedClass::Referee => ObjectClass::Referee,
            DetectedClass::Ball => ObjectClass::Ball,
        }
    }
}

/// A single detector output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: DetectedClass,
    pub confidence: f32,
    pub bbox: BBox,
}

impl Detection {
    /// Create a detection from corner coordinates (left, top, right, bottom).
    pub fn new(class: DetectedClass, x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self {
            class,
            confidence,
            bbox: BBox::new(x1, y1, x2, y2),
        }
    }
}

/// Trait for object detection inference backends.
///
/// Implement this to plug any detection model into the pipeline.
///
/// # Example
///
/// ```ignore
/// use pitchtrack_rs::{Detection, DetectionSource, Frame};
///
/// struct MyDetector { /* model handle */ }
///
/// impl DetectionSource for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource {
    type Error: Display;

    /// Run inference on one frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Self::Error>;
}

impl<D: DetectionSource + ?Sized> DetectionSource for &mut D {
    type Error = D::Error;

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
        (**self).detect(frame)
    }
}

/// Replays detections produced offline, one list per frame.
///
/// Frames beyond the recording yield no detections.
#[derive(Debug, Clone, Default)]
pub struct RecordedDetections {
    frames: Vec<Vec<Detection>>,
    cursor: usize,
}

impl RecordedDetections {
    pub fn new(frames: Vec<Vec<Detection>>) -> Self {
        Self { frames, cursor: 0 }
    }
}

impl DetectionSource for RecordedDetections {
    type Error = std::convert::Infallible;

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
        let detections = self.frames.get(self.cursor).cloned().unwrap_or_default();
        self.cursor += 1;
        Ok(detections)
    }
}

/// Construct a detector, reporting any failure as [`PipelineError::ModelUnavailable`].
pub fn load_detector<D, E, F>(load: F) -> Result<D, PipelineError>
where
    D: DetectionSource,
    E: Display,
    F: FnOnce() -> Result<D, E>,
{
    load().map_err(|e| PipelineError::ModelUnavailable(e.to_string()))
}
