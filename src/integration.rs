//! Integration module for connecting object detection backends with the pipeline.
//!
//! The analytics core only sees the [`DetectionSource`] trait; concrete
//! detectors (Burn models, offline recordings, test doubles) live behind it.

mod builder;
mod detector;
mod pipeline;

pub use builder::DetectionBuilder;
pub use detector::{DetectedClass, Detection, DetectionSource, RecordedDetections, load_detector};
pub use pipeline::{FrameObjects, ObjectTracker};

#[cfg(feature = "burn-backend")]
mod burn_backend;

#[cfg(feature = "burn-backend")]
pub use burn_backend::{BurnDetector, BurnDetectorError, BurnModel, ClassMap, RawDetection};
