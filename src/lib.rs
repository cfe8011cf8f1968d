//! # pitchtrack-rs
//!
//! Turns a broadcast football video into per-player positional, kinematic and
//! possession statistics.
//!
//! The pipeline runs these stages in order, each one enriching a shared
//! [`TrackStore`]:
//!
//! 1. object tracking (pluggable detector + ByteTrack association)
//! 2. ball gap interpolation
//! 3. reference position extraction
//! 4. camera motion estimation and position stabilisation
//! 5. perspective projection onto the pitch (metres)
//! 6. windowed speed and cumulative distance
//! 7. jersey-colour team assignment
//! 8. ball possession with carry-forward team ball control
//!
//! ```ignore
//! use pitchtrack_rs::{Analysis, PipelineConfig};
//!
//! let analysis = Analysis::new(PipelineConfig::default().with_frame_rate(25.0));
//! let output = analysis.run(&frames, my_detector)?;
//! println!("{:?}", output.distances);
//! ```

pub mod analysis;
pub mod analytics;
pub mod config;
pub mod error;
pub mod frame;
pub mod integration;
pub mod stub;
pub mod tracker;
pub mod tracks;

pub use analysis::{Analysis, AnalysisOutput, Precomputed};
pub use analytics::{
    BallControl, CameraMotionEstimator, CameraMovement, DistanceReport, PlayerBallAssigner,
    SpeedDistanceEstimator, TeamAssigner, ViewTransformer,
};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use frame::Frame;
pub use integration::{DetectedClass, Detection, DetectionSource, ObjectTracker};
pub use tracker::{BBox, ByteTracker, TrackerConfig};
pub use tracks::{
    BALL_TRACK_ID, Color, FrameTracks, ObjectClass, Observation, PlayerObservation, Point, Team,
    TrackId, TrackStore,
};
