//! Error types for the analytics pipeline.
//!
//! Stage errors are kept as separate enums so callers can tell "no players
//! detected" apart from "model missing"; [`PipelineError`] aggregates them.

use thiserror::Error;

use crate::tracks::TrackId;

/// Raw frame buffers that cannot be interpreted as RGB rasters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame must have 3 colour channels, got {0}")]
    Channels(usize),

    #[error("pixel buffer of {got} bytes does not match a {width}x{height} RGB frame")]
    BufferSize {
        width: usize,
        height: usize,
        got: usize,
    },
}

/// Failures of the object tracking stage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackingError {
    #[error("detector failed on frame {frame}: {message}")]
    Detector { frame: usize, message: String },
}

/// Failures of the team assignment stage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TeamError {
    #[error("team clustering needs at least two players in the first frame, found {found}")]
    InsufficientPlayers { found: usize },

    #[error("team colours have not been fitted yet")]
    NotFitted,

    #[error("bounding box of track {track_id} has no pixels inside the frame")]
    EmptyCrop { track_id: TrackId },
}

/// Failures of the ball possession stage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PossessionError {
    #[error("no player controls the ball in the first frame")]
    NoInitialPossession,
}

/// Failures while building the pixel-to-pitch projection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error("pitch corner quadrilateral is degenerate")]
    Degenerate,
}

/// Failures while reading or writing cached stage output.
#[derive(Debug, Error)]
pub enum StubError {
    #[error("stub I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stub encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures while loading a pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("video contains no frames")]
    EmptyVideo,

    #[error("detection model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("precomputed {stage} covers {got} frames, video has {expected}")]
    FrameCountMismatch {
        stage: &'static str,
        expected: usize,
        got: usize,
    },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error(transparent)]
    Team(#[from] TeamError),

    #[error(transparent)]
    Possession(#[from] PossessionError),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Stub(#[from] StubError),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
