//! Cross-frame association of player and referee detections (ByteTrack).

mod bbox;
mod byte_tracker;
mod kalman_filter;
mod matching;
mod track;

pub use bbox::{BBox, iou_batch};
pub use byte_tracker::{ByteTracker, TrackerConfig};
pub use track::{Track, TrackState};
