//! Per-stage analytics applied to the track store after tracking.

mod camera_motion;
mod interpolation;
mod kmeans;
mod optical_flow;
mod position;
mod possession;
mod speed_distance;
mod team_assigner;
mod view_transformer;

pub use camera_motion::{
    CameraMotionConfig, CameraMotionEstimator, CameraMovement, add_adjust_positions_to_tracks,
};
pub use interpolation::{interpolate_ball_positions, interpolate_boxes};
pub use kmeans::{Clustering, KMeans};
pub use optical_flow::{FeatureParams, FlowParams, calc_optical_flow, good_features_to_track};
pub use position::{add_position_to_tracks, position_for};
pub use possession::{
    BallControl, PlayerBallAssigner, PossessionConfig, PossessionShare, carry_forward,
};
pub use speed_distance::{DistanceReport, SpeedConfig, SpeedDistanceEstimator};
pub use team_assigner::{TeamAssigner, player_color};
pub use view_transformer::{ViewConfig, ViewTransformer};
