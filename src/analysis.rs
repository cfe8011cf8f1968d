//! End-to-end analysis of a video: tracking through ball possession.

use tracing::info;

use crate::analytics::{
    BallControl, CameraMotionEstimator, CameraMovement, DistanceReport, PlayerBallAssigner,
    SpeedDistanceEstimator, TeamAssigner, ViewTransformer, add_adjust_positions_to_tracks,
    add_position_to_tracks, interpolate_ball_positions,
};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::frame::Frame;
use crate::integration::{Detection, DetectionSource, ObjectTracker};
use crate::stub::{self, StubPaths};
use crate::tracks::{ObjectClass, Team, TrackStore};

/// Stage output supplied by the caller instead of being computed.
#[derive(Debug, Clone, Default)]
pub struct Precomputed {
    /// Raw tracks, as produced by the tracking stage.
    pub tracks: Option<TrackStore>,
    pub camera_movement: Option<CameraMovement>,
}

/// Everything a renderer or report needs.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub tracks: TrackStore,
    pub camera_movement: CameraMovement,
    /// Team in control of the ball, per frame.
    pub team_ball_control: Vec<Team>,
    pub ball_control: BallControl,
    pub distances: DistanceReport,
}

pub struct Analysis {
    config: PipelineConfig,
}

impl Analysis {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run every stage, detecting objects with `detector`.
    pub fn run<D: DetectionSource>(&self, frames: &[Frame], detector: D) -> Result<AnalysisOutput> {
        self.run_with(frames, detector, Precomputed::default())
    }

    /// Like [`Analysis::run`], caching tracks and camera movement as JSON stubs.
    pub fn run_with_stubs<D: DetectionSource>(
        &self,
        frames: &[Frame],
        detector: D,
        stubs: &StubPaths,
    ) -> Result<AnalysisOutput> {
        if frames.is_empty() {
            return Err(PipelineError::EmptyVideo);
        }
        let tracks = stub::load_or_compute(stubs.tracks.as_deref(), stubs.read_from_stub, || {
            self.track(frames, detector)
        })?;
        let camera_movement = stub::load_or_compute(
            stubs.camera_movement.as_deref(),
            stubs.read_from_stub,
            || Ok::<_, PipelineError>(self.camera_movement(frames)),
        )?;
        self.run_with(
            frames,
            NoDetector,
            Precomputed {
                tracks: Some(tracks),
                camera_movement: Some(camera_movement),
            },
        )
    }

    /// Run every stage, skipping those whose output is in `precomputed`.
    ///
    /// `detector` is only used when no tracks are supplied.
    pub fn run_with<D: DetectionSource>(
        &self,
        frames: &[Frame],
        detector: D,
        precomputed: Precomputed,
    ) -> Result<AnalysisOutput> {
        if frames.is_empty() {
            return Err(PipelineError::EmptyVideo);
        }
        let view = ViewTransformer::new(&self.config.view)?;

        let mut tracks = match precomputed.tracks {
            Some(tracks) => tracks,
            None => self.track(frames, detector)?,
        };
        for class in ObjectClass::ALL {
            check_frame_count(class.as_str(), frames.len(), tracks.sequence_len(class))?;
        }

        tracks.ball = interpolate_ball_positions(&tracks.ball);
        add_position_to_tracks(&mut tracks);

        let camera_movement = match precomputed.camera_movement {
            Some(movement) => {
                check_frame_count("camera movement", frames.len(), movement.len())?;
                movement
            }
            None => self.camera_movement(frames),
        };
        add_adjust_positions_to_tracks(&mut tracks, &camera_movement);
        view.add_transformed_position_to_tracks(&mut tracks);

        let distances = SpeedDistanceEstimator::new(&self.config.speed)
            .add_speed_and_distance_to_tracks(&mut tracks);

        let mut teams = TeamAssigner::new();
        teams.assign_teams(frames, &mut tracks)?;

        let team_ball_control =
            PlayerBallAssigner::new(&self.config.possession).team_ball_control(&mut tracks)?;
        let ball_control = BallControl::from_sequence(&team_ball_control);
        let overall = ball_control.overall();
        info!(
            frames = frames.len(),
            team_a = overall.team_a,
            team_b = overall.team_b,
            "analysis complete"
        );

        Ok(AnalysisOutput {
            tracks,
            camera_movement,
            team_ball_control,
            ball_control,
            distances,
        })
    }

    fn track<D: DetectionSource>(&self, frames: &[Frame], detector: D) -> Result<TrackStore> {
        let mut tracker = ObjectTracker::new(detector, self.config.tracker.clone());
        Ok(tracker.get_object_tracks(frames)?)
    }

    fn camera_movement(&self, frames: &[Frame]) -> CameraMovement {
        CameraMotionEstimator::new(self.config.camera.clone()).get_camera_movement(frames)
    }
}

fn check_frame_count(stage: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(PipelineError::FrameCountMismatch { stage, expected, got });
    }
    Ok(())
}

/// Stand-in detector for runs whose tracks are already known.
struct NoDetector;

impl DetectionSource for NoDetector {
    type Error = std::convert::Infallible;

    fn detect(&mut self, _frame: &Frame) -> std::result::Result<Vec<Detection>, Self::Error> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TeamError;
    use crate::integration::RecordedDetections;

    #[test]
    fn test_empty_video_is_rejected() {
        let analysis = Analysis::new(PipelineConfig::default());
        let err = analysis.run(&[], RecordedDetections::default()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyVideo));
    }

    #[test]
    fn test_no_players_is_reported() {
        let frames = vec![Frame::filled(64, 48, [40, 160, 40]); 2];
        let analysis = Analysis::new(PipelineConfig::default());
        let err = analysis.run(&frames, RecordedDetections::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Team(TeamError::InsufficientPlayers { found: 0 })
        ));
    }

    #[test]
    fn test_precomputed_length_is_checked() {
        let frames = vec![Frame::filled(64, 48, [40, 160, 40]); 3];
        let analysis = Analysis::new(PipelineConfig::default());
        let err = analysis
            .run_with(
                &frames,
                RecordedDetections::default(),
                Precomputed {
                    tracks: Some(TrackStore::with_frames(3)),
                    camera_movement: Some(CameraMovement::zero(2)),
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::FrameCountMismatch {
                stage: "camera movement",
                expected: 3,
                got: 2
            }
        ));
    }
}
