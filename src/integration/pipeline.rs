//! ObjectTracker: detection plus association, producing the track store.

use tracing::{debug, info};

use crate::error::TrackingError;
use crate::frame::Frame;
use crate::tracker::{ByteTracker, TrackerConfig};
use crate::tracks::{
    BALL_TRACK_ID, FrameTracks, ObjectClass, Observation, PlayerObservation, TrackStore,
};

use super::{Detection, DetectionSource};

/// Objects found in a single frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameObjects {
    pub players: FrameTracks<PlayerObservation>,
    pub referees: FrameTracks<Observation>,
    pub ball: FrameTracks<Observation>,
}

/// Runs a [`DetectionSource`] over every frame and associates the results.
///
/// Players and referees are followed by a [`ByteTracker`]; the ball is not
/// associated, the most confident ball candidate of each frame is kept under
/// [`BALL_TRACK_ID`].
pub struct ObjectTracker<D: DetectionSource> {
    detector: D,
    tracker: ByteTracker,
}

impl<D: DetectionSource> ObjectTracker<D> {
    /// Wrap `detector` with a fresh association tracker.
    pub fn new(detector: D, config: TrackerConfig) -> Self {
        Self {
            detector,
            tracker: ByteTracker::new(config),
        }
    }

    /// Same as [`ObjectTracker::new`] with [`TrackerConfig::default`].
    pub fn with_default_config(detector: D) -> Self {
        Self::new(detector, TrackerConfig::default())
    }

    /// Detect and associate objects in the next frame of the video.
    pub fn track_frame(
        &mut self,
        frame_index: usize,
        frame: &Frame,
    ) -> Result<FrameObjects, TrackingError> {
        let detections = self
            .detector
            .detect(frame)
            .map_err(|e| TrackingError::Detector {
                frame: frame_index,
                message: e.to_string(),
            })?;

        let (balls, people): (Vec<Detection>, Vec<Detection>) = detections
            .into_iter()
            .partition(|d| d.class.object_class() == ObjectClass::Ball);

        let mut objects = FrameObjects::default();
        for track in self.tracker.update(&people) {
            let bbox = track.detection_box();
            match track.class {
                ObjectClass::Player => {
                    objects.players.insert(track.track_id, PlayerObservation::new(bbox));
                }
                ObjectClass::Referee => {
                    objects.referees.insert(track.track_id, Observation::new(bbox));
                }
                ObjectClass::Ball => {}
            }
        }

        if let Some(ball) = balls
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        {
            objects.ball.insert(BALL_TRACK_ID, Observation::new(ball.bbox));
        }

        debug!(
            frame = frame_index,
            players = objects.players.len(),
            referees = objects.referees.len(),
            ball_candidates = balls.len(),
            "tracked frame"
        );
        Ok(objects)
    }

    /// Track every frame, producing a store with one entry per frame and class.
    pub fn get_object_tracks(&mut self, frames: &[Frame]) -> Result<TrackStore, TrackingError> {
        info!(frames = frames.len(), "tracking objects");
        let mut store = TrackStore::default();
        for (frame_index, frame) in frames.iter().enumerate() {
            let objects = self.track_frame(frame_index, frame)?;
            store.players.push(objects.players);
            store.referees.push(objects.referees);
            store.ball.push(objects.ball);
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::DetectedClass;

    struct FailingDetector;

    impl DetectionSource for FailingDetector {
        type Error = &'static str;

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
            Err("inference crashed")
        }
    }

    struct FixedDetector(Vec<Detection>);

    impl DetectionSource for FixedDetector {
        type Error = std::convert::Infallible;

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_detector_failure_is_reported_with_frame() {
        let frames = vec![Frame::filled(8, 8, [0, 0, 0])];
        let mut tracker = ObjectTracker::with_default_config(FailingDetector);
        assert_eq!(
            tracker.get_object_tracks(&frames),
            Err(TrackingError::Detector {
                frame: 0,
                message: "inference crashed".to_string()
            })
        );
    }

    #[test]
    fn test_most_confident_ball_is_kept() {
        let detector = FixedDetector(vec![
            Detection::new(DetectedClass::Ball, 0.0, 0.0, 4.0, 4.0, 0.3),
            Detection::new(DetectedClass::Ball, 50.0, 50.0, 54.0, 54.0, 0.8),
            Detection::new(DetectedClass::Goalkeeper, 10.0, 10.0, 30.0, 60.0, 0.9),
        ]);
        let mut tracker = ObjectTracker::with_default_config(detector);
        let objects = tracker.track_frame(0, &Frame::filled(64, 64, [0, 0, 0])).unwrap();

        assert_eq!(objects.ball.len(), 1);
        assert_eq!(objects.ball[&BALL_TRACK_ID].bbox.left, 50.0);
        assert_eq!(objects.players.len(), 1);
        assert!(objects.referees.is_empty());
    }
}
