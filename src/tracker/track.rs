//! A single tracklet followed by the association tracker.

use crate::integration::Detection;
use crate::tracker::bbox::BBox;
use crate::tracker::kalman_filter::{KalmanFilter, Measurement, StateCovariance, StateMean};
use crate::tracks::{ObjectClass, TrackId};

/// Lifecycle of a tracklet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Created from a detection, not confirmed yet
    #[default]
    New,
    /// Matched in the current frame
    Tracked,
    /// Unmatched, kept for re-identification within the track buffer
    Lost,
}

#[derive(Debug, Clone)]
pub struct Track {
    /// Zero until the track is activated
    pub track_id: TrackId,
    pub class: ObjectClass,
    pub state: TrackState,
    pub is_activated: bool,
    pub score: f32,
    /// Last frame the track was matched in
    pub frame_id: u32,
    pub start_frame: u32,
    kalman: Option<(StateMean, StateCovariance)>,
    /// Box of the most recent matched detection
    detection_box: BBox,
}

impl Track {
    pub fn new(bbox: BBox, score: f32, class: ObjectClass) -> Self {
        Self {
            track_id: 0,
            class,
            state: TrackState::New,
            is_activated: false,
            score,
            frame_id: 0,
            start_frame: 0,
            kalman: None,
            detection_box: bbox,
        }
    }

    pub fn from_detection(detection: &Detection) -> Self {
        Self::new(
            detection.bbox,
            detection.confidence,
            detection.class.object_class(),
        )
    }

    /// Kalman estimate of the box, or the detection box before activation.
    pub fn predicted_box(&self) -> BBox {
        match &self.kalman {
            Some((mean, _)) => BBox::from_xyah(
                mean[0] as f32,
                mean[1] as f32,
                mean[2] as f32,
                mean[3] as f32,
            ),
            None => self.detection_box,
        }
    }

    /// Box of the detection this track was last matched with.
    pub fn detection_box(&self) -> BBox {
        self.detection_box
    }

    pub fn end_frame(&self) -> u32 {
        self.frame_id
    }

    /// Start a new tracklet with a freshly allocated id.
    pub fn activate(&mut self, kalman_filter: &KalmanFilter, frame_id: u32, track_id: TrackId) {
        self.track_id = track_id;
        self.kalman = Some(kalman_filter.initiate(&measure(&self.detection_box)));
        self.state = TrackState::Tracked;
        // Only tracks born in the very first frame are confirmed immediately.
        self.is_activated = frame_id == 1;
        self.frame_id = frame_id;
        self.start_frame = frame_id;
    }

    /// Resume a lost tracklet with a new detection.
    pub fn re_activate(&mut self, detection: &Track, kalman_filter: &KalmanFilter, frame_id: u32) {
        self.correct(detection, kalman_filter);
        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.frame_id = frame_id;
    }

    /// Continue a tracked tracklet with a new detection.
    pub fn update(&mut self, detection: &Track, kalman_filter: &KalmanFilter, frame_id: u32) {
        self.correct(detection, kalman_filter);
        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.frame_id = frame_id;
    }

    fn correct(&mut self, detection: &Track, kalman_filter: &KalmanFilter) {
        if let Some((mean, cov)) = &self.kalman {
            self.kalman = Some(kalman_filter.update(mean, cov, &measure(&detection.detection_box)));
        }
        self.detection_box = detection.detection_box;
        self.score = detection.score;
    }

    pub fn predict(&mut self, kalman_filter: &KalmanFilter) {
        if let Some((mean, cov)) = &self.kalman {
            let mut mean = *mean;
            if self.state != TrackState::Tracked {
                // height velocity is frozen while the track is not being observed
                mean[7] = 0.0;
            }
            self.kalman = Some(kalman_filter.predict(&mean, cov));
        }
    }

    pub fn mark_lost(&mut self) {
        self.state = TrackState::Lost;
    }
}

fn measure(bbox: &BBox) -> Measurement {
    let [cx, cy, a, h] = bbox.to_xyah();
    Measurement::new(cx as f64, cy as f64, a as f64, h as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_assigns_id_and_state() {
        let kf = KalmanFilter::new();
        let mut track = Track::new(BBox::new(0.0, 0.0, 10.0, 20.0), 0.9, ObjectClass::Player);
        assert_eq!(track.predicted_box(), track.detection_box());

        track.activate(&kf, 1, 7);
        assert_eq!(track.track_id, 7);
        assert_eq!(track.state, TrackState::Tracked);
        assert!(track.is_activated);

        let mut later = Track::new(BBox::new(0.0, 0.0, 10.0, 20.0), 0.9, ObjectClass::Referee);
        later.activate(&kf, 4, 8);
        assert!(!later.is_activated);
    }

    #[test]
    fn test_update_keeps_detection_box() {
        let kf = KalmanFilter::new();
        let mut track = Track::new(BBox::new(0.0, 0.0, 10.0, 20.0), 0.9, ObjectClass::Player);
        track.activate(&kf, 1, 1);
        track.predict(&kf);

        let detection = Track::new(BBox::new(2.0, 0.0, 12.0, 20.0), 0.8, ObjectClass::Player);
        track.update(&detection, &kf, 2);
        assert_eq!(track.detection_box(), BBox::new(2.0, 0.0, 12.0, 20.0));
        assert_eq!(track.score, 0.8);
        assert_eq!(track.frame_id, 2);
    }
}
