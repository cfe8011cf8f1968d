//! Per-track speed and cumulative distance on the pitch plane.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tracks::{AsObservation, FrameTracks, ObjectClass, TrackId, TrackStore};

/// Total metres covered per track, per class.
pub type DistanceReport = BTreeMap<ObjectClass, BTreeMap<TrackId, f64>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    /// Frames per measurement window.
    pub frame_window: usize,
    pub frame_rate: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            frame_window: 5,
            frame_rate: 24.0,
        }
    }
}

/// Windowed speed (km/h) and cumulative distance (m) from pitch coordinates.
pub struct SpeedDistanceEstimator {
    frame_window: usize,
    frame_rate: f64,
}

impl SpeedDistanceEstimator {
    /// Estimator over `frame_window`-frame windows at `frame_rate`.
    pub fn new(config: &SpeedConfig) -> Self {
        Self {
            frame_window: config.frame_window.max(1),
            frame_rate: config.frame_rate,
        }
    }

    /// Annotate players and referees; the ball is left untouched.
    pub fn add_speed_and_distance_to_tracks(&self, store: &mut TrackStore) -> DistanceReport {
        let mut report = DistanceReport::new();
        report.insert(ObjectClass::Player, self.estimate(&mut store.players));
        report.insert(ObjectClass::Referee, self.estimate(&mut store.referees));
        debug!(
            players = report[&ObjectClass::Player].len(),
            referees = report[&ObjectClass::Referee].len(),
            "estimated speed and distance"
        );
        report
    }

    fn estimate<T: AsObservation>(&self, frames: &mut [FrameTracks<T>]) -> BTreeMap<TrackId, f64> {
        let n = frames.len();
        let mut observed: HashMap<TrackId, usize> = HashMap::new();
        for id in frames.iter().flat_map(|f| f.keys()) {
            *observed.entry(*id).or_default() += 1;
        }

        let mut totals = BTreeMap::new();
        for start in (0..n).step_by(self.frame_window) {
            let end = (start + self.frame_window).min(n - 1);
            if end <= start {
                continue;
            }
            let elapsed = (end - start) as f64 / self.frame_rate;
            let last = if end == n - 1 { end + 1 } else { end };

            let ids: Vec<TrackId> = frames[start].keys().copied().collect();
            for id in ids {
                if observed.get(&id).copied().unwrap_or(0) < self.frame_window {
                    continue;
                }
                let Some(end_obs) = frames[end].get(&id) else {
                    continue;
                };
                let end_pos = end_obs.observation().transformed_position;
                let start_pos = frames[start][&id].observation().transformed_position;

                let distance = match (start_pos, end_pos) {
                    (Some(a), Some(b)) => a.distance_to(b),
                    _ => 0.0,
                };
                let speed = distance / elapsed * 3.6;
                let total = totals.entry(id).or_insert(0.0);
                *total += distance;
                let total = *total;

                for frame in &mut frames[start..last] {
                    if let Some(track) = frame.get_mut(&id) {
                        let obs = track.observation_mut();
                        obs.speed = Some(speed);
                        obs.distance = Some(total);
                    }
                }
            }
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::BBox;
    use crate::tracks::{Observation, Point};
    use approx::assert_abs_diff_eq;

    fn referee_at(x: f64) -> Observation {
        let mut obs = Observation::new(BBox::default());
        obs.transformed_position = Some(Point::new(x, 0.0));
        obs
    }

    #[test]
    fn test_distance_is_monotone_and_speed_matches() {
        let mut store = TrackStore::with_frames(11);
        for frame in 0..11 {
            store.referees[frame].insert(7, referee_at(frame as f64 * 0.5));
        }
        let estimator = SpeedDistanceEstimator::new(&SpeedConfig::default());
        let report = estimator.add_speed_and_distance_to_tracks(&mut store);

        let distances: Vec<f64> = store.referees.iter().map(|f| f[&7].distance.unwrap()).collect();
        assert!(distances.windows(2).all(|w| w[1] >= w[0]));
        assert_abs_diff_eq!(report[&ObjectClass::Referee][&7], 5.0, epsilon = 1e-9);
        // 2.5 m in 5 frames at 24 fps.
        assert_abs_diff_eq!(store.referees[0][&7].speed.unwrap(), 43.2, epsilon = 1e-9);
        assert_abs_diff_eq!(store.referees[10][&7].distance.unwrap(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_short_tracks_get_no_values() {
        let mut store = TrackStore::with_frames(10);
        for frame in 0..10 {
            store.referees[frame].insert(1, referee_at(frame as f64));
        }
        for frame in 0..3 {
            store.referees[frame].insert(2, referee_at(frame as f64));
        }
        let estimator = SpeedDistanceEstimator::new(&SpeedConfig::default());
        let report = estimator.add_speed_and_distance_to_tracks(&mut store);

        assert!(!report[&ObjectClass::Referee].contains_key(&2));
        assert!(
            store.referees[..3]
                .iter()
                .all(|f| f[&2].speed.is_none() && f[&2].distance.is_none())
        );
        assert!(store.referees[0][&1].speed.is_some());
    }

    #[test]
    fn test_missing_pitch_position_counts_as_zero() {
        let mut store = TrackStore::with_frames(3);
        store.referees[0].insert(4, referee_at(0.0));
        store.referees[1].insert(4, referee_at(1.0));
        store.referees[2].insert(4, Observation::new(BBox::default()));
        let estimator = SpeedDistanceEstimator::new(&SpeedConfig {
            frame_window: 2,
            frame_rate: 24.0,
        });
        estimator.add_speed_and_distance_to_tracks(&mut store);

        for frame in 0..3 {
            assert_eq!(store.referees[frame][&4].speed, Some(0.0));
            assert_eq!(store.referees[frame][&4].distance, Some(0.0));
        }
    }
}
