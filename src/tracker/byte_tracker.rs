//! BYTE association: two-stage matching of high- and low-confidence detections.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::integration::Detection;
use crate::tracker::bbox::iou_batch;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, AssignmentResult};
use crate::tracker::track::{Track, TrackState};
use crate::tracks::TrackId;

/// Configuration for the [`ByteTracker`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Detections at or above this score take part in the first association.
    pub track_thresh: f32,
    /// Maximum fused IoU cost accepted in the first association.
    pub match_thresh: f32,
    /// Frames (at 30 fps) a lost track is kept for re-identification.
    pub track_buffer: u32,
    pub frame_rate: f32,
    /// Detections at or below this score are discarded outright.
    pub low_score_floor: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            track_thresh: 0.5,
            match_thresh: 0.8,
            track_buffer: 30,
            frame_rate: 30.0,
            low_score_floor: 0.1,
        }
    }
}

pub struct ByteTracker {
    tracked: Vec<Track>,
    lost: Vec<Track>,
    frame_id: u32,
    next_id: TrackId,
    config: TrackerConfig,
    max_time_lost: u32,
    kalman_filter: KalmanFilter,
}

impl ByteTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let max_time_lost = (config.frame_rate / 30.0 * config.track_buffer as f32) as u32;
        Self {
            tracked: Vec::new(),
            lost: Vec::new(),
            frame_id: 0,
            next_id: 1,
            config,
            max_time_lost,
            kalman_filter: KalmanFilter::default(),
        }
    }

    /// Feed one frame of detections; returns the confirmed tracks matched in this frame.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<Track> {
        self.frame_id += 1;
        let frame_id = self.frame_id;

        let (high, low): (Vec<Track>, Vec<Track>) = detections
            .iter()
            .filter(|d| d.confidence > self.config.low_score_floor)
            .map(Track::from_detection)
            .partition(|t| t.score >= self.config.track_thresh);

        let (confirmed, mut unconfirmed): (Vec<Track>, Vec<Track>) =
            std::mem::take(&mut self.tracked)
                .into_iter()
                .partition(|t| t.is_activated);

        let mut pool = join_tracks(confirmed, &self.lost);
        for track in pool.iter_mut() {
            track.predict(&self.kalman_filter);
        }

        let mut activated = Vec::new();
        let mut refound = Vec::new();

        // First association: high-confidence detections against every known track.
        let mut cost = matching::iou_distance(&pool, &high);
        matching::fuse_score(&mut cost, &high);
        let first = matching::linear_assignment(&cost, self.config.match_thresh);
        for &(itrack, idet) in &first.matches {
            let track = pool[itrack].clone();
            self.absorb(track, &high[idet], &mut activated, &mut refound);
        }

        // Second association: low-confidence detections against tracks still unmatched.
        let remaining: Vec<Track> = first
            .unmatched_tracks
            .iter()
            .map(|&i| &pool[i])
            .filter(|t| t.state == TrackState::Tracked)
            .cloned()
            .collect();
        let cost = matching::iou_distance(&remaining, &low);
        let second = matching::linear_assignment(&cost, 0.5);
        for &(itrack, idet) in &second.matches {
            let track = remaining[itrack].clone();
            self.absorb(track, &low[idet], &mut activated, &mut refound);
        }

        let mut lost: Vec<Track> = second
            .unmatched_tracks
            .iter()
            .map(|&i| {
                let mut track = remaining[i].clone();
                track.mark_lost();
                track
            })
            .collect();

        // Unconfirmed tracks only get one chance, against leftover high detections.
        let leftovers: Vec<Track> = first
            .unmatched_detections
            .iter()
            .map(|&i| high[i].clone())
            .collect();
        let mut cost = matching::iou_distance(&unconfirmed, &leftovers);
        matching::fuse_score(&mut cost, &leftovers);
        let AssignmentResult {
            matches,
            unmatched_detections,
            ..
        } = matching::linear_assignment(&cost, 0.7);
        for (itrack, idet) in matches {
            unconfirmed[itrack].update(&leftovers[idet], &self.kalman_filter, frame_id);
            activated.push(unconfirmed[itrack].clone());
        }

        // Whatever is left and confident enough starts a new track.
        for idet in unmatched_detections {
            let mut track = leftovers[idet].clone();
            if track.score < self.config.track_thresh + 0.1 {
                continue;
            }
            let id = self.allocate_id();
            track.activate(&self.kalman_filter, frame_id, id);
            activated.push(track);
        }

        for track in self.lost.drain(..) {
            if frame_id - track.end_frame() <= self.max_time_lost {
                lost.push(track);
            } else {
                trace!(track_id = track.track_id, "dropping expired track");
            }
        }

        self.tracked = activated
            .into_iter()
            .chain(refound)
            .filter(|t| t.state == TrackState::Tracked)
            .collect();
        let lost = subtract_tracks(lost, &self.tracked);

        let (tracked, lost) = remove_duplicate_tracks(&self.tracked, &lost);
        self.tracked = tracked;
        self.lost = lost;

        self.tracked
            .iter()
            .filter(|t| t.is_activated)
            .cloned()
            .collect()
    }

    fn absorb(
        &self,
        mut track: Track,
        detection: &Track,
        activated: &mut Vec<Track>,
        refound: &mut Vec<Track>,
    ) {
        if track.state == TrackState::Tracked {
            track.update(detection, &self.kalman_filter, self.frame_id);
            activated.push(track);
        } else {
            track.re_activate(detection, &self.kalman_filter, self.frame_id);
            refound.push(track);
        }
    }

    fn allocate_id(&mut self) -> TrackId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn join_tracks(first: Vec<Track>, second: &[Track]) -> Vec<Track> {
    let mut seen: HashSet<TrackId> = first.iter().map(|t| t.track_id).collect();
    let mut joined = first;
    joined.extend(second.iter().filter(|t| seen.insert(t.track_id)).cloned());
    joined
}

fn subtract_tracks(tracks: Vec<Track>, exclude: &[Track]) -> Vec<Track> {
    let excluded: HashSet<TrackId> = exclude.iter().map(|t| t.track_id).collect();
    tracks
        .into_iter()
        .filter(|t| !excluded.contains(&t.track_id))
        .collect()
}

/// Resolve tracked/lost pairs that overlap almost completely, keeping the older one.
fn remove_duplicate_tracks(tracked: &[Track], lost: &[Track]) -> (Vec<Track>, Vec<Track>) {
    if tracked.is_empty() || lost.is_empty() {
        return (tracked.to_vec(), lost.to_vec());
    }

    let tracked_boxes: Vec<_> = tracked.iter().map(Track::predicted_box).collect();
    let lost_boxes: Vec<_> = lost.iter().map(Track::predicted_box).collect();
    let ious = iou_batch(&tracked_boxes, &lost_boxes);

    let mut drop_tracked = vec![false; tracked.len()];
    let mut drop_lost = vec![false; lost.len()];
    for ((i, j), &iou) in ious.indexed_iter() {
        if iou <= 0.85 || tracked[i].class != lost[j].class {
            continue;
        }
        let age_tracked = tracked[i].frame_id - tracked[i].start_frame;
        let age_lost = lost[j].frame_id - lost[j].start_frame;
        if age_tracked > age_lost {
            drop_lost[j] = true;
        } else {
            drop_tracked[i] = true;
        }
    }

    let keep = |tracks: &[Track], dropped: &[bool]| -> Vec<Track> {
        tracks
            .iter()
            .zip(dropped)
            .filter(|(_, d)| !**d)
            .map(|(t, _)| t.clone())
            .collect()
    };
    (keep(tracked, &drop_tracked), keep(lost, &drop_lost))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::DetectedClass;

    #[test]
    fn test_ids_are_per_tracker() {
        let dets = vec![Detection::new(DetectedClass::Player, 0.0, 0.0, 10.0, 20.0, 0.9)];

        let mut first = ByteTracker::new(TrackerConfig::default());
        let mut second = ByteTracker::new(TrackerConfig::default());
        assert_eq!(first.update(&dets)[0].track_id, 1);
        assert_eq!(second.update(&dets)[0].track_id, 1);
    }

    #[test]
    fn test_low_scores_below_floor_are_ignored() {
        let mut tracker = ByteTracker::new(TrackerConfig::default());
        let dets = vec![Detection::new(DetectedClass::Player, 0.0, 0.0, 10.0, 20.0, 0.05)];
        assert!(tracker.update(&dets).is_empty());
    }
}
