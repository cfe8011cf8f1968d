//! Gap filling for tracks that drop out for a few frames.

use tracing::{debug, warn};

use crate::tracker::BBox;
use crate::tracks::{BALL_TRACK_ID, FrameTracks, Observation};

/// Fill the gaps of a box sequence.
///
/// Interior gaps are linearly interpolated per coordinate between the nearest
/// known neighbours. Leading gaps take the first known box and trailing gaps
/// the last one. A sequence with no known box is returned unchanged.
pub fn interpolate_boxes(boxes: &[Option<BBox>]) -> Vec<Option<BBox>> {
    let known: Vec<(usize, BBox)> = boxes
        .iter()
        .enumerate()
        .filter_map(|(i, b)| b.map(|b| (i, b)))
        .collect();

    let (Some(&(first_idx, first)), Some(&(_, last))) = (known.first(), known.last()) else {
        return boxes.to_vec();
    };

    let mut out = Vec::with_capacity(boxes.len());
    let mut next = 0;
    for i in 0..boxes.len() {
        while next < known.len() && known[next].0 < i {
            next += 1;
        }
        let filled = match known.get(next) {
            Some(&(idx, bbox)) if idx == i => bbox,
            _ if i < first_idx => first,
            Some(&(hi_idx, hi)) => {
                let (lo_idx, lo) = known[next - 1];
                let t = (i - lo_idx) as f32 / (hi_idx - lo_idx) as f32;
                lo.lerp(&hi, t)
            }
            None => last,
        };
        out.push(Some(filled));
    }
    out
}

/// Interpolate the ball track over a whole video.
///
/// Frames that already hold a ball observation are kept as they are; filled
/// frames get a fresh observation carrying only the interpolated box.
pub fn interpolate_ball_positions(
    ball: &[FrameTracks<Observation>],
) -> Vec<FrameTracks<Observation>> {
    let boxes: Vec<Option<BBox>> = ball
        .iter()
        .map(|frame| frame.get(&BALL_TRACK_ID).map(|obs| obs.bbox))
        .collect();

    if boxes.iter().all(Option::is_none) {
        if !ball.is_empty() {
            warn!(frames = ball.len(), "no ball detected in any frame, skipping interpolation");
        }
        return ball.to_vec();
    }

    let filled = interpolate_boxes(&boxes);
    let missing = boxes.iter().filter(|b| b.is_none()).count();
    debug!(frames = ball.len(), filled = missing, "interpolated ball positions");

    ball.iter()
        .zip(filled)
        .map(|(frame, bbox)| {
            let mut frame = frame.clone();
            if let Some(bbox) = bbox {
                frame.entry(BALL_TRACK_ID).or_insert_with(|| Observation::new(bbox));
            }
            frame
        })
        .collect()
}
