//! Cost matrices and linear assignment for track/detection association.

use ndarray::Array2;

use crate::tracker::track::Track;

/// IoU distance (`1 - IoU`) between tracks and detections.
///
/// Pairs of different object classes get the maximum cost so a referee
/// detection can never continue a player track and vice versa.
pub fn iou_distance(tracks: &[Track], detections: &[Track]) -> Array2<f32> {
    let track_boxes: Vec<_> = tracks.iter().map(Track::predicted_box).collect();
    let det_boxes: Vec<_> = detections.iter().map(Track::predicted_box).collect();
    Array2::from_shape_fn((tracks.len(), detections.len()), |(i, j)| {
        if tracks[i].class != detections[j].class {
            1.0
        } else {
            1.0 - track_boxes[i].iou(&det_boxes[j])
        }
    })
}

/// Weight IoU similarity by detection confidence.
pub fn fuse_score(cost_matrix: &mut Array2<f32>, detections: &[Track]) {
    for ((_, j), cost) in cost_matrix.indexed_iter_mut() {
        let fused_sim = (1.0 - *cost) * detections[j].score;
        *cost = 1.0 - fused_sim;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Solve the rectangular assignment problem, rejecting pairs costlier than `thresh`.
pub fn linear_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    // lapjv needs a square matrix; padding cells are never worth taking.
    let size = num_rows.max(num_cols);
    let padded = Array2::<f64>::from_shape_fn((size, size), |(i, j)| {
        if i < num_rows && j < num_cols {
            cost_matrix[[i, j]] as f64
        } else {
            1e6
        }
    });

    let mut result = AssignmentResult::default();
    let mut detection_free = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row, &col) in row_to_col.iter().enumerate().take(num_rows) {
                if col < num_cols && cost_matrix[[row, col]] <= thresh {
                    result.matches.push((row, col));
                    detection_free[col] = false;
                } else {
                    result.unmatched_tracks.push(row);
                }
            }
        }
        Err(_) => result.unmatched_tracks = (0..num_rows).collect(),
    }

    result.unmatched_detections = detection_free
        .iter()
        .enumerate()
        .filter_map(|(i, &free)| free.then_some(i))
        .collect();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::BBox;
    use crate::tracks::ObjectClass;

    fn track(left: f32, class: ObjectClass) -> Track {
        Track::new(BBox::new(left, 0.0, left + 10.0, 20.0), 0.9, class)
    }

    #[test]
    fn test_iou_distance_gates_classes() {
        let tracks = vec![track(0.0, ObjectClass::Player)];
        let dets = vec![track(0.0, ObjectClass::Referee), track(0.0, ObjectClass::Player)];
        let dists = iou_distance(&tracks, &dets);
        assert_eq!(dists[[0, 0]], 1.0);
        assert!(dists[[0, 1]].abs() < 1e-6);
    }

    #[test]
    fn test_linear_assignment_threshold() {
        let cost = ndarray::array![[0.1_f32, 0.9], [0.9, 0.95]];
        let result = linear_assignment(&cost, 0.5);
        assert_eq!(result.matches, vec![(0, 0)]);
        assert_eq!(result.unmatched_tracks, vec![1]);
        assert_eq!(result.unmatched_detections, vec![1]);
    }

    #[test]
    fn test_linear_assignment_empty() {
        let cost = Array2::<f32>::zeros((0, 3));
        let result = linear_assignment(&cost, 0.5);
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_detections, vec![0, 1, 2]);
    }
}
