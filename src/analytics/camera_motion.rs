//! Camera motion estimation from background feature flow, and position stabilisation.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analytics::optical_flow::{self, FeatureParams, FlowParams};
use crate::frame::Frame;
use crate::tracks::{ObjectClass, Point, TrackStore};

/// Parameters of the [`CameraMotionEstimator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraMotionConfig {
    /// Displacements up to this many pixels are treated as noise.
    pub minimum_distance: f64,
    /// Fewer tracked background points than this reports no motion.
    pub min_features: usize,
    pub max_corners: usize,
    pub quality_level: f64,
    pub min_feature_distance: f64,
    pub block_size: usize,
    /// Column ranges `[start, end)` unlikely to contain players.
    pub feature_bands: Vec<(usize, usize)>,
    pub window_size: usize,
    pub max_level: usize,
    pub max_iterations: usize,
    pub epsilon: f64,
}

impl Default for CameraMotionConfig {
    fn default() -> Self {
        Self {
            minimum_distance: 5.0,
            min_features: 3,
            max_corners: 100,
            quality_level: 0.3,
            min_feature_distance: 3.0,
            block_size: 7,
            feature_bands: vec![(0, 20), (900, 1050)],
            window_size: 15,
            max_level: 2,
            max_iterations: 10,
            epsilon: 0.03,
        }
    }
}

/// Per-frame camera displacement.
///
/// Entry `i` is the background motion observed when frame `i` was compared
/// with the current reference frame; frame 0 is always zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraMovement {
    per_frame: Vec<Point>,
}

impl CameraMovement {
    pub fn new(per_frame: Vec<Point>) -> Self {
        Self { per_frame }
    }

    /// No motion over `frames` frames.
    pub fn zero(frames: usize) -> Self {
        Self::new(vec![Point::default(); frames])
    }

    pub fn len(&self) -> usize {
        self.per_frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_frame.is_empty()
    }

    pub fn per_frame(&self) -> &[Point] {
        &self.per_frame
    }

    /// Displacement accumulated from frame 0 up to and including each frame.
    pub fn cumulative(&self) -> Vec<Point> {
        self.per_frame
            .iter()
            .scan(Point::default(), |total, step| {
                *total = *total + *step;
                Some(*total)
            })
            .collect()
    }
}

pub struct CameraMotionEstimator {
    config: CameraMotionConfig,
    features: FeatureParams,
    flow: FlowParams,
}

impl CameraMotionEstimator {
    pub fn new(config: CameraMotionConfig) -> Self {
        let features = FeatureParams {
            max_corners: config.max_corners,
            quality_level: config.quality_level,
            min_distance: config.min_feature_distance,
            block_size: config.block_size,
        };
        let flow = FlowParams {
            window_size: config.window_size,
            max_level: config.max_level,
            max_iterations: config.max_iterations,
            epsilon: config.epsilon,
        };
        Self {
            config,
            features,
            flow,
        }
    }

    /// Estimate the camera movement record for a whole video.
    pub fn get_camera_movement(&self, frames: &[Frame]) -> CameraMovement {
        let mut record = vec![Point::default(); frames.len()];
        let Some(first) = frames.first() else {
            return CameraMovement::new(record);
        };

        let mut reference = first.to_gray();
        let mut features = self.seed_features(&reference);

        for (index, frame) in frames.iter().enumerate().skip(1) {
            let gray = frame.to_gray();
            if features.len() < self.config.min_features {
                debug!(
                    frame = index,
                    found = features.len(),
                    "too few background features, re-seeding"
                );
                features = self.seed_features(&gray);
                reference = gray;
                continue;
            }

            match self.largest_displacement(&reference, &gray, &features) {
                Some(displacement) if displacement.norm() > self.config.minimum_distance => {
                    record[index] = displacement;
                    features = self.seed_features(&gray);
                    reference = gray;
                }
                // Below the noise floor: keep the reference so slow pans still add up.
                Some(_) => {}
                None => {
                    debug!(frame = index, "background features lost, re-seeding");
                    features = self.seed_features(&gray);
                    reference = gray;
                }
            }
        }

        let moving = record.iter().filter(|p| p.norm() > 0.0).count();
        info!(frames = frames.len(), moving_frames = moving, "estimated camera movement");
        CameraMovement::new(record)
    }

    fn seed_features(&self, gray: &ndarray::Array2<f32>) -> Vec<Point> {
        optical_flow::good_features_to_track(gray, &self.features, &self.config.feature_bands)
    }

    /// Displacement (new - old) of the tracked feature that moved the most.
    fn largest_displacement(
        &self,
        reference: &ndarray::Array2<f32>,
        current: &ndarray::Array2<f32>,
        features: &[Point],
    ) -> Option<Point> {
        let tracked = optical_flow::calc_optical_flow(reference, current, features, &self.flow);
        let moves: Vec<Point> = features
            .iter()
            .zip(tracked)
            .filter_map(|(old, new)| new.map(|new| new - *old))
            .collect();
        if moves.len() < self.config.min_features {
            return None;
        }
        moves.into_iter().max_by(|a, b| a.norm().total_cmp(&b.norm()))
    }
}

/// `adjusted_position = position - cumulative camera displacement`, for every class.
pub fn add_adjust_positions_to_tracks(store: &mut TrackStore, movement: &CameraMovement) {
    let cumulative = movement.cumulative();
    for class in ObjectClass::ALL {
        store.par_visit_mut(class, |frame, _, obs| {
            let offset = cumulative.get(frame).copied().unwrap_or_default();
            obs.adjusted_position = obs.position.map(|p| p - offset);
        });
    }
}
