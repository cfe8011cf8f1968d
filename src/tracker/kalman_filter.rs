//! Constant-velocity Kalman filter over XYAH box state.
//!
//! State is `[cx, cy, a, h, vx, vy, va, vh]`; measurements are `[cx, cy, a, h]`.

use nalgebra::{SMatrix, SVector};

pub type StateMean = SVector<f64, 8>;
pub type StateCovariance = SMatrix<f64, 8, 8>;
pub type Measurement = SVector<f64, 4>;

type MeasurementCovariance = SMatrix<f64, 4, 4>;
type UpdateMatrix = SMatrix<f64, 4, 8>;

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: StateCovariance,
    update_mat: UpdateMatrix,
    std_weight_position: f64,
    std_weight_velocity: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let mut motion_mat = StateCovariance::identity();
        for i in 0..4 {
            motion_mat[(i, 4 + i)] = 1.0;
        }

        let mut update_mat = UpdateMatrix::zeros();
        for i in 0..4 {
            update_mat[(i, i)] = 1.0;
        }

        Self {
            motion_mat,
            update_mat,
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    /// Create a track state from an unassociated XYAH measurement.
    pub fn initiate(&self, measurement: &Measurement) -> (StateMean, StateCovariance) {
        let mut mean = StateMean::zeros();
        mean.fixed_rows_mut::<4>(0).copy_from(measurement);

        let h = measurement[3];
        let pos = 2.0 * self.std_weight_position * h;
        let vel = 10.0 * self.std_weight_velocity * h;
        let std = [pos, pos, 1e-2, pos, vel, vel, 1e-5, vel];

        (mean, state_noise(&std))
    }

    pub fn predict(
        &self,
        mean: &StateMean,
        covariance: &StateCovariance,
    ) -> (StateMean, StateCovariance) {
        let h = mean[3];
        let pos = self.std_weight_position * h;
        let vel = self.std_weight_velocity * h;
        let motion_cov = state_noise(&[pos, pos, 1e-2, pos, vel, vel, 1e-5, vel]);

        let mean = self.motion_mat * mean;
        let covariance = self.motion_mat * covariance * self.motion_mat.transpose() + motion_cov;
        (mean, covariance)
    }

    /// Project the state into measurement space.
    pub fn project(
        &self,
        mean: &StateMean,
        covariance: &StateCovariance,
    ) -> (Measurement, MeasurementCovariance) {
        let h = mean[3];
        let pos = self.std_weight_position * h;
        let innovation_cov = measurement_noise(&[pos, pos, 1e-1, pos]);

        let mean = self.update_mat * mean;
        let covariance =
            self.update_mat * covariance * self.update_mat.transpose() + innovation_cov;
        (mean, covariance)
    }

    /// Correct the state with a measurement.
    ///
    /// If the innovation covariance is singular the prediction is returned unchanged.
    pub fn update(
        &self,
        mean: &StateMean,
        covariance: &StateCovariance,
        measurement: &Measurement,
    ) -> (StateMean, StateCovariance) {
        let (projected_mean, projected_cov) = self.project(mean, covariance);
        let Some(projected_inv) = projected_cov.try_inverse() else {
            return (*mean, *covariance);
        };

        let kalman_gain = covariance * self.update_mat.transpose() * projected_inv;
        let innovation = measurement - projected_mean;

        let mean = mean + kalman_gain * innovation;
        let covariance = covariance - kalman_gain * projected_cov * kalman_gain.transpose();
        (mean, covariance)
    }
}

fn state_noise(std: &[f64; 8]) -> StateCovariance {
    StateCovariance::from_diagonal(&SVector::<f64, 8>::from_fn(|i, _| std[i] * std[i]))
}

fn measurement_noise(std: &[f64; 4]) -> MeasurementCovariance {
    MeasurementCovariance::from_diagonal(&Measurement::from_fn(|i, _| std[i] * std[i]))
}
