//! Perspective projection from stabilised pixel positions onto the pitch plane.

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::ViewError;
use crate::tracks::{ObjectClass, Point, TrackStore};

/// Calibration of the visible pitch section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Pixel corners: bottom-left, top-left, top-right, bottom-right.
    pub pixel_vertices: [[f64; 2]; 4],
    /// Metres covered along the image's vertical direction.
    pub pitch_width: f64,
    /// Metres covered along the image's horizontal direction.
    pub pitch_length: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            pixel_vertices: [[110.0, 1035.0], [265.0, 275.0], [910.0, 260.0], [1640.0, 915.0]],
            pitch_width: 68.0,
            pitch_length: 23.32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewTransformer {
    pixel_vertices: [Point; 4],
    homography: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

impl ViewTransformer {
    pub fn new(config: &ViewConfig) -> Result<Self, ViewError> {
        let pixel_vertices = config.pixel_vertices.map(|[x, y]| Point::new(x, y));
        if polygon_area(&pixel_vertices).abs() < 1.0 {
            return Err(ViewError::Degenerate);
        }
        let target_vertices = [
            Point::new(0.0, config.pitch_width),
            Point::new(0.0, 0.0),
            Point::new(config.pitch_length, 0.0),
            Point::new(config.pitch_length, config.pitch_width),
        ];

        let homography = perspective_transform(&pixel_vertices, &target_vertices)?;
        let inverse = homography.try_inverse().ok_or(ViewError::Degenerate)?;
        Ok(Self {
            pixel_vertices,
            homography,
            inverse,
        })
    }

    /// Pitch coordinates of a pixel, or `None` outside the calibrated area.
    pub fn transform_point(&self, point: Point) -> Option<Point> {
        if !contains(&self.pixel_vertices, point) {
            return None;
        }
        apply(&self.homography, point)
    }

    /// Pixel position of a pitch coordinate.
    pub fn inverse_transform(&self, point: Point) -> Option<Point> {
        apply(&self.inverse, point)
    }

    /// Fill `transformed_position` from `adjusted_position` for every class.
    pub fn add_transformed_position_to_tracks(&self, store: &mut TrackStore) {
        for class in ObjectClass::ALL {
            store.par_visit_mut(class, |_, _, obs| {
                obs.transformed_position =
                    obs.adjusted_position.and_then(|p| self.transform_point(p));
            });
        }
    }
}

/// Solve the 3x3 homography (h33 = 1) taking `src[i]` onto `dst[i]`.
fn perspective_transform(src: &[Point; 4], dst: &[Point; 4]) -> Result<Matrix3<f64>, ViewError> {
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for (i, (s, d)) in src.iter().zip(dst).enumerate() {
        let (r, c) = (2 * i, 2 * i + 1);
        a.row_mut(r)
            .copy_from_slice(&[s.x, s.y, 1.0, 0.0, 0.0, 0.0, -d.x * s.x, -d.x * s.y]);
        a.row_mut(c)
            .copy_from_slice(&[0.0, 0.0, 0.0, s.x, s.y, 1.0, -d.y * s.x, -d.y * s.y]);
        b[r] = d.x;
        b[c] = d.y;
    }

    let h = a.lu().solve(&b).ok_or(ViewError::Degenerate)?;
    if h.iter().any(|v| !v.is_finite()) {
        return Err(ViewError::Degenerate);
    }
    Ok(Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0))
}

fn apply(matrix: &Matrix3<f64>, point: Point) -> Option<Point> {
    let p = matrix * Vector3::new(point.x, point.y, 1.0);
    if p.z.abs() < f64::EPSILON {
        return None;
    }
    Some(Point::new(p.x / p.z, p.y / p.z))
}

/// Signed shoelace area.
fn polygon_area(polygon: &[Point]) -> f64 {
    let n = polygon.len();
    (0..n)
        .map(|i| {
            let (a, b) = (polygon[i], polygon[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        / 2.0
}

/// Point-in-polygon test; points on an edge count as inside.
fn contains(polygon: &[Point], point: Point) -> bool {
    let n = polygon.len();
    let mut inside = false;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];

        let cross = (b.x - a.x) * (point.y - a.y) - (b.y - a.y) * (point.x - a.x);
        let within_x = point.x >= a.x.min(b.x) - 1e-9 && point.x <= a.x.max(b.x) + 1e-9;
        let within_y = point.y >= a.y.min(b.y) - 1e-9 && point.y <= a.y.max(b.y) + 1e-9;
        if cross.abs() < 1e-9 && within_x && within_y {
            return true;
        }

        if (a.y > point.y) != (b.y > point.y) {
            let x_at = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if point.x < x_at {
                inside = !inside;
            }
        }
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::BBox;
    use crate::tracks::Observation;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_corners_map_to_pitch_rectangle() {
        let config = ViewConfig::default();
        let view = ViewTransformer::new(&config).unwrap();
        let expected = [[0.0, 68.0], [0.0, 0.0], [23.32, 0.0], [23.32, 68.0]];
        for ([px, py], [ex, ey]) in config.pixel_vertices.iter().zip(expected) {
            let p = view.transform_point(Point::new(*px, *py)).unwrap();
            assert_abs_diff_eq!(p.x, ex, epsilon = 1e-6);
            assert_abs_diff_eq!(p.y, ey, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_round_trip_through_pixels() {
        let view = ViewTransformer::new(&ViewConfig::default()).unwrap();
        let pitch = Point::new(11.0, 30.0);
        let pixel = view.inverse_transform(pitch).unwrap();
        let back = view.transform_point(pixel).unwrap();
        assert_abs_diff_eq!(back.x, pitch.x, epsilon = 1e-6);
        assert_abs_diff_eq!(back.y, pitch.y, epsilon = 1e-6);
    }

    #[test]
    fn test_outside_points_are_dropped() {
        let view = ViewTransformer::new(&ViewConfig::default()).unwrap();
        assert!(view.transform_point(Point::new(5.0, 5.0)).is_none());
        assert!(view.transform_point(Point::new(900.0, 600.0)).is_some());
    }

    #[test]
    fn test_degenerate_quad_is_rejected() {
        let config = ViewConfig {
            pixel_vertices: [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]],
            ..ViewConfig::default()
        };
        assert_eq!(ViewTransformer::new(&config).err(), Some(ViewError::Degenerate));
    }

    #[test]
    fn test_store_positions_are_transformed() {
        let config = ViewConfig {
            pixel_vertices: [[0.0, 100.0], [0.0, 0.0], [200.0, 0.0], [200.0, 100.0]],
            pitch_width: 10.0,
            pitch_length: 20.0,
        };
        let view = ViewTransformer::new(&config).unwrap();
        let mut store = TrackStore::with_frames(1);
        let mut inside = Observation::new(BBox::default());
        inside.adjusted_position = Some(Point::new(50.0, 40.0));
        let mut outside = Observation::new(BBox::default());
        outside.adjusted_position = Some(Point::new(250.0, 40.0));
        store.referees[0].insert(1, inside);
        store.referees[0].insert(2, outside);

        view.add_transformed_position_to_tracks(&mut store);

        let p = store.referees[0][&1].transformed_position.unwrap();
        assert_abs_diff_eq!(p.x, 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y, 4.0, epsilon = 1e-9);
        assert_eq!(store.referees[0][&2].transformed_position, None);
    }
}
