//! Sparse optical flow on grayscale frames.
//!
//! Shi-Tomasi corner selection and pyramidal Lucas-Kanade tracking, enough to
//! follow a few dozen background points from one frame to the next. With the
//! `opencv` feature both steps run through OpenCV, falling back to the native
//! implementation when a call fails.

use ndarray::Array2;
#[cfg(feature = "opencv")]
use tracing::warn;

use crate::tracks::Point;

#[cfg(feature = "opencv")]
mod cv;

/// Corner selection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureParams {
    pub max_corners: usize,
    /// Fraction of the strongest corner response a corner must reach.
    pub quality_level: f64,
    /// Minimum pixel distance between returned corners.
    pub min_distance: f64,
    /// Side of the window the structure tensor is summed over.
    pub block_size: usize,
}

/// Lucas-Kanade tracking parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowParams {
    pub window_size: usize,
    /// Number of pyramid levels above full resolution.
    pub max_level: usize,
    pub max_iterations: usize,
    /// Stop iterating once the update is shorter than this (pixels).
    pub epsilon: f64,
}

/// Strongest corners whose column falls inside one of `column_bands` (`[start, end)`).
///
/// Corners are returned strongest first.
pub fn good_features_to_track(
    gray: &Array2<f32>,
    params: &FeatureParams,
    column_bands: &[(usize, usize)],
) -> Vec<Point> {
    #[cfg(feature = "opencv")]
    match cv::good_features_to_track(gray, params, column_bands) {
        Ok(corners) => return corners,
        Err(err) => warn!(%err, "opencv corner selection failed, using native detector"),
    }
    shi_tomasi_corners(gray, params, column_bands)
}

/// Track `points` from `prev` into `next`. `None` marks points that were lost.
pub fn calc_optical_flow(
    prev: &Array2<f32>,
    next: &Array2<f32>,
    points: &[Point],
    params: &FlowParams,
) -> Vec<Option<Point>> {
    #[cfg(feature = "opencv")]
    match cv::calc_optical_flow(prev, next, points, params) {
        Ok(tracked) => return tracked,
        Err(err) => warn!(%err, "opencv optical flow failed, using native tracker"),
    }
    lucas_kanade(prev, next, points, params)
}

fn shi_tomasi_corners(
    gray: &Array2<f32>,
    params: &FeatureParams,
    column_bands: &[(usize, usize)],
) -> Vec<Point> {
    let (height, width) = gray.dim();
    let radius = params.block_size.max(1) / 2;
    let margin = radius + 1;
    if height <= 2 * margin || width <= 2 * margin {
        return Vec::new();
    }

    let (gx, gy) = gradients(gray);
    let sxx = integral(&Array2::from_shape_fn((height, width), |i| gx[i] * gx[i]));
    let sxy = integral(&Array2::from_shape_fn((height, width), |i| gx[i] * gy[i]));
    let syy = integral(&Array2::from_shape_fn((height, width), |i| gy[i] * gy[i]));

    let in_band = |x: usize| column_bands.iter().any(|&(start, end)| x >= start && x < end);

    let mut response = Array2::<f64>::zeros((height, width));
    let mut strongest = 0.0_f64;
    for y in margin..height - margin {
        for x in (margin..width - margin).filter(|&x| in_band(x)) {
            let window = (y - radius, x - radius, y + radius, x + radius);
            let a = box_sum(&sxx, window);
            let b = box_sum(&sxy, window);
            let c = box_sum(&syy, window);
            let min_eigen = ((a + c) - ((a - c).powi(2) + 4.0 * b * b).sqrt()) / 2.0;
            response[[y, x]] = min_eigen;
            strongest = strongest.max(min_eigen);
        }
    }
    if strongest <= 0.0 {
        return Vec::new();
    }

    let threshold = strongest * params.quality_level;
    let mut candidates = Vec::new();
    for y in margin..height - margin {
        for x in margin..width - margin {
            let value = response[[y, x]];
            if value <= 0.0 || value < threshold {
                continue;
            }
            let local_max =
                (y - 1..=y + 1).all(|ny| (x - 1..=x + 1).all(|nx| response[[ny, nx]] <= value));
            if local_max {
                candidates.push((value, x, y));
            }
        }
    }
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    let min_distance_sq = params.min_distance * params.min_distance;
    let mut corners: Vec<Point> = Vec::new();
    for (_, x, y) in candidates {
        if corners.len() >= params.max_corners {
            break;
        }
        let candidate = Point::new(x as f64, y as f64);
        let spaced = corners.iter().all(|c| {
            let d = *c - candidate;
            d.x * d.x + d.y * d.y >= min_distance_sq
        });
        if spaced {
            corners.push(candidate);
        }
    }
    corners
}

fn lucas_kanade(
    prev: &Array2<f32>,
    next: &Array2<f32>,
    points: &[Point],
    params: &FlowParams,
) -> Vec<Option<Point>> {
    let prev_pyramid = pyramid(prev, params.max_level, params.window_size);
    let next_pyramid = pyramid(next, params.max_level, params.window_size);
    let levels = prev_pyramid.len().min(next_pyramid.len());

    points
        .iter()
        .map(|&point| {
            track_point(&prev_pyramid[..levels], &next_pyramid[..levels], point, params)
        })
        .collect()
}

fn track_point(
    prev: &[Array2<f32>],
    next: &[Array2<f32>],
    point: Point,
    params: &FlowParams,
) -> Option<Point> {
    let half = (params.window_size / 2) as i64;
    let mut guess = Point::default();

    for level in (0..prev.len()).rev() {
        let scale = (1_u64 << level) as f64;
        let center = Point::new(point.x / scale, point.y / scale);
        let (prev_img, next_img) = (&prev[level], &next[level]);

        let mut patch = Vec::with_capacity(((2 * half + 1) * (2 * half + 1)) as usize);
        let (mut gxx, mut gxy, mut gyy) = (0.0, 0.0, 0.0);
        for dy in -half..=half {
            for dx in -half..=half {
                let x = center.x + dx as f64;
                let y = center.y + dy as f64;
                let ix = (sample(prev_img, x + 1.0, y) - sample(prev_img, x - 1.0, y)) / 2.0;
                let iy = (sample(prev_img, x, y + 1.0) - sample(prev_img, x, y - 1.0)) / 2.0;
                gxx += ix * ix;
                gxy += ix * iy;
                gyy += iy * iy;
                patch.push((x, y, ix, iy, sample(prev_img, x, y)));
            }
        }

        let n = patch.len() as f64;
        let spread = ((gxx - gyy).powi(2) + 4.0 * gxy * gxy).sqrt();
        let min_eigen = ((gxx + gyy) - spread) / (2.0 * n);
        let det = gxx * gyy - gxy * gxy;
        if min_eigen < 1e-4 || det.abs() < f64::EPSILON {
            return None;
        }

        let mut flow = Point::default();
        for _ in 0..params.max_iterations {
            let (mut bx, mut by) = (0.0, 0.0);
            for &(x, y, ix, iy, value) in &patch {
                let diff = value - sample(next_img, x + guess.x + flow.x, y + guess.y + flow.y);
                bx += diff * ix;
                by += diff * iy;
            }
            let step = Point::new((gyy * bx - gxy * by) / det, (gxx * by - gxy * bx) / det);
            flow = flow + step;
            if step.norm() < params.epsilon {
                break;
            }
        }

        guess = guess + flow;
        if level > 0 {
            guess = Point::new(guess.x * 2.0, guess.y * 2.0);
        }
    }

    let tracked = point + guess;
    let (height, width) = prev[0].dim();
    let inside = tracked.x.is_finite()
        && tracked.y.is_finite()
        && (0.0..=(width - 1) as f64).contains(&tracked.x)
        && (0.0..=(height - 1) as f64).contains(&tracked.y);
    inside.then_some(tracked)
}

/// Image pyramid by 2x2 averaging; stops before levels smaller than the window.
fn pyramid(image: &Array2<f32>, max_level: usize, window_size: usize) -> Vec<Array2<f32>> {
    let mut levels = vec![image.clone()];
    for _ in 0..max_level {
        let Some(last) = levels.last() else { break };
        let (height, width) = last.dim();
        if height / 2 < window_size || width / 2 < window_size {
            break;
        }
        let down = Array2::from_shape_fn((height / 2, width / 2), |(y, x)| {
            (last[[2 * y, 2 * x]]
                + last[[2 * y, 2 * x + 1]]
                + last[[2 * y + 1, 2 * x]]
                + last[[2 * y + 1, 2 * x + 1]])
                * 0.25
        });
        levels.push(down);
    }
    levels
}

/// Bilinear sample with edge clamping.
fn sample(image: &Array2<f32>, x: f64, y: f64) -> f64 {
    let (height, width) = image.dim();
    let x = x.clamp(0.0, (width - 1) as f64);
    let y = y.clamp(0.0, (height - 1) as f64);
    let (x0, y0) = (x.floor() as usize, y.floor() as usize);
    let (x1, y1) = ((x0 + 1).min(width - 1), (y0 + 1).min(height - 1));
    let (fx, fy) = (x - x0 as f64, y - y0 as f64);

    let top = image[[y0, x0]] as f64 * (1.0 - fx) + image[[y0, x1]] as f64 * fx;
    let bottom = image[[y1, x0]] as f64 * (1.0 - fx) + image[[y1, x1]] as f64 * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Central-difference gradients; zero on the border.
fn gradients(image: &Array2<f32>) -> (Array2<f64>, Array2<f64>) {
    let (height, width) = image.dim();
    let mut gx = Array2::zeros((height, width));
    let mut gy = Array2::zeros((height, width));
    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            gx[[y, x]] = (image[[y, x + 1]] as f64 - image[[y, x - 1]] as f64) / 2.0;
            gy[[y, x]] = (image[[y + 1, x]] as f64 - image[[y - 1, x]] as f64) / 2.0;
        }
    }
    (gx, gy)
}

/// Summed-area table with a leading zero row and column.
fn integral(values: &Array2<f64>) -> Array2<f64> {
    let (height, width) = values.dim();
    let mut table = Array2::zeros((height + 1, width + 1));
    for y in 0..height {
        let mut row_sum = 0.0;
        for x in 0..width {
            row_sum += values[[y, x]];
            table[[y + 1, x + 1]] = table[[y, x + 1]] + row_sum;
        }
    }
    table
}

/// Sum over the inclusive window `(top, left, bottom, right)`.
fn box_sum(
    table: &Array2<f64>,
    (top, left, bottom, right): (usize, usize, usize, usize),
) -> f64 {
    table[[bottom + 1, right + 1]] - table[[top, right + 1]] - table[[bottom + 1, left]]
        + table[[top, left]]
}
