//! OpenCV backend for corner selection and pyramidal Lucas-Kanade.

use ndarray::Array2;
use opencv::core::{CV_8UC1, Mat, Point2f, Scalar, Size, TermCriteria, TermCriteria_Type, Vector};
use opencv::prelude::*;
use opencv::{imgproc, video};

use super::{FeatureParams, FlowParams};
use crate::tracks::Point;

pub(super) fn good_features_to_track(
    gray: &Array2<f32>,
    params: &FeatureParams,
    column_bands: &[(usize, usize)],
) -> opencv::Result<Vec<Point>> {
    let image = to_mat(gray)?;
    let mask = band_mask(gray.dim(), column_bands)?;

    let mut corners = Vector::<Point2f>::new();
    imgproc::good_features_to_track(
        &image,
        &mut corners,
        params.max_corners as i32,
        params.quality_level,
        params.min_distance,
        &mask,
        params.block_size as i32,
        false,
        0.04,
    )?;
    Ok(corners
        .iter()
        .map(|p| Point::new(p.x as f64, p.y as f64))
        .collect())
}

pub(super) fn calc_optical_flow(
    prev: &Array2<f32>,
    next: &Array2<f32>,
    points: &[Point],
    params: &FlowParams,
) -> opencv::Result<Vec<Option<Point>>> {
    if points.is_empty() {
        return Ok(Vec::new());
    }
    let prev_img = to_mat(prev)?;
    let next_img = to_mat(next)?;
    let prev_pts: Vector<Point2f> = points
        .iter()
        .map(|p| Point2f::new(p.x as f32, p.y as f32))
        .collect();

    let mut next_pts = Vector::<Point2f>::new();
    let mut status = Vector::<u8>::new();
    let mut err = Vector::<f32>::new();
    let window = params.window_size as i32;
    let criteria = TermCriteria::new(
        TermCriteria_Type::COUNT as i32 | TermCriteria_Type::EPS as i32,
        params.max_iterations as i32,
        params.epsilon,
    )?;
    video::calc_optical_flow_pyr_lk(
        &prev_img,
        &next_img,
        &prev_pts,
        &mut next_pts,
        &mut status,
        &mut err,
        Size::new(window, window),
        params.max_level as i32,
        criteria,
        0,
        1e-4,
    )?;

    Ok(next_pts
        .iter()
        .zip(status.iter())
        .map(|(p, ok)| (ok != 0).then(|| Point::new(p.x as f64, p.y as f64)))
        .collect())
}

/// 8-bit single channel copy of a grayscale image.
fn to_mat(gray: &Array2<f32>) -> opencv::Result<Mat> {
    let (rows, cols) = gray.dim();
    let mut mat =
        Mat::new_rows_cols_with_default(rows as i32, cols as i32, CV_8UC1, Scalar::all(0.0))?;
    for ((y, x), &value) in gray.indexed_iter() {
        *mat.at_2d_mut::<u8>(y as i32, x as i32)? = value.round().clamp(0.0, 255.0) as u8;
    }
    Ok(mat)
}

/// Non-zero where the column lies in one of the `[start, end)` bands.
fn band_mask((rows, cols): (usize, usize), column_bands: &[(usize, usize)]) -> opencv::Result<Mat> {
    let mut mask =
        Mat::new_rows_cols_with_default(rows as i32, cols as i32, CV_8UC1, Scalar::all(0.0))?;
    for &(start, end) in column_bands {
        for x in start..end.min(cols) {
            for y in 0..rows {
                *mask.at_2d_mut::<u8>(y as i32, x as i32)? = 255;
            }
        }
    }
    Ok(mask)
}
