//! Axis-aligned boxes in pixel coordinates and their overlap measures.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::tracks::Point;

/// Axis-aligned bounding box in pixel space, stored as left/top/right/bottom.
///
/// The Kalman filter works on XYAH (center x, center y, aspect ratio w/h,
/// height); conversions to and from that format live here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BBox {
    #[inline]
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Create a box from its top-left corner and size.
    #[inline]
    pub fn from_tlwh(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    /// Create a box from XYAH (center x, center y, aspect ratio, height).
    #[inline]
    pub fn from_xyah(cx: f32, cy: f32, aspect_ratio: f32, height: f32) -> Self {
        let width = aspect_ratio * height;
        Self::from_tlwh(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    #[inline]
    pub fn to_xyah(&self) -> [f32; 4] {
        let (cx, cy) = self.center();
        let height = self.height();
        let aspect_ratio = if height > 0.0 { self.width() / height } else { 0.0 };
        [cx, cy, aspect_ratio, height]
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        ((self.left + self.right) / 2.0, (self.top + self.bottom) / 2.0)
    }

    /// Ground-contact point: bottom centre.
    #[inline]
    pub fn foot_position(&self) -> Point {
        Point::new(
            ((self.left + self.right) / 2.0) as f64,
            self.bottom as f64,
        )
    }

    #[inline]
    pub fn center_point(&self) -> Point {
        let (cx, cy) = self.center();
        Point::new(cx as f64, cy as f64)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Intersection over Union with another box.
    pub fn iou(&self, other: &BBox) -> f32 {
        let inter_width = (self.right.min(other.right) - self.left.max(other.left)).max(0.0);
        let inter_height = (self.bottom.min(other.bottom) - self.top.max(other.top)).max(0.0);
        let inter_area = inter_width * inter_height;
        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }

    /// Linear interpolation between `self` (t = 0) and `other` (t = 1).
    pub fn lerp(&self, other: &BBox, t: f32) -> BBox {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        BBox::new(
            mix(self.left, other.left),
            mix(self.top, other.top),
            mix(self.right, other.right),
            mix(self.bottom, other.bottom),
        )
    }
}

/// IoU matrix of shape (M, N) between two sets of boxes.
pub fn iou_batch(boxes_a: &[BBox], boxes_b: &[BBox]) -> Array2<f32> {
    Array2::from_shape_fn((boxes_a.len(), boxes_b.len()), |(i, j)| boxes_a[i].iou(&boxes_b[j]))
}
