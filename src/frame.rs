//! In-memory RGB frames handed over by the (external) video decoder.

use ndarray::{Array2, Array3, ArrayView3, s};

use crate::error::FrameError;
use crate::tracker::BBox;

/// A decoded video frame, stored as `height x width x 3` RGB bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pixels: Array3<u8>,
}

impl Frame {
    /// Wrap an `(height, width, 3)` pixel array.
    pub fn new(pixels: Array3<u8>) -> Result<Self, FrameError> {
        let channels = pixels.dim().2;
        if channels != 3 {
            return Err(FrameError::Channels(channels));
        }
        Ok(Self { pixels })
    }

    /// Build a frame from a packed, row-major RGB buffer.
    pub fn from_rgb(width: usize, height: usize, data: Vec<u8>) -> Result<Self, FrameError> {
        let got = data.len();
        let pixels = Array3::from_shape_vec((height, width, 3), data).map_err(|_| {
            FrameError::BufferSize {
                width,
                height,
                got,
            }
        })?;
        Ok(Self { pixels })
    }

    /// A frame of a single colour.
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let pixels = Array3::from_shape_fn((height, width, 3), |(_, _, c)| rgb[c]);
        Self { pixels }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn pixels(&self) -> ArrayView3<'_, u8> {
        self.pixels.view()
    }

    /// Paint the pixel rectangle `[left, right) x [top, bottom)`, clipped to the frame.
    pub fn fill_rect(
        &mut self,
        left: usize,
        top: usize,
        right: usize,
        bottom: usize,
        rgb: [u8; 3],
    ) {
        let right = right.min(self.width());
        let bottom = bottom.min(self.height());
        if left >= right || top >= bottom {
            return;
        }
        let mut region = self.pixels.slice_mut(s![top..bottom, left..right, ..]);
        for mut pixel in region.rows_mut() {
            pixel[0] = rgb[0];
            pixel[1] = rgb[1];
            pixel[2] = rgb[2];
        }
    }

    /// Luma (BT.601 weights) as floating point intensities.
    pub fn to_gray(&self) -> Array2<f32> {
        let (height, width, _) = self.pixels.dim();
        Array2::from_shape_fn((height, width), |(y, x)| {
            0.299 * self.pixels[[y, x, 0]] as f32
                + 0.587 * self.pixels[[y, x, 1]] as f32
                + 0.114 * self.pixels[[y, x, 2]] as f32
        })
    }

    /// The pixels covered by `bbox`, clamped to the frame. `None` if nothing remains.
    pub fn crop(&self, bbox: &BBox) -> Option<ArrayView3<'_, u8>> {
        let clamp = |v: f32, max: usize| (v.max(0.0) as usize).min(max);
        let left = clamp(bbox.left, self.width());
        let right = clamp(bbox.right, self.width());
        let top = clamp(bbox.top, self.height());
        let bottom = clamp(bbox.bottom, self.height());
        if left >= right || top >= bottom {
            return None;
        }
        Some(self.pixels.slice(s![top..bottom, left..right, ..]))
    }
}
