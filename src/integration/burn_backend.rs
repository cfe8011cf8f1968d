//! Burn inference backend for football object detection.
//!
//! `BurnDetector` wraps any model implementing [`BurnModel`] and turns its raw
//! outputs into labelled [`Detection`]s, mapping the model's class ids through a
//! [`ClassMap`].
//!
//! # Example
//!
//! ```ignore
//! use pitchtrack_rs::integration::{BurnDetector, BurnModel, RawDetection, load_detector};
//! use burn::backend::NdArray;
//!
//! struct MyYoloModel { /* ... */ }
//!
//! impl BurnModel<NdArray> for MyYoloModel {
//!     fn forward(&self, input: burn::tensor::Tensor<NdArray, 4>) -> Vec<RawDetection> {
//!         // Run inference
//!     }
//! }
//!
//! let detector = load_detector(|| {
//!     MyYoloModel::load("best.bin").map(|m| BurnDetector::new(m, device))
//! })?;
//! ```

use burn::prelude::*;
use burn::tensor::Tensor;
use thiserror::Error;

use super::{DetectedClass, Detection, DetectionBuilder, DetectionSource};
use crate::frame::Frame;

/// Error type for Burn detection failures.
#[derive(Debug, Clone, Error)]
pub enum BurnDetectorError {
    #[error("frame is {got_width}x{got_height}, model expects {width}x{height}")]
    InvalidInputDimensions {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },
    #[error("model expects {0} input channels, frames are RGB")]
    UnsupportedChannels(u32),
}

/// One post-NMS box as emitted by a model head.
#[derive(Debug, Clone)]
pub struct RawDetection {
    /// Corners or centre/size, see [`BurnModel::bbox_is_xywh`].
    pub bbox: [f32; 4],
    pub score: f32,
    pub class_id: usize,
}

/// Mapping from model class ids to football classes.
///
/// Ids not listed are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMap {
    pub ball: usize,
    pub goalkeeper: usize,
    pub player: usize,
    pub referee: usize,
}

impl Default for ClassMap {
    /// Class order of the common football-players dataset export.
    fn default() -> Self {
        Self {
            ball: 0,
            goalkeeper: 1,
            player: 2,
            referee: 3,
        }
    }
}

impl ClassMap {
    pub fn resolve(&self, class_id: usize) -> Option<DetectedClass> {
        match class_id {
            id if id == self.ball => Some(DetectedClass::Ball),
            id if id == self.goalkeeper => Some(DetectedClass::Goalkeeper),
            id if id == self.player => Some(DetectedClass::Player),
            id if id == self.referee => Some(DetectedClass::Referee),
            _ => None,
        }
    }
}

/// Trait for Burn-based detection models.
pub trait BurnModel<B: Backend>: Send + Sync {
    /// Run forward pass on a `[batch, channels, height, width]` tensor.
    fn forward(&self, input: Tensor<B, 4>) -> Vec<RawDetection>;

    /// Expected input size (channels, height, width).
    fn input_size(&self) -> (u32, u32, u32) {
        (3, 640, 640)
    }

    /// Whether bbox output is in XYWH format (vs TLBR).
    fn bbox_is_xywh(&self) -> bool {
        true
    }
}

/// Burn-based object detector implementing [`DetectionSource`].
pub struct BurnDetector<B: Backend, M: BurnModel<B>> {
    model: M,
    device: B::Device,
    conf_threshold: f32,
    class_map: ClassMap,
}

impl<B: Backend, M: BurnModel<B>> BurnDetector<B, M> {
    pub fn new(model: M, device: B::Device) -> Self {
        Self {
            model,
            device,
            conf_threshold: 0.1,
            class_map: ClassMap::default(),
        }
    }

    pub fn with_conf_threshold(mut self, threshold: f32) -> Self {
        self.conf_threshold = threshold;
        self
    }

    pub fn with_class_map(mut self, class_map: ClassMap) -> Self {
        self.class_map = class_map;
        self
    }

    /// Convert an RGB frame into a normalised `[1, 3, H, W]` tensor.
    pub fn preprocess(&self, frame: &Frame) -> Result<Tensor<B, 4>, BurnDetectorError> {
        let (channels, height, width) = self.model.input_size();
        if channels != 3 {
            return Err(BurnDetectorError::UnsupportedChannels(channels));
        }
        if frame.width() as u32 != width || frame.height() as u32 != height {
            return Err(BurnDetectorError::InvalidInputDimensions {
                width,
                height,
                got_width: frame.width() as u32,
                got_height: frame.height() as u32,
            });
        }

        // HWC bytes -> CHW floats in [0, 1]
        let chw = frame.pixels().permuted_axes([2, 0, 1]);
        let data: Vec<f32> = chw.iter().map(|&x| x as f32 / 255.0).collect();

        Ok(Tensor::<B, 1>::from_floats(data.as_slice(), &self.device).reshape([
            1,
            3,
            height as usize,
            width as usize,
        ]))
    }

    fn postprocess(&self, raw_detections: Vec<RawDetection>) -> Vec<Detection> {
        raw_detections
            .into_iter()
            .filter(|d| d.score >= self.conf_threshold)
            .filter_map(|d| {
                let class = self.class_map.resolve(d.class_id)?;
                let builder = DetectionBuilder::new(class).score(d.score);
                let [a, b, c, e] = d.bbox;
                Some(if self.model.bbox_is_xywh() {
                    builder.xywh(a, b, c, e).build()
                } else {
                    builder.tlbr(a, b, c, e).build()
                })
            })
            .collect()
    }
}

impl<B: Backend, M: BurnModel<B>> DetectionSource for BurnDetector<B, M> {
    type Error = BurnDetectorError;

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
        let tensor = self.preprocess(frame)?;
        let raw_detections = self.model.forward(tensor);
        Ok(self.postprocess(raw_detections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_class_map() {
        let map = ClassMap::default();
        assert_eq!(map.resolve(0), Some(DetectedClass::Ball));
        assert_eq!(map.resolve(1), Some(DetectedClass::Goalkeeper));
        assert_eq!(map.resolve(3), Some(DetectedClass::Referee));
        assert_eq!(map.resolve(7), None);
    }
}
