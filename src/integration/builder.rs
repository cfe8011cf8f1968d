//! Builder for creating Detection objects from the box formats models emit.

use super::{DetectedClass, Detection};
use crate::tracker::BBox;

/// Accumulates a class, a box and a confidence, whatever box convention the
/// model output uses.
#[derive(Debug, Clone)]
pub struct DetectionBuilder {
    class: DetectedClass,
    bbox: BBox,
    confidence: f32,
}

impl DetectionBuilder {
    pub fn new(class: DetectedClass) -> Self {
        Self {
            class,
            bbox: BBox::default(),
            confidence: 0.0,
        }
    }

    /// Corners (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.bbox = BBox::new(x1, y1, x2, y2);
        self
    }

    /// Centre and size, as YOLO heads emit them.
    pub fn xywh(self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.tlbr(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    pub fn tlwh(mut self, left: f32, top: f32, w: f32, h: f32) -> Self {
        self.bbox = BBox::from_tlwh(left, top, w, h);
        self
    }

    pub fn score(mut self, score: f32) -> Self {
        self.confidence = score;
        self
    }

    pub fn build(self) -> Detection {
        Detection {
            class: self.class,
            confidence: self.confidence,
            bbox: self.bbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_builder_formats_agree() {
        let from_center = DetectionBuilder::new(DetectedClass::Ball)
            .xywh(30.0, 50.0, 40.0, 60.0)
            .score(0.95)
            .build();
        let from_corner = DetectionBuilder::new(DetectedClass::Ball)
            .tlwh(10.0, 20.0, 40.0, 60.0)
            .score(0.95)
            .build();

        assert_eq!(from_center.bbox, BBox::new(10.0, 20.0, 50.0, 80.0));
        assert_eq!(from_center, from_corner);
        assert_eq!(from_center.confidence, 0.95);
    }
}
