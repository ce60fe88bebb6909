//! Non-Maximum Suppression.
//!
//! Single-shot detectors like YOLO produce many overlapping candidate boxes for each object.
//! Non-Maximum Suppression (NMS) filters these duplicates out, keeping only the most confident
//! detection of each cluster.
//!
//! Suppression is performed per class: a person box never suppresses an overlapping chair box.

use crate::num::TotalF32;

use super::Detection;

/// A non-maximum suppression algorithm.
pub struct NonMaxSuppression {
    iou_thresh: f32,
    out_buf: Vec<Detection>,
}

impl NonMaxSuppression {
    /// The default intersection-over-union threshold used to determine if two detections overlap.
    ///
    /// This matches the threshold used by Ultralytics for YOLOv8 inference.
    pub const DEFAULT_IOU_THRESH: f32 = 0.45;

    /// Creates a new non-maximum suppressor using [`Self::DEFAULT_IOU_THRESH`].
    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            out_buf: Vec::new(),
        }
    }

    /// Sets the intersection-over-union threshold to consider two detections as overlapping.
    pub fn set_iou_thresh(&mut self, iou_thresh: f32) {
        self.iou_thresh = iou_thresh;
    }

    /// Performs non-maximum suppression on `detections`.
    ///
    /// `detections` will be emptied in the process. The retained detections are returned as an
    /// iterator, in order of descending confidence.
    pub fn process(
        &mut self,
        detections: &mut Vec<Detection>,
    ) -> impl Iterator<Item = Detection> + '_ {
        self.out_buf.clear();

        // Sort by ascending confidence, process highest confidence first by starting at the back.
        detections.sort_unstable_by_key(|det| TotalF32(det.confidence()));

        while let Some(seed) = detections.pop() {
            detections.retain(|other| {
                other.class_id() != seed.class_id()
                    || seed.bounding_rect().iou(&other.bounding_rect()) < self.iou_thresh
            });
            self.out_buf.push(seed);
        }

        self.out_buf.drain(..)
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::image::Rect;

    use super::*;

    #[test]
    fn nms_suppresses_non_maximum() {
        let mut nms = NonMaxSuppression::new();

        let a = Detection::new(Rect::from_corners(0, 0, 100, 100), 0, 0.6);
        let b = Detection::new(Rect::from_corners(5, 5, 105, 105), 0, 0.9);
        let detections = nms.process(&mut vec![a, b.clone()]).collect::<Vec<_>>();
        assert_eq!(detections, [b]);
    }

    #[test]
    fn nms_ignores_nonoverlapping() {
        let mut nms = NonMaxSuppression::new();

        let a = Detection::new(Rect::from_corners(0, 0, 10, 10), 0, 1.0);
        let b = Detection::new(Rect::from_corners(50, 0, 60, 10), 0, 0.9);

        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].confidence(), 1.0);
    }

    #[test]
    fn nms_is_per_class() {
        let mut nms = NonMaxSuppression::new();

        let rect = Rect::from_corners(0, 0, 100, 100);
        let person = Detection::new(rect, 0, 0.9);
        let chair = Detection::new(rect, 56, 0.8);

        let detections = nms.process(&mut vec![person, chair]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 2);
    }

    #[test]
    fn nms_threshold() {
        let mut nms = NonMaxSuppression::new();
        nms.set_iou_thresh(0.5);

        // IoU of 50/150 stays below the threshold.
        let a = Detection::new(Rect::from_corners(0, 0, 10, 10), 0, 0.9);
        let b = Detection::new(Rect::from_corners(5, 0, 15, 10), 0, 0.8);
        assert_eq!(nms.process(&mut vec![a.clone(), b.clone()]).count(), 2);

        nms.set_iou_thresh(0.3);
        assert_eq!(nms.process(&mut vec![a, b]).count(), 1);
    }
}
