//! Object detection.
//!
//! A [`Detector`] turns a camera frame into a list of [`Detection`]s. The rest of the application
//! only ever looks at confident detections of [`PERSON_CLASS`], selected by [`people`].

pub mod nms;
pub mod yolo;

use crate::image::{Image, Rect};
use crate::timer::Timer;

/// The COCO class ID for "person".
pub const PERSON_CLASS: u32 = 0;

/// A detected object.
///
/// Detections are produced fresh for every frame and carry no identity across frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    rect: Rect,
    class_id: u32,
    confidence: f32,
}

impl Detection {
    pub fn new(rect: Rect, class_id: u32, confidence: f32) -> Self {
        Self {
            rect,
            class_id,
            confidence,
        }
    }

    /// Returns the axis-aligned bounding rectangle of the detected object, in frame pixels.
    #[inline]
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn set_bounding_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }

    /// Returns the bounding box as `(x1, y1, x2, y2)` corner coordinates.
    pub fn bounding_box(&self) -> (i32, i32, i32, i32) {
        self.rect.corners()
    }

    #[inline]
    pub fn class_id(&self) -> u32 {
        self.class_id
    }

    /// Returns the confidence score, between 0.0 and 1.0.
    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    #[inline]
    pub fn is_person(&self) -> bool {
        self.class_id == PERSON_CLASS
    }
}

/// Trait for object detectors operating on full camera frames.
pub trait Detector {
    /// Detects objects in `image`.
    ///
    /// Only detections with a confidence of at least `threshold` are returned, in no particular
    /// order. The image is not modified.
    fn detect(&mut self, image: &Image, threshold: f32) -> anyhow::Result<Vec<Detection>>;

    /// Returns profiling timers for the stages of the detector, for logging.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&mut self, image: &Image, threshold: f32) -> anyhow::Result<Vec<Detection>> {
        (**self).detect(image, threshold)
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}

/// Selects the person detections with a confidence of at least `threshold`.
///
/// These are the detections that are counted and annotated.
pub fn people(
    detections: &[Detection],
    threshold: f32,
) -> impl Iterator<Item = &Detection> + '_ {
    detections
        .iter()
        .filter(move |det| det.is_person() && det.confidence >= threshold)
}
