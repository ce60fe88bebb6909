//! YOLOv8 object detection.
//!
//! Uses an Ultralytics YOLOv8 model exported to ONNX (`yolo export format=onnx`). The network takes
//! a letterboxed 640x640 RGB image and outputs a `[1, 4 + classes, anchors]` tensor: for every
//! anchor, the box center, width and height in input pixels followed by one score per class.

use itertools::Itertools;
use tract_onnx::prelude::tract_ndarray::ArrayViewD;

use crate::{
    image::{Image, Rect, Resolution},
    nn::NeuralNetwork,
    timer::Timer,
};

use super::{nms::NonMaxSuppression, Detection, Detector};

/// Object detector running a YOLOv8 network on the CPU.
pub struct YoloDetector {
    nn: NeuralNetwork,
    nms: NonMaxSuppression,
    t_resize: Timer,
    t_infer: Timer,
    t_extract: Timer,
    t_nms: Timer,
}

impl YoloDetector {
    /// Input resolution of the standard YOLOv8 exports.
    pub const INPUT_RESOLUTION: Resolution = Resolution::new(640, 640);

    /// Loads a YOLOv8 ONNX model from `path`.
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let nn = NeuralNetwork::load(path, Self::INPUT_RESOLUTION)?;
        Ok(Self {
            nn,
            nms: NonMaxSuppression::new(),
            t_resize: Timer::new("resize"),
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
            t_nms: Timer::new("nms"),
        })
    }
}

impl Detector for YoloDetector {
    fn detect(&mut self, image: &Image, threshold: f32) -> anyhow::Result<Vec<Detection>> {
        let input_res = self.nn.input_resolution();
        let input = self.t_resize.time(|| image.aspect_aware_resize(input_res));
        let outputs = self.t_infer.time(|| self.nn.estimate(&input))?;

        let mut detections = self
            .t_extract
            .time(|| -> anyhow::Result<_> { decode(outputs.view(0)?, threshold) })?;

        let letterbox = match image.resolution().aspect_ratio() {
            Some(ratio) => input_res.fit_aspect_ratio(ratio),
            None => return Ok(Vec::new()),
        };

        let detections = self.t_nms.time(|| {
            self.nms
                .process(&mut detections)
                .map(|mut det| {
                    let rect = unletterbox(det.bounding_rect(), letterbox, image.resolution());
                    det.set_bounding_rect(rect);
                    det
                })
                .collect::<Vec<_>>()
        });

        log::trace!("{} detections: {:?}", detections.len(), detections);
        Ok(detections)
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_resize, &self.t_infer, &self.t_extract, &self.t_nms]
    }
}

/// Decodes raw YOLOv8 network output into detections in network input coordinates.
///
/// Accepts both the standard `[1, 4 + classes, anchors]` layout and the transposed
/// `[1, anchors, 4 + classes]` layout. Each anchor yields at most one detection, for its
/// best-scoring class, if that score is at least `threshold`.
pub fn decode(output: ArrayViewD<'_, f32>, threshold: f32) -> anyhow::Result<Vec<Detection>> {
    let &[1, a, b] = output.shape() else {
        anyhow::bail!("unexpected YOLO output shape {:?}", output.shape());
    };

    // There are always far more anchors than classes.
    let transposed = a > b;
    let (rows, anchors) = if transposed { (b, a) } else { (a, b) };
    if rows <= 4 {
        anyhow::bail!("YOLO output has no class scores (shape {:?})", output.shape());
    }
    let get = |row: usize, anchor: usize| {
        if transposed {
            output[[0, anchor, row]]
        } else {
            output[[0, row, anchor]]
        }
    };

    let mut detections = Vec::new();
    for anchor in 0..anchors {
        let Some(class) = (4..rows)
            .map(|row| get(row, anchor))
            .position_max_by(|a, b| a.total_cmp(b))
        else {
            continue;
        };
        let confidence = get(4 + class, anchor);
        if !(confidence >= threshold) {
            continue;
        }

        let (cx, cy, w, h) = (
            get(0, anchor),
            get(1, anchor),
            get(2, anchor),
            get(3, anchor),
        );
        let rect = Rect::from_corners(
            (cx - w / 2.0).round() as i32,
            (cy - h / 2.0).round() as i32,
            (cx + w / 2.0).round() as i32,
            (cy + h / 2.0).round() as i32,
        );
        detections.push(Detection::new(rect, class as u32, confidence));
    }

    Ok(detections)
}

/// Maps `rect` from network input coordinates back into the coordinates of the original frame.
///
/// `letterbox` is the area of the network input the frame was scaled into. The result is clamped
/// to the frame.
fn unletterbox(rect: Rect, letterbox: Rect, frame: Resolution) -> Rect {
    if letterbox.width() == 0 || letterbox.height() == 0 {
        return Rect::from_top_left(0, 0, 0, 0);
    }

    let scale_x = frame.width() as f32 / letterbox.width() as f32;
    let scale_y = frame.height() as f32 / letterbox.height() as f32;
    let map = |v: i32, origin: i32, scale: f32, max: u32| {
        (((v - origin) as f32 * scale).round() as i32).clamp(0, max as i32)
    };

    let (x1, y1, x2, y2) = rect.corners();
    Rect::from_corners(
        map(x1, letterbox.x(), scale_x, frame.width()),
        map(y1, letterbox.y(), scale_y, frame.height()),
        map(x2, letterbox.x(), scale_x, frame.width()),
        map(y2, letterbox.y(), scale_y, frame.height()),
    )
}

#[cfg(test)]
mod tests {
    use tract_onnx::prelude::tract_ndarray::Array3;

    use super::*;
    use crate::{detection::PERSON_CLASS, image::AspectRatio};

    /// Creates an empty `[1, 4 + classes, anchors]` output.
    fn output(classes: usize, anchors: usize) -> Array3<f32> {
        Array3::zeros((1, 4 + classes, anchors))
    }

    fn set_box(out: &mut Array3<f32>, anchor: usize, cx: f32, cy: f32, w: f32, h: f32) {
        for (row, v) in [cx, cy, w, h].into_iter().enumerate() {
            out[[0, row, anchor]] = v;
        }
    }

    fn set_score(out: &mut Array3<f32>, anchor: usize, class: usize, score: f32) {
        out[[0, 4 + class, anchor]] = score;
    }

    #[test]
    fn decodes_best_class_per_anchor() {
        // Unused anchors keep all-zero scores.
        let mut out = output(3, 32);
        set_box(&mut out, 0, 100.0, 100.0, 40.0, 80.0);
        set_score(&mut out, 0, 0, 0.9);
        set_score(&mut out, 0, 2, 0.3);
        set_box(&mut out, 1, 300.0, 200.0, 20.0, 20.0);
        set_score(&mut out, 1, 1, 0.4);
        set_score(&mut out, 1, 2, 0.85);
        set_box(&mut out, 2, 500.0, 500.0, 10.0, 10.0);
        set_score(&mut out, 2, 0, 0.2);

        let dets = decode(out.view().into_dyn(), 0.5).unwrap();
        assert_eq!(dets.len(), 2);

        assert_eq!(dets[0].class_id(), PERSON_CLASS);
        assert_eq!(dets[0].confidence(), 0.9);
        assert_eq!(dets[0].bounding_box(), (80, 60, 120, 140));

        assert_eq!(dets[1].class_id(), 2);
        assert_eq!(dets[1].bounding_box(), (290, 190, 310, 210));
    }

    #[test]
    fn decodes_transposed_output() {
        let mut out = output(2, 8);
        for anchor in 0..8 {
            set_box(&mut out, anchor, 50.0, 50.0, 10.0, 10.0);
            set_score(&mut out, anchor, 1, 0.7);
        }
        let transposed = out.view().permuted_axes([0, 2, 1]).into_dyn();
        let dets = decode(transposed, 0.5).unwrap();
        assert_eq!(dets.len(), 8);
        assert!(dets.iter().all(|d| d.class_id() == 1));
    }

    #[test]
    fn rejects_bad_shape() {
        let out = Array3::<f32>::zeros((2, 84, 10));
        assert!(decode(out.view().into_dyn(), 0.5).is_err());
    }

    #[test]
    fn maps_back_to_frame() {
        // A 1920x1080 frame occupies rows 140..500 of the 640x640 input.
        let frame = Resolution::RES_1080P;
        let letterbox = YoloDetector::INPUT_RESOLUTION
            .fit_aspect_ratio(AspectRatio::new(16, 9).unwrap());

        let rect = unletterbox(Rect::from_corners(0, 140, 320, 500), letterbox, frame);
        assert_eq!(rect.corners(), (0, 0, 960, 1080));

        // Boxes reaching into the black bars are clamped.
        let rect = unletterbox(Rect::from_corners(600, 100, 700, 200), letterbox, frame);
        assert_eq!(rect.corners(), (1800, 0, 1920, 180));
    }
}
