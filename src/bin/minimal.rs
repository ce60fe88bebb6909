//! The plain people counter: boxes, a status line and the frame rate, nothing else.

use cooperativa::{
    app,
    clock::SystemClock,
    counter::{MinimalCounter, WINDOW_RESOLUTION},
    detection::yolo::YoloDetector,
    gui::{self, Screen},
    webcam::{Webcam, WebcamOptions},
};

const MODEL_PATH: &str = "yolov8s.onnx";
const WINDOW_TITLE: &str = "YOLO People Counter";

fn main() {
    cooperativa::init_logger!();

    gui::run(run);
}

fn run() -> anyhow::Result<()> {
    let detector = YoloDetector::load(MODEL_PATH)?;

    let options = WebcamOptions::default().resolution(WINDOW_RESOLUTION);
    let mut webcam = match Webcam::open(options) {
        Ok(webcam) => webcam,
        Err(e) => {
            log::error!("failed to open camera: {e:?}");
            return Ok(());
        }
    };

    let mut counter = MinimalCounter::new(detector, SystemClock);
    let mut screen = Screen::new(WINDOW_TITLE);
    app::run_loop(&mut webcam, &mut counter, &mut screen)?;
    Ok(())
}
