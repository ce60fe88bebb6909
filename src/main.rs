use cooperativa::{
    app,
    clock::SystemClock,
    counter::{Counter, WINDOW_RESOLUTION},
    detection::yolo::YoloDetector,
    gui::{self, Screen},
    overlay::{Logo, Overlay},
    webcam::{Webcam, WebcamOptions},
};

const MODEL_PATH: &str = "yolov8s.onnx";
const LOGO_PATH: &str = "assets/logo.png";
const WINDOW_TITLE: &str = "Contador de Cooperativistas";

fn main() {
    cooperativa::init_logger!();

    gui::run(run);
}

fn run() -> anyhow::Result<()> {
    let detector = YoloDetector::load(MODEL_PATH)?;

    let logo = match Logo::load(LOGO_PATH) {
        Ok(logo) => Some(logo),
        Err(e) => {
            log::warn!("continuing without logo: {e:?}");
            None
        }
    };

    let options = WebcamOptions::default().resolution(WINDOW_RESOLUTION);
    let mut webcam = match Webcam::open(options) {
        Ok(webcam) => webcam,
        Err(e) => {
            log::error!("failed to open camera: {e:?}");
            return Ok(());
        }
    };

    let mut counter = Counter::new(detector, SystemClock, Overlay::new(logo));
    let mut screen = Screen::new(WINDOW_TITLE);
    let exit = app::run_loop(&mut webcam, &mut counter, &mut screen)?;
    log::debug!("frame loop ended: {exit:?}");
    Ok(())
}
