//! Webcam people counter.
//!
//! Counts the people in front of a camera with a YOLO detector and tells them how many more they
//! need to form a cooperative. Once [`capture::THRESHOLD`] people are in view, a countdown starts
//! and the frame at the end of it is shown as a group photo for a while.
//!
//! # Environment Variables
//!
//! * `RUST_LOG`: overrides the default log filters set by [`init_logger!`].

use log::LevelFilter;

pub mod app;
pub mod capture;
pub mod clock;
pub mod counter;
pub mod detection;
pub mod gui;
pub mod image;
pub mod nn;
pub mod num;
pub mod overlay;
pub mod timer;
pub mod webcam;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and this library log at *debug* level, `wgpu` at *warn* level. `RUST_LOG`
/// takes precedence over both.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
