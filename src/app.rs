//! The frame loop connecting a camera, a processing pipeline and a display.

use crate::{
    image::Image,
    timer::{FpsCounter, Timer},
};

/// Produces camera frames.
pub trait FrameSource {
    /// Blocks until the next frame is available.
    ///
    /// An error means the stream has ended.
    fn read(&mut self) -> anyhow::Result<Image>;

    /// Profiling timers to log along with the frame rate.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

/// Displays processed frames and reports when the user wants to quit.
pub trait FrameSink {
    fn present(&mut self, frame: &Image);

    /// Returns whether an exit key was pressed (or the window was closed) since the last call.
    fn poll_exit(&mut self) -> bool;
}

/// Turns camera frames into the frames to present.
pub trait Pipeline {
    fn process(&mut self, frame: Image) -> anyhow::Result<Image>;

    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

/// Why [`run_loop`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The frame source failed to deliver a frame.
    EndOfStream,
    /// The user pressed an exit key.
    ExitKey,
}

/// Runs the frame loop until the stream ends or the user asks to quit.
///
/// Each iteration reads a frame, processes it, presents the result and then checks for exit keys.
/// A failed read is logged and ends the loop normally; errors from the pipeline are propagated.
pub fn run_loop<S, P, K>(source: &mut S, pipeline: &mut P, sink: &mut K) -> anyhow::Result<Exit>
where
    S: FrameSource + ?Sized,
    P: Pipeline + ?Sized,
    K: FrameSink + ?Sized,
{
    let mut fps = FpsCounter::new("cooperativa");
    loop {
        let frame = match source.read() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("{e:?}");
                log::info!("camera stream ended, exiting");
                return Ok(Exit::EndOfStream);
            }
        };

        let out = pipeline.process(frame)?;
        sink.present(&out);

        fps.tick_with(source.timers().into_iter().chain(pipeline.timers()));

        if sink.poll_exit() {
            log::info!("exit requested");
            return Ok(Exit::ExitKey);
        }
    }
}
