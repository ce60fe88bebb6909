//! Per-frame people counting pipelines.
//!
//! [`Counter`] drives the full interface including the photo capture sequence, [`MinimalCounter`]
//! only annotates frames.

use std::{
    mem,
    time::{Duration, Instant},
};

use crate::{
    app::Pipeline,
    capture::{CaptureState, DisplayCount, Stage, Transition},
    clock::Clock,
    detection::{people, Detection, Detector},
    image::{Image, Resolution},
    overlay::{self, Overlay, Scene},
    timer::{FpsHistory, Timer},
};

/// Minimum confidence for a detection to be counted.
pub const CONFIDENCE_THRESHOLD: f32 = 0.8;

/// Camera frames are scaled to this resolution before anything else happens.
pub const WINDOW_RESOLUTION: Resolution = Resolution::RES_1080P;

fn normalize(frame: Image) -> Image {
    if frame.resolution() == WINDOW_RESOLUTION {
        frame
    } else {
        frame.resize(WINDOW_RESOLUTION)
    }
}

/// Counts people and runs the capture sequence.
pub struct Counter<D, C> {
    detector: D,
    clock: C,
    overlay: Overlay,
    state: CaptureState,
    stage: Stage,
    display_count: DisplayCount,
    people: Vec<Detection>,
    fps: FpsHistory,
    last_frame: Option<Instant>,
    t_render: Timer,
}

impl<D: Detector, C: Clock> Counter<D, C> {
    pub fn new(detector: D, clock: C, overlay: Overlay) -> Self {
        Self {
            detector,
            clock,
            overlay,
            state: CaptureState::default(),
            stage: Stage::Live,
            display_count: DisplayCount::default(),
            people: Vec::new(),
            fps: FpsHistory::default(),
            last_frame: None,
            t_render: Timer::new("render"),
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    /// The stage shown on the most recent frame.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn display_count(&self) -> usize {
        self.display_count.get()
    }

    /// The person count of the most recent frame that ran detection.
    pub fn person_count(&self) -> usize {
        self.people.len()
    }

    /// The people counted on the most recent frame that ran detection.
    pub fn people(&self) -> &[Detection] {
        &self.people
    }

    /// Processes one camera frame and returns the frame to present.
    pub fn process(&mut self, frame: Image) -> anyhow::Result<Image> {
        let now = self.clock.now();
        if let Some(last) = self.last_frame.replace(now) {
            self.fps.push_frame_time(now.saturating_duration_since(last));
        }

        if let Some(photo) = self.state.frozen_frame_at(now) {
            self.stage = Stage::Frozen;
            return Ok(photo.clone());
        }

        let frame = normalize(frame);
        let detections = self.detector.detect(&frame, CONFIDENCE_THRESHOLD)?;
        self.people = people(&detections, CONFIDENCE_THRESHOLD).cloned().collect();
        let person_count = self.people.len();
        log::trace!("{person_count} people in frame");

        let (state, transition) = mem::take(&mut self.state).advance(person_count, now);
        self.state = state;
        match transition {
            Transition::None => {}
            Transition::Triggered { snapshot } => {
                log::info!("{snapshot} people in view, starting countdown");
            }
            Transition::Released => {
                log::info!("photo released, back to live view");
                self.display_count.reset();
            }
        }
        self.display_count.step_toward(person_count);

        self.stage = self.state.stage(now);
        let scene = Scene {
            people: &self.people,
            person_count,
            display_count: self.display_count.get(),
            stage: self.stage,
            fps: self.fps.avg(),
        };
        let rendered = self.t_render.time(|| self.overlay.render(&frame, &scene));

        if let Stage::Capture { snapshot } = self.stage {
            log::info!("captured photo of {snapshot} cooperativistas");
            self.state = mem::take(&mut self.state).capture(rendered.clone(), now);
        }

        Ok(rendered)
    }
}

impl<D: Detector, C: Clock> Pipeline for Counter<D, C> {
    fn process(&mut self, frame: Image) -> anyhow::Result<Image> {
        Counter::process(self, frame)
    }

    fn timers(&self) -> Vec<&Timer> {
        let mut timers = self.detector.timers();
        timers.push(&self.t_render);
        timers
    }
}

/// Counts people and annotates frames, without the capture sequence.
pub struct MinimalCounter<D, C> {
    detector: D,
    clock: C,
    window_start: Option<Instant>,
    frames: u32,
    fps: Option<f32>,
    t_render: Timer,
}

impl<D: Detector, C: Clock> MinimalCounter<D, C> {
    /// Length of the window the frame rate is averaged over.
    const FPS_WINDOW: Duration = Duration::from_secs(1);

    pub fn new(detector: D, clock: C) -> Self {
        Self {
            detector,
            clock,
            window_start: None,
            frames: 0,
            fps: None,
            t_render: Timer::new("render"),
        }
    }

    /// The frame rate measured over the last completed window.
    pub fn fps(&self) -> Option<f32> {
        self.fps
    }

    pub fn process(&mut self, frame: Image) -> anyhow::Result<Image> {
        let now = self.clock.now();
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        let elapsed = now.saturating_duration_since(start);
        if elapsed > Self::FPS_WINDOW {
            self.fps = Some(self.frames as f32 / elapsed.as_secs_f32());
            self.frames = 0;
            self.window_start = Some(now);
        }

        let frame = normalize(frame);
        let detections = self.detector.detect(&frame, CONFIDENCE_THRESHOLD)?;
        let people = people(&detections, CONFIDENCE_THRESHOLD)
            .cloned()
            .collect::<Vec<_>>();
        log::trace!("{} people in frame", people.len());

        Ok(self
            .t_render
            .time(|| overlay::minimal::render(&frame, &people, self.fps)))
    }
}

impl<D: Detector, C: Clock> Pipeline for MinimalCounter<D, C> {
    fn process(&mut self, frame: Image) -> anyhow::Result<Image> {
        MinimalCounter::process(self, frame)
    }

    fn timers(&self) -> Vec<&Timer> {
        let mut timers = self.detector.timers();
        timers.push(&self.t_render);
        timers
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        clock::ManualClock,
        detection::PERSON_CLASS,
        image::{Color, Rect},
    };

    /// Reports `people` confident people in every frame.
    struct Crowd {
        people: usize,
    }

    impl Detector for Crowd {
        fn detect(&mut self, _: &Image, _: f32) -> anyhow::Result<Vec<Detection>> {
            Ok((0..self.people)
                .map(|i| {
                    let x = 100 + 200 * i as i32;
                    Detection::new(Rect::from_corners(x, 300, x + 150, 700), PERSON_CLASS, 0.9)
                })
                .collect())
        }
    }

    fn frame() -> Image {
        Image::filled(Resolution::new(64, 36), Color::BLACK)
    }

    /// Reports one confident and one unsure person.
    struct Unsure;

    impl Detector for Unsure {
        fn detect(&mut self, _: &Image, _: f32) -> anyhow::Result<Vec<Detection>> {
            Ok(vec![
                Detection::new(Rect::from_corners(400, 300, 600, 700), PERSON_CLASS, 0.9),
                Detection::new(Rect::from_corners(1700, 400, 1800, 800), PERSON_CLASS, 0.4),
            ])
        }
    }

    #[test]
    fn unsure_people_are_neither_counted_nor_boxed() {
        let clock = ManualClock::new();
        let camera = Image::filled(WINDOW_RESOLUTION, Color::BLACK);

        let mut counter = Counter::new(Unsure, &clock, Overlay::default());
        let out = counter.process(camera.clone()).unwrap();
        assert_eq!(counter.person_count(), 1);
        assert_eq!(counter.people()[0].confidence(), 0.9);
        assert_ne!(out.get(400, 500), Color::BLACK);
        assert_eq!(out.get(1700, 600), Color::BLACK);

        let mut minimal = MinimalCounter::new(Unsure, &clock);
        let out = minimal.process(camera).unwrap();
        assert_eq!(out.get(400, 500), Color::GREEN);
        assert_eq!(out.get(1700, 600), Color::BLACK);
    }

    #[test]
    fn frames_are_scaled_to_window() {
        let clock = ManualClock::new();
        let mut counter = Counter::new(Crowd { people: 1 }, &clock, Overlay::default());
        let out = counter.process(frame()).unwrap();
        assert_eq!(out.resolution(), WINDOW_RESOLUTION);

        let mut minimal = MinimalCounter::new(Crowd { people: 1 }, &clock);
        let out = minimal.process(frame()).unwrap();
        assert_eq!(out.resolution(), WINDOW_RESOLUTION);
    }

    #[test]
    fn display_count_follows_person_count() {
        let clock = ManualClock::new();
        let mut counter = Counter::new(Crowd { people: 3 }, &clock, Overlay::default());
        let mut seen = Vec::new();
        for _ in 0..4 {
            counter.process(frame()).unwrap();
            seen.push(counter.display_count());
        }
        assert_eq!(seen, [1, 2, 3, 3]);
        assert_eq!(counter.person_count(), 3);
        assert_eq!(counter.stage(), Stage::Live);
    }

    #[test]
    fn minimal_fps_window() {
        let clock = ManualClock::new();
        let mut minimal = MinimalCounter::new(Crowd { people: 0 }, &clock);
        for _ in 0..10 {
            minimal.process(frame()).unwrap();
            clock.advance(Duration::from_millis(100));
        }
        assert_eq!(minimal.fps(), None);

        // 11th frame lands 1.0 s after the first, which doesn't close the window yet.
        minimal.process(frame()).unwrap();
        assert_eq!(minimal.fps(), None);

        clock.advance(Duration::from_millis(100));
        minimal.process(frame()).unwrap();
        assert_relative_eq!(minimal.fps().unwrap(), 12.0 / 1.1, epsilon = 1e-4);
    }

    #[test]
    fn pipeline_timers() {
        let clock = ManualClock::new();
        let counter = Counter::new(Crowd { people: 0 }, &clock, Overlay::default());
        let names = Pipeline::timers(&counter)
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, ["render: 0x0.0ms"]);
    }
}
