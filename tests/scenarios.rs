//! Drives the full per-frame pipeline with a scripted detector and a manual clock.

use std::{cell::Cell, collections::VecDeque, rc::Rc, time::Duration};

use anyhow::anyhow;
use cooperativa::{
    app::{run_loop, Exit, FrameSink, FrameSource},
    capture::{CaptureState, Stage, FREEZE},
    clock::ManualClock,
    counter::{Counter, MinimalCounter, WINDOW_RESOLUTION},
    detection::{Detection, Detector, PERSON_CLASS},
    image::{Color, Image, Rect},
    overlay::Overlay,
};

/// Reports as many confident people as the test asks for, plus some detections that must not be
/// counted.
#[derive(Clone, Default)]
struct Script {
    people: Rc<Cell<usize>>,
}

impl Script {
    fn set(&self, people: usize) {
        self.people.set(people);
    }
}

impl Detector for Script {
    fn detect(&mut self, _: &Image, _: f32) -> anyhow::Result<Vec<Detection>> {
        let mut detections = (0..self.people.get())
            .map(|i| {
                let x = 50 + 300 * i as i32;
                Detection::new(Rect::from_corners(x, 200, x + 250, 900), PERSON_CLASS, 0.91)
            })
            .collect::<Vec<_>>();
        // A chair and an unsure person.
        detections.push(Detection::new(Rect::from_corners(10, 10, 60, 60), 56, 0.95));
        detections.push(Detection::new(
            Rect::from_corners(1700, 400, 1800, 800),
            PERSON_CLASS,
            0.4,
        ));
        Ok(detections)
    }
}

fn camera_frame() -> Image {
    Image::filled(WINDOW_RESOLUTION, Color::from_rgb8(40, 40, 40))
}

fn second() -> Duration {
    Duration::from_secs(1)
}

#[test]
fn six_people_for_six_seconds() {
    let clock = ManualClock::new();
    let script = Script::default();
    let mut counter = Counter::new(script.clone(), &clock, Overlay::default());
    script.set(6);

    let mut digits = Vec::new();
    let mut photo = None;
    for frame in 0..6 {
        let out = counter.process(camera_frame()).unwrap();
        match counter.stage() {
            Stage::Countdown {
                remaining,
                snapshot,
            } => {
                assert_eq!(snapshot, 6);
                digits.push(remaining);
            }
            Stage::Capture { snapshot } => {
                assert_eq!(frame, 5);
                assert_eq!(snapshot, 6);
                photo = Some(out);
            }
            stage => panic!("unexpected stage {stage:?} on frame {frame}"),
        }
        if frame == 0 {
            assert!(matches!(
                counter.state(),
                CaptureState::CountingDown { snapshot: 6, .. }
            ));
        }
        clock.advance(second());
    }
    assert_eq!(digits, [5, 4, 3, 2, 1]);

    let photo = photo.expect("no photo taken");
    assert_eq!(counter.state().frozen_frame(), Some(&photo));
    assert_eq!(counter.state().snapshot(), Some(6));

    // The photo stays up for the whole freeze, whatever the camera sees.
    script.set(0);
    for _ in 1..FREEZE.as_secs() {
        let out = counter.process(camera_frame()).unwrap();
        assert_eq!(counter.stage(), Stage::Frozen);
        assert_eq!(out, photo);
        clock.advance(second());
    }

    let out = counter.process(camera_frame()).unwrap();
    assert_eq!(counter.stage(), Stage::Live);
    assert_eq!(counter.state(), &CaptureState::Live);
    assert_eq!(counter.display_count(), 0);
    assert_ne!(out, photo);
}

#[test]
fn dip_during_countdown_still_captures_snapshot() {
    let clock = ManualClock::new();
    let script = Script::default();
    let mut counter = Counter::new(script.clone(), &clock, Overlay::default());

    script.set(6);
    counter.process(camera_frame()).unwrap();
    assert_eq!(
        counter.stage(),
        Stage::Countdown {
            remaining: 5,
            snapshot: 6
        }
    );

    script.set(2);
    for _ in 0..4 {
        clock.advance(second());
        counter.process(camera_frame()).unwrap();
        assert_eq!(counter.person_count(), 2);
        assert!(matches!(counter.stage(), Stage::Countdown { snapshot: 6, .. }));
    }

    clock.advance(second());
    let photo = counter.process(camera_frame()).unwrap();
    assert_eq!(counter.stage(), Stage::Capture { snapshot: 6 });
    assert!(matches!(
        counter.state(),
        CaptureState::Frozen { snapshot: 6, .. }
    ));

    clock.advance(second());
    let frozen = counter.process(camera_frame()).unwrap();
    assert_eq!(frozen, photo);
}

#[test]
fn display_count_resets_after_photo() {
    let clock = ManualClock::new();
    let script = Script::default();
    let mut counter = Counter::new(script.clone(), &clock, Overlay::default());

    script.set(7);
    for _ in 0..6 {
        counter.process(camera_frame()).unwrap();
        clock.advance(second());
    }
    assert_eq!(counter.display_count(), 6);
    assert!(counter.state().frozen_frame().is_some());

    clock.advance(FREEZE);
    script.set(3);
    counter.process(camera_frame()).unwrap();
    assert_eq!(counter.state(), &CaptureState::Live);
    assert_eq!(counter.display_count(), 1);

    // A crowd on the release frame only starts a new countdown on the next one.
    script.set(6);
    counter.process(camera_frame()).unwrap();
    assert!(matches!(counter.stage(), Stage::Countdown { snapshot: 6, .. }));
}

/// Delivers a fixed number of frames, then fails like an unplugged camera.
struct FakeCamera {
    frames: VecDeque<Image>,
}

impl FakeCamera {
    fn new(frames: usize) -> Self {
        Self {
            frames: (0..frames).map(|_| camera_frame()).collect(),
        }
    }
}

impl FrameSource for FakeCamera {
    fn read(&mut self) -> anyhow::Result<Image> {
        self.frames
            .pop_front()
            .ok_or_else(|| anyhow!("failed to read frame from camera"))
    }
}

/// Counts presented frames and presses `q` after `quit_after` of them.
struct FakeScreen {
    presented: usize,
    quit_after: Option<usize>,
}

impl FrameSink for FakeScreen {
    fn present(&mut self, frame: &Image) {
        assert_eq!(frame.resolution(), WINDOW_RESOLUTION);
        self.presented += 1;
    }

    fn poll_exit(&mut self) -> bool {
        self.quit_after == Some(self.presented)
    }
}

#[test]
fn loop_ends_when_camera_fails() {
    let clock = ManualClock::new();
    let mut camera = FakeCamera::new(3);
    let mut counter = MinimalCounter::new(Script::default(), &clock);
    let mut screen = FakeScreen {
        presented: 0,
        quit_after: None,
    };

    let exit = run_loop(&mut camera, &mut counter, &mut screen).unwrap();
    assert_eq!(exit, Exit::EndOfStream);
    assert_eq!(screen.presented, 3);
}

#[test]
fn loop_ends_on_exit_key() {
    let clock = ManualClock::new();
    let mut camera = FakeCamera::new(10);
    let mut counter = Counter::new(Script::default(), &clock, Overlay::default());
    let mut screen = FakeScreen {
        presented: 0,
        quit_after: Some(2),
    };

    let exit = run_loop(&mut camera, &mut counter, &mut screen).unwrap();
    assert_eq!(exit, Exit::ExitKey);
    assert_eq!(screen.presented, 2);
    assert_eq!(camera.frames.len(), 8);
}
