//! The photo capture sequence.
//!
//! Once enough people are in view, a countdown starts; when it runs out, the rendered frame is
//! captured and shown frozen for a while, then the display returns to live detection:
//!
//! ```text
//! Live --(count >= THRESHOLD)--> CountingDown --(COUNTDOWN elapsed)--> Frozen --(FREEZE elapsed)--> Live
//! ```
//!
//! There is no way to cancel a running countdown. The person count at the moment the countdown
//! starts is kept as a snapshot and governs everything shown until the display returns to live.

use std::time::{Duration, Instant};

use crate::image::Image;

/// Number of people needed to form a cooperative.
pub const THRESHOLD: usize = 6;

/// Time between reaching [`THRESHOLD`] and taking the photo.
pub const COUNTDOWN: Duration = Duration::from_secs(5);

/// Time the captured photo stays on screen.
pub const FREEZE: Duration = Duration::from_secs(15);

/// State of the capture sequence.
///
/// Transitions consume the current state and return the next one.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CaptureState {
    /// Detections are rendered live.
    #[default]
    Live,
    /// The quota was met; a photo will be taken at `deadline`.
    CountingDown {
        deadline: Instant,
        /// The person count on the frame that started the countdown.
        snapshot: usize,
    },
    /// A photo was taken and is displayed instead of the camera feed until `until`.
    Frozen {
        until: Instant,
        snapshot: usize,
        frame: Image,
    },
}

/// Notable transitions reported by [`CaptureState::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing changed.
    None,
    /// The countdown started with the given person count.
    Triggered { snapshot: usize },
    /// The frozen photo was released and the display is live again.
    Released,
}

/// What should be shown for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Regular live rendering.
    Live,
    /// Live rendering with the countdown digit on top.
    Countdown {
        /// Whole seconds left, rounded up (5, 4, 3, 2 or 1).
        remaining: u32,
        snapshot: usize,
    },
    /// This frame becomes the photo. Render it with the capture caption, then pass it to
    /// [`CaptureState::capture`].
    Capture { snapshot: usize },
    /// The frozen photo is on screen.
    Frozen,
}

impl CaptureState {
    /// Evaluates the state-driven transitions for a frame with `person_count` people at `now`.
    ///
    /// At most one transition happens per call. The transition into [`CaptureState::Frozen`]
    /// needs the rendered frame and is done by [`CaptureState::capture`] instead.
    #[must_use]
    pub fn advance(self, person_count: usize, now: Instant) -> (CaptureState, Transition) {
        match self {
            CaptureState::Live if person_count >= THRESHOLD => (
                CaptureState::CountingDown {
                    deadline: now + COUNTDOWN,
                    snapshot: person_count,
                },
                Transition::Triggered {
                    snapshot: person_count,
                },
            ),
            CaptureState::Frozen { until, .. } if now >= until => {
                (CaptureState::Live, Transition::Released)
            }
            state => (state, Transition::None),
        }
    }

    /// Takes the photo: moves from an expired countdown to [`CaptureState::Frozen`], holding
    /// `frame` until `now + FREEZE`.
    ///
    /// In any other state, `frame` is dropped and the state is returned unchanged.
    #[must_use]
    pub fn capture(self, frame: Image, now: Instant) -> CaptureState {
        match self {
            CaptureState::CountingDown { deadline, snapshot } if now >= deadline => {
                CaptureState::Frozen {
                    until: now + FREEZE,
                    snapshot,
                    frame,
                }
            }
            state => {
                log::warn!("ignoring capture in state {:?}", state.name());
                state
            }
        }
    }

    /// Determines what to show at `now`.
    pub fn stage(&self, now: Instant) -> Stage {
        match self {
            CaptureState::Live => Stage::Live,
            CaptureState::CountingDown { deadline, snapshot } => {
                let left = deadline.saturating_duration_since(now);
                if left.is_zero() {
                    Stage::Capture {
                        snapshot: *snapshot,
                    }
                } else {
                    Stage::Countdown {
                        remaining: ceil_secs(left),
                        snapshot: *snapshot,
                    }
                }
            }
            CaptureState::Frozen { .. } => Stage::Frozen,
        }
    }

    /// Returns the captured photo if it should still be on screen at `now`.
    pub fn frozen_frame_at(&self, now: Instant) -> Option<&Image> {
        match self {
            CaptureState::Frozen { until, frame, .. } if now < *until => Some(frame),
            _ => None,
        }
    }

    /// Returns the captured photo, if in [`CaptureState::Frozen`].
    pub fn frozen_frame(&self) -> Option<&Image> {
        match self {
            CaptureState::Frozen { frame, .. } => Some(frame),
            _ => None,
        }
    }

    /// Returns the person count snapshot taken when the countdown started.
    pub fn snapshot(&self) -> Option<usize> {
        match self {
            CaptureState::Live => None,
            CaptureState::CountingDown { snapshot, .. } | CaptureState::Frozen { snapshot, .. } => {
                Some(*snapshot)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CaptureState::Live => "LIVE",
            CaptureState::CountingDown { .. } => "COUNTING_DOWN",
            CaptureState::Frozen { .. } => "FROZEN",
        }
    }
}

fn ceil_secs(d: Duration) -> u32 {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    ((d.as_nanos() + NANOS_PER_SEC - 1) / NANOS_PER_SEC) as u32
}

/// The person count shown in the counter panel.
///
/// It follows the real count by at most one step per frame, so the number ticks up and down
/// instead of jumping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayCount(usize);

impl DisplayCount {
    #[inline]
    pub fn get(&self) -> usize {
        self.0
    }

    /// Moves one step toward `target`, never past it.
    pub fn step_toward(&mut self, target: usize) {
        if self.0 < target {
            self.0 += 1;
        } else if self.0 > target {
            self.0 -= 1;
        }
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}
