// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The transport and its lookahead scheduling loop.
//!
//! The control thread may run late by an arbitrary amount, so the scheduler never
//! plays anything itself. Each tick it looks a fixed window ahead of the audio clock
//! and hands every step that falls inside that window to the voice trigger, stamped
//! with the exact audio time the step must sound at.

use std::time::Duration;

use tracing::{debug, trace};

use crate::pattern::{Pattern, MAX_SWING, STEPS};
use crate::samples::VoiceTrigger;

/// How far ahead of the audio clock steps are scheduled, in seconds.
pub const LOOKAHEAD: f64 = 0.2;

/// Offset from the current audio time to the first step, in seconds.
pub const START_DELAY: f64 = 0.005;

/// A notification for the step highlighter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepEvent {
    /// The given step is sounding from the given audio-clock time.
    Step { step: usize, time: f64 },
    /// The transport stopped; no step is highlighted.
    Stopped,
}

/// Position of a running transport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cursor {
    /// Audio time at which the loop logically began.
    start_time: f64,
    /// The next step to schedule.
    step: usize,
    /// Offset from the start time to the next step, in seconds.
    cursor_time: f64,
    /// The cursor time most recently sent to the highlighter.
    last_notified: Option<f64>,
}

impl Cursor {
    fn new(start_time: f64) -> Cursor {
        Cursor {
            start_time,
            step: 0,
            cursor_time: 0.0,
            last_notified: None,
        }
    }

    /// Audio time at which the loop logically began.
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// The next step to schedule.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Audio time of the next step to schedule.
    pub fn next_time(&self) -> f64 {
        self.start_time + self.cursor_time
    }
}

/// The state of the transport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransportState {
    Stopped,
    Playing(Cursor),
}

/// Timing constants of the scheduling loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timing {
    /// Seconds of audio scheduled ahead of the clock.
    pub lookahead: f64,
    /// Seconds between play and the first step.
    pub start_delay: f64,
}

impl Timing {
    pub fn new(lookahead: Duration, start_delay: Duration) -> Timing {
        Timing {
            lookahead: lookahead.as_secs_f64(),
            start_delay: start_delay.as_secs_f64(),
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            lookahead: LOOKAHEAD,
            start_delay: START_DELAY,
        }
    }
}

/// The duration from the previous step to `next_step`, in seconds.
///
/// Odd steps land late and even steps land early by the same amount, so each pair of
/// steps always spans exactly half a beat.
pub fn step_duration(pattern: &Pattern, next_step: usize) -> f64 {
    let swing = MAX_SWING * pattern.swing_factor();
    let fraction = if next_step % 2 == 1 {
        0.25 + swing
    } else {
        0.25 - swing
    };
    fraction * pattern.seconds_per_beat()
}

/// Transport state machine driving the voice trigger from a pattern.
#[derive(Debug)]
pub struct Scheduler {
    timing: Timing,
    state: TransportState,
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new(Timing::default())
    }
}

impl Scheduler {
    /// Creates a stopped scheduler.
    pub fn new(timing: Timing) -> Scheduler {
        Scheduler {
            timing,
            state: TransportState::Stopped,
        }
    }

    /// The timing constants in use.
    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// The current transport state.
    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Returns true if the transport is playing.
    pub fn is_playing(&self) -> bool {
        matches!(self.state, TransportState::Playing(_))
    }

    /// Starts the transport at the given audio time. Returns false if it was already
    /// playing, in which case nothing changes.
    pub fn play(&mut self, now: f64) -> bool {
        if self.is_playing() {
            return false;
        }

        let start_time = now + self.timing.start_delay;
        debug!(start_time, "Transport playing");
        self.state = TransportState::Playing(Cursor::new(start_time));
        true
    }

    /// Stops the transport and tells the listener once. Returns false if it was already
    /// stopped, in which case the listener is not called.
    pub fn stop(&mut self, listener: &mut impl FnMut(StepEvent)) -> bool {
        if !self.is_playing() {
            return false;
        }

        debug!("Transport stopped");
        self.state = TransportState::Stopped;
        listener(StepEvent::Stopped);
        true
    }

    /// Schedules every step that starts within the lookahead window of `now`.
    /// Returns the number of steps scheduled.
    pub fn tick<T: VoiceTrigger + ?Sized>(
        &mut self,
        now: f64,
        pattern: &Pattern,
        trigger: &mut T,
        listener: &mut impl FnMut(StepEvent),
    ) -> usize {
        let TransportState::Playing(mut cursor) = self.state else {
            return 0;
        };

        let elapsed = now - cursor.start_time;
        let mut scheduled = 0;
        while cursor.cursor_time < elapsed + self.timing.lookahead {
            let time = cursor.start_time + cursor.cursor_time;
            trigger.trigger_step(pattern, cursor.step, time);

            if cursor.last_notified != Some(cursor.cursor_time) {
                cursor.last_notified = Some(cursor.cursor_time);
                listener(StepEvent::Step {
                    step: (cursor.step + STEPS - 1) % STEPS,
                    time,
                });
            }

            trace!(step = cursor.step, time, "Step scheduled");
            cursor.step = (cursor.step + 1) % STEPS;
            cursor.cursor_time += step_duration(pattern, cursor.step);
            scheduled += 1;
        }

        self.state = TransportState::Playing(cursor);
        scheduled
    }
}
