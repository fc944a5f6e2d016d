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

//! The drum sampler: a pattern, the transport that plays it and the voices it plays through.

use tracing::{debug, info, span, warn, Level, Span};

use crate::audio::AudioClock;
use crate::pattern::{Hit, Instrument, Pattern, PatternError};
use crate::samples::VoiceTrigger;
use crate::scheduler::{Scheduler, StepEvent, Timing};

pub mod driver;

pub use driver::Transport;

/// Receives step highlight notifications.
pub type StepListener = Box<dyn FnMut(StepEvent) + Send>;

/// Owns the pattern and transport of one sampler instance.
///
/// All operations take effect atomically with respect to the scheduling loop, which
/// must be driven by calling [`Sampler::tick`] frequently while playing.
pub struct Sampler<C: AudioClock, T: VoiceTrigger> {
    clock: C,
    trigger: T,
    pattern: Pattern,
    scheduler: Scheduler,
    listener: StepListener,
    span: Span,
}

impl<C: AudioClock, T: VoiceTrigger> Sampler<C, T> {
    /// Creates a stopped sampler holding the demo beat.
    pub fn new(clock: C, trigger: T, timing: Timing) -> Sampler<C, T> {
        let mut sampler = Sampler {
            clock,
            trigger,
            pattern: Pattern::demo(),
            scheduler: Scheduler::new(timing),
            listener: Box::new(|_| {}),
            span: span!(Level::INFO, "sampler"),
        };
        sampler.configure_effect();
        sampler
    }

    /// Replaces the step highlight listener.
    pub fn set_listener(&mut self, listener: impl FnMut(StepEvent) + Send + 'static) {
        self.listener = Box::new(listener);
    }

    /// The current pattern.
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// The voice trigger.
    pub fn trigger(&self) -> &T {
        &self.trigger
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_playing()
    }

    /// Starts playback from the first step and schedules the opening lookahead window.
    /// Returns false if already playing.
    pub fn play(&mut self) -> bool {
        {
            let _enter = self.span.enter();
            if !self.scheduler.play(self.clock.now()) {
                return false;
            }
            info!(tempo = self.pattern.tempo(), "Playing");
        }
        self.tick();
        true
    }

    /// Stops playback. Returns false if already stopped.
    pub fn stop(&mut self) -> bool {
        let _enter = self.span.enter();
        if !self.scheduler.stop(&mut self.listener) {
            return false;
        }
        info!("Stopped");
        true
    }

    /// Plays if stopped and stops if playing. Returns true if now playing.
    pub fn toggle(&mut self) -> bool {
        if self.is_playing() {
            self.stop();
        } else {
            self.play();
        }
        self.is_playing()
    }

    /// Schedules every step inside the lookahead window. Returns the number of steps
    /// scheduled.
    pub fn tick(&mut self) -> usize {
        self.scheduler.tick(
            self.clock.now(),
            &self.pattern,
            &mut self.trigger,
            &mut self.listener,
        )
    }

    /// Sets one cell of the grid. Takes effect from the next scheduled step.
    ///
    /// # Panics
    ///
    /// Panics if `step` is out of range.
    pub fn set_cell(&mut self, instrument: Instrument, step: usize, hit: Hit) {
        self.pattern.set_cell(instrument, step, hit);
    }

    pub fn set_tempo(&mut self, tempo: u32) -> Result<(), PatternError> {
        self.pattern.set_tempo(tempo)
    }

    pub fn set_swing_factor(&mut self, swing_factor: f64) -> Result<(), PatternError> {
        self.pattern.set_swing_factor(swing_factor)
    }

    /// Selects the reverb impulse by name, or disables the reverb.
    pub fn set_effect(&mut self, effect: Option<String>) {
        self.pattern.set_effect(effect);
        self.configure_effect();
    }

    pub fn set_effect_mix(&mut self, effect_mix: f64) -> Result<(), PatternError> {
        self.pattern.set_effect_mix(effect_mix)?;
        self.configure_effect();
        Ok(())
    }

    /// Stops the transport and replaces the pattern wholesale.
    pub fn load(&mut self, pattern: Pattern) {
        self.stop();
        self.pattern = pattern;
        self.configure_effect();

        let _enter = self.span.enter();
        info!(
            tempo = self.pattern.tempo(),
            kit = self.pattern.kit(),
            effect = self.pattern.effect(),
            "Loaded pattern"
        );
    }

    /// Parses and loads a serialized pattern. On failure the current pattern and
    /// transport are left untouched.
    pub fn load_json(&mut self, data: &str) -> Result<(), PatternError> {
        match Pattern::from_json(data) {
            Ok(pattern) => {
                self.load(pattern);
                Ok(())
            }
            Err(e) => {
                let _enter = self.span.enter();
                warn!(err = %e, "Rejected pattern");
                Err(e)
            }
        }
    }

    /// Serializes the current pattern.
    pub fn serialize(&self) -> Result<String, PatternError> {
        self.pattern.to_json()
    }

    /// Stops the transport and clears the grid.
    pub fn reset(&mut self) {
        self.load(Pattern::empty());
    }

    fn configure_effect(&mut self) {
        debug!(
            effect = self.pattern.effect(),
            mix = self.pattern.effect_mix(),
            "Configuring effect"
        );
        self.trigger
            .configure_effect(self.pattern.effect(), self.pattern.effect_mix());
    }
}

impl<C: AudioClock, T: VoiceTrigger> Drop for Sampler<C, T> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::START_DELAY;
    use crate::testutil::{event_log, ManualClock, RecordingTrigger};

    fn sampler() -> (Sampler<ManualClock, RecordingTrigger>, ManualClock, RecordingTrigger) {
        let clock = ManualClock::default();
        let trigger = RecordingTrigger::default();
        let sampler = Sampler::new(clock.clone(), trigger.clone(), Timing::default());
        (sampler, clock, trigger)
    }

    #[test]
    fn test_play_schedules_first_window() {
        let (mut sampler, clock, trigger) = sampler();
        clock.set(4.0);

        assert!(sampler.play());
        assert!(!sampler.play());

        let triggers = trigger.triggers();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].instrument, Instrument::Kick);
        assert_eq!(triggers[0].time, 4.0 + START_DELAY);
    }

    #[test]
    fn test_tick_follows_the_clock() {
        let (mut sampler, clock, trigger) = sampler();
        let (events, listener) = event_log();
        sampler.set_listener(listener);

        sampler.play();
        assert_eq!(sampler.tick(), 0);

        clock.set(1.0);
        assert!(sampler.tick() > 0);
        assert!(trigger
            .triggers()
            .iter()
            .any(|t| t.instrument == Instrument::Snare));
        assert!(events
            .lock()
            .iter()
            .all(|event| matches!(event, StepEvent::Step { .. })));
    }

    #[test]
    fn test_toggle() {
        let (mut sampler, _, _) = sampler();
        let (events, listener) = event_log();
        sampler.set_listener(listener);

        assert!(sampler.toggle());
        assert!(!sampler.toggle());
        assert!(sampler.toggle());
        assert!(sampler.is_playing());

        let stopped = events
            .lock()
            .iter()
            .filter(|event| **event == StepEvent::Stopped)
            .count();
        assert_eq!(stopped, 1);
    }

    #[test]
    fn test_edits_apply_to_next_step() {
        let (mut sampler, clock, trigger) = sampler();
        sampler.reset();
        sampler.play();
        assert!(trigger.triggers().is_empty());

        sampler.set_cell(Instrument::Snare, 4, Hit::Soft);
        clock.set(0.5);
        sampler.tick();

        let triggers = trigger.triggers();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].instrument, Instrument::Snare);
        assert!((triggers[0].time - (START_DELAY + 0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_failed_load_changes_nothing() {
        let (mut sampler, _, _) = sampler();
        sampler.play();
        let before = sampler.pattern().clone();

        assert!(sampler.load_json(r#"{"tempo": 500}"#).is_err());
        assert_eq!(sampler.pattern(), &before);
        assert!(sampler.is_playing());
    }

    #[test]
    fn test_load_replaces_and_stops() {
        let (mut sampler, _, trigger) = sampler();
        let (events, listener) = event_log();
        sampler.set_listener(listener);
        sampler.play();

        let mut pattern = Pattern::empty();
        pattern.set_tempo(90).unwrap();
        pattern.set_effect(Some("hall".to_string()));
        pattern.set_effect_mix(0.5).unwrap();
        sampler.load_json(&pattern.to_json().unwrap()).unwrap();

        assert!(!sampler.is_playing());
        assert_eq!(sampler.pattern(), &pattern);
        assert_eq!(events.lock().last(), Some(&StepEvent::Stopped));
        assert_eq!(
            trigger.effects().last(),
            Some(&(Some("hall".to_string()), 0.5))
        );
    }

    #[test]
    fn test_serialize_round_trip() {
        let (mut sampler, _, _) = sampler();
        sampler.set_cell(Instrument::HiHat, 15, Hit::Hard);
        sampler.set_swing_factor(0.4).unwrap();
        let saved = sampler.serialize().unwrap();

        let (mut other, _, _) = self::sampler();
        other.load_json(&saved).unwrap();
        assert_eq!(other.pattern(), sampler.pattern());
    }

    #[test]
    fn test_reset() {
        let (mut sampler, _, _) = sampler();
        let (events, listener) = event_log();
        sampler.set_listener(listener);
        sampler.play();

        sampler.reset();
        assert!(!sampler.is_playing());
        assert_eq!(sampler.pattern(), &Pattern::empty());
        assert_eq!(*events.lock(), vec![StepEvent::Stopped]);
    }

    #[test]
    fn test_drop_stops() {
        let (mut sampler, _, _) = sampler();
        let (events, listener) = event_log();
        sampler.set_listener(listener);
        sampler.play();

        drop(sampler);
        assert_eq!(events.lock().last(), Some(&StepEvent::Stopped));
    }

    #[test]
    fn test_bad_settings_are_rejected() {
        let (mut sampler, _, _) = sampler();
        assert!(sampler.set_tempo(49).is_err());
        assert!(sampler.set_swing_factor(1.5).is_err());
        assert!(sampler.set_effect_mix(-0.1).is_err());
        assert_eq!(sampler.pattern(), &Pattern::demo());
    }
}
