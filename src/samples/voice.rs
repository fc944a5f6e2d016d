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

//! Voice triggering.
//!
//! Turns a step of the pattern into one-shot voices scheduled on the mixer at an exact
//! audio-clock time.

use std::sync::Arc;

use tracing::{debug, error};

use super::bank::SampleBank;
use crate::audio::mixer::Panner;
use crate::audio::{FrameClock, MixerCommand, MixerSender, ScheduledVoice};
use crate::pattern::{Hit, Instrument, Pattern};

/// Gain of the dry path for every voice.
const DRY_MIX: f32 = 1.0;

/// Gain of the wet path for every voice.
const WET_MIX: f32 = 1.0;

/// Mix parameters for one triggered voice.
#[derive(Clone, Debug, PartialEq)]
pub struct VoiceMix {
    /// Volume of the voice before the dry/wet split.
    pub gain: f32,
    /// Level sent to the reverb.
    pub send: f32,
    /// Position of the voice, if it should be spatially panned.
    pub position: Option<[f32; 3]>,
    /// Playback rate, where 1.0 is the original speed.
    pub playback_rate: f64,
}

impl VoiceMix {
    /// The mix for an instrument played at the given hit level and step.
    pub fn for_hit(instrument: Instrument, hit: Hit, step: usize) -> VoiceMix {
        let (scalar, send) = match instrument {
            Instrument::Kick => (1.0, 0.5),
            Instrument::Snare => (0.6, 1.0),
            Instrument::HiHat => (0.7, 1.0),
            Instrument::Tom1 | Instrument::Tom2 | Instrument::Tom3 => (0.6, 1.0),
        };

        // The hi-hat sweeps across the stereo field over the loop.
        let position = match instrument {
            Instrument::HiHat => Some([0.5 * step as f32 - 4.0, 0.0, -1.0]),
            _ => None,
        };

        VoiceMix {
            gain: hit.volume() * scalar,
            send,
            position,
            playback_rate: 1.0,
        }
    }
}

/// Schedules one-shot voices at exact audio-clock times.
pub trait VoiceTrigger: Send {
    /// Schedules one voice of the instrument at the given time in seconds.
    fn trigger(&mut self, instrument: Instrument, time: f64, mix: &VoiceMix);

    /// Applies the pattern's reverb selection and blend.
    fn configure_effect(&mut self, _effect: Option<&str>, _mix: f64) {}

    /// Schedules every instrument that is on at the given step.
    fn trigger_step(&mut self, pattern: &Pattern, step: usize, time: f64) {
        for instrument in Instrument::ALL {
            let hit = pattern.hit(instrument, step);
            if hit.is_on() {
                self.trigger(instrument, time, &VoiceMix::for_hit(instrument, hit, step));
            }
        }
    }
}

/// Voice trigger that plays kit samples through a mixer.
pub struct MixerVoiceTrigger {
    bank: Arc<SampleBank>,
    sender: MixerSender,
    clock: FrameClock,
    /// Longest impulse response handed to the reverb, in frames.
    max_impulse_frames: usize,
}

impl MixerVoiceTrigger {
    /// Creates a new trigger playing samples from the bank.
    pub fn new(
        bank: Arc<SampleBank>,
        sender: MixerSender,
        clock: FrameClock,
        max_impulse_frames: usize,
    ) -> MixerVoiceTrigger {
        MixerVoiceTrigger {
            bank,
            sender,
            clock,
            max_impulse_frames,
        }
    }

    fn send(&self, command: MixerCommand) {
        if let Err(e) = self.sender.send(command) {
            error!(error = %e, "Failed to send to mixer");
        }
    }
}

impl VoiceTrigger for MixerVoiceTrigger {
    fn trigger(&mut self, instrument: Instrument, time: f64, mix: &VoiceMix) {
        let Some(sample) = self.bank.get(instrument.sample_name()) else {
            debug!(instrument = %instrument, "No sample loaded, skipping voice");
            return;
        };

        let voice = ScheduledVoice {
            sample: sample.clone(),
            start_frame: self.clock.frame_at(time),
            playback_rate: mix.playback_rate,
            dry_gain: mix.gain * DRY_MIX,
            wet_gain: mix.send * WET_MIX,
            panner: mix.position.map(|[x, y, z]| Panner::at(x, y, z)),
        };
        self.send(MixerCommand::Schedule(voice));
    }

    fn configure_effect(&mut self, effect: Option<&str>, mix: f64) {
        let impulse = match effect.and_then(|name| self.bank.impulse(name)) {
            Some(impulse) => impulse.to_mono(self.max_impulse_frames),
            None => {
                if let Some(name) = effect {
                    debug!(effect = name, "No impulse loaded for effect");
                }
                Vec::new()
            }
        };
        self.send(MixerCommand::SetImpulse(impulse));
        self.send(MixerCommand::SetEffectLevel(mix as f32));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioMixer;
    use crate::samples::LoadedSample;

    #[test]
    fn test_mix_table() {
        let kick = VoiceMix::for_hit(Instrument::Kick, Hit::Hard, 0);
        assert_eq!(kick.gain, 1.0);
        assert_eq!(kick.send, 0.5);
        assert_eq!(kick.position, None);

        let snare = VoiceMix::for_hit(Instrument::Snare, Hit::Soft, 4);
        assert!((snare.gain - 0.18).abs() < 1e-6);

        let hihat = VoiceMix::for_hit(Instrument::HiHat, Hit::Hard, 6);
        assert!((hihat.gain - 0.7).abs() < 1e-6);
        assert_eq!(hihat.position, Some([-1.0, 0.0, -1.0]));

        let off = VoiceMix::for_hit(Instrument::Tom2, Hit::Off, 0);
        assert_eq!(off.gain, 0.0);
    }

    #[test]
    fn test_trigger_schedules_on_exact_frame() {
        let (mut mixer, sender) = AudioMixer::new(1, 1000, 1.0);
        let mut bank = SampleBank::new();
        bank.insert("kick", LoadedSample::new(vec![1.0], 1, 1000));

        let mut trigger = MixerVoiceTrigger::new(Arc::new(bank), sender, mixer.clock(), 1024);
        trigger.trigger(
            Instrument::Kick,
            0.005,
            &VoiceMix::for_hit(Instrument::Kick, Hit::Hard, 0),
        );

        let output = mixer.process_frames(8);
        assert_eq!(output[4], 0.0);
        assert_eq!(output[5], 1.0);
        assert_eq!(output[6], 0.0);
    }

    #[test]
    fn test_missing_voice_is_skipped() {
        let (mut mixer, sender) = AudioMixer::new(1, 1000, 1.0);
        let mut bank = SampleBank::new();
        bank.insert("snare", LoadedSample::new(vec![1.0], 1, 1000));

        let mut trigger = MixerVoiceTrigger::new(Arc::new(bank), sender, mixer.clock(), 1024);
        let mut pattern = Pattern::empty();
        pattern.set_cell(Instrument::Kick, 0, Hit::Hard);
        pattern.set_cell(Instrument::Snare, 0, Hit::Hard);
        trigger.trigger_step(&pattern, 0, 0.0);

        let output = mixer.process_frames(2);
        assert!((output[0] - 0.6).abs() < 1e-6);
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn test_configure_effect() {
        let (mut mixer, sender) = AudioMixer::new(1, 1000, 1.0);
        let mut bank = SampleBank::new();
        bank.insert("kick", LoadedSample::new(vec![1.0], 1, 1000));
        bank.insert_impulse("room", LoadedSample::new(vec![0.0, 1.0], 1, 1000));

        let mut trigger = MixerVoiceTrigger::new(Arc::new(bank), sender, mixer.clock(), 1024);
        trigger.configure_effect(Some("room"), 1.0);

        let mut mix = VoiceMix::for_hit(Instrument::Kick, Hit::Hard, 0);
        mix.gain = 0.0;
        trigger.trigger(Instrument::Kick, 0.0, &mix);

        let output = mixer.process_frames(2);
        assert_eq!(output[0], 0.0);
        assert!(output[1] > 0.0);

        // Unknown effects clear the reverb.
        trigger.configure_effect(Some("cathedral"), 1.0);
        trigger.trigger(Instrument::Kick, 0.002, &mix);
        let output = mixer.process_frames(2);
        assert!(output.iter().all(|sample| *sample == 0.0));
    }
}
