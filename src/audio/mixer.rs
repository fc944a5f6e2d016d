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
// Core mixing logic shared by the cpal and mock devices. Voices arrive over a channel with
// the frame they should start on, so the control thread never touches the mixer directly.
use std::f32::consts::FRAC_PI_2;
use std::f32::consts::FRAC_PI_4;

use tracing::debug;

use super::reverb::Convolver;
use super::{FrameClock, MixerSender};
use crate::samples::LoadedSample;

/// A change requested of the mixer.
pub enum MixerCommand {
    /// Plays a voice starting at its scheduled frame.
    Schedule(ScheduledVoice),
    /// Sets the master gain.
    SetMasterGain(f32),
    /// Sets the level of the reverb return.
    SetEffectLevel(f32),
    /// Replaces the reverb impulse response. An empty impulse disables the reverb.
    SetImpulse(Vec<f32>),
}

/// A one-shot playback of a sample at an exact frame.
pub struct ScheduledVoice {
    /// The decoded sample to play.
    pub sample: LoadedSample,
    /// The frame on the audio clock at which playback starts.
    pub start_frame: u64,
    /// Playback rate, where 1.0 is the original speed.
    pub playback_rate: f64,
    /// Gain into the dry path.
    pub dry_gain: f32,
    /// Gain into the reverb send.
    pub wet_gain: f32,
    /// Optional stereo placement.
    pub panner: Option<Panner>,
}

/// Equal-power stereo placement derived from a source position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Panner {
    left: f32,
    right: f32,
}

impl Panner {
    /// Places a source at the given position relative to a listener at the origin facing -z.
    /// Only the azimuth is used; elevation and distance are ignored.
    pub fn at(x: f32, _y: f32, z: f32) -> Panner {
        let azimuth = x.atan2(-z).clamp(-FRAC_PI_2, FRAC_PI_2);
        let angle = (azimuth / FRAC_PI_2 + 1.0) * FRAC_PI_4;
        Panner {
            left: angle.cos(),
            right: angle.sin(),
        }
    }

    /// The left channel gain.
    pub fn left(&self) -> f32 {
        self.left
    }

    /// The right channel gain.
    pub fn right(&self) -> f32 {
        self.right
    }
}

/// A voice that has been handed to the mixer.
struct ActiveVoice {
    voice: ScheduledVoice,
    /// Read position in sample frames.
    position: f64,
    finished: bool,
}

impl ActiveVoice {
    /// Mixes this voice into an interleaved output block and the mono wet bus.
    fn render(&mut self, block_start: u64, channels: usize, output: &mut [f32], wet: &mut [f32]) {
        for (i, frame) in output.chunks_exact_mut(channels).enumerate() {
            if block_start + (i as u64) < self.voice.start_frame {
                continue;
            }

            let Some((left, right)) = self.voice.sample.frame_at(self.position) else {
                self.finished = true;
                return;
            };
            self.position += self.voice.playback_rate;

            let (left, right) = match self.voice.panner {
                Some(panner) => {
                    let mono = (left + right) * 0.5;
                    (mono * panner.left, mono * panner.right)
                }
                None => (left, right),
            };

            let dry = self.voice.dry_gain;
            if channels == 1 {
                frame[0] += (left + right) * 0.5 * dry;
            } else {
                frame[0] += left * dry;
                frame[1] += right * dry;
            }
            wet[i] += (left + right) * 0.5 * self.voice.wet_gain;
        }
    }
}

/// Mixes scheduled voices and the shared reverb into the master bus.
pub struct AudioMixer {
    /// Number of interleaved output channels.
    channels: u16,
    /// Clock advanced by every rendered block.
    clock: FrameClock,
    /// Incoming commands from the control thread.
    commands: crossbeam_channel::Receiver<MixerCommand>,
    /// Voices that are playing or waiting for their start frame.
    voices: Vec<ActiveVoice>,
    /// Shared reverb fed by the voices' sends.
    reverb: Convolver,
    /// Gain applied to the dry and wet paths together.
    master_gain: f32,
    /// Gain applied to the reverb return.
    effect_level: f32,
    /// Scratch buffer for the mono reverb send.
    wet: Vec<f32>,
}

impl AudioMixer {
    /// Creates a new mixer and the sender used to feed it.
    pub fn new(channels: u16, sample_rate: u32, master_gain: f32) -> (AudioMixer, MixerSender) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mixer = AudioMixer {
            channels: channels.max(1),
            clock: FrameClock::new(sample_rate),
            commands: rx,
            voices: Vec::new(),
            reverb: Convolver::default(),
            master_gain,
            effect_level: 1.0,
            wet: Vec::new(),
        };
        (mixer, tx)
    }

    /// The clock this mixer advances.
    pub fn clock(&self) -> FrameClock {
        self.clock.clone()
    }

    /// The number of interleaved output channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// The output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }

    /// The number of voices playing or waiting to start.
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    fn apply(&mut self, command: MixerCommand) {
        match command {
            MixerCommand::Schedule(voice) => self.voices.push(ActiveVoice {
                voice,
                position: 0.0,
                finished: false,
            }),
            MixerCommand::SetMasterGain(gain) => self.master_gain = gain,
            MixerCommand::SetEffectLevel(level) => self.effect_level = level,
            MixerCommand::SetImpulse(impulse) => {
                debug!(taps = impulse.len(), "Reverb impulse replaced");
                self.reverb.set_impulse(impulse);
            }
        }
    }

    /// Renders the next block into an interleaved output buffer and advances the clock.
    pub fn process_into(&mut self, output: &mut [f32]) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }

        let channels = self.channels as usize;
        let frames = output.len() / channels;
        let output = &mut output[..frames * channels];
        output.fill(0.0);

        self.wet.clear();
        self.wet.resize(frames, 0.0);

        let block_start = self.clock.frame();
        for voice in self.voices.iter_mut() {
            voice.render(block_start, channels, output, &mut self.wet);
        }
        self.voices.retain(|voice| !voice.finished);

        if self.reverb.is_active() {
            self.reverb.process(&mut self.wet);
            for (frame, wet) in output.chunks_exact_mut(channels).zip(self.wet.iter()) {
                let wet = wet * self.effect_level;
                for sample in frame.iter_mut().take(2) {
                    *sample += wet;
                }
            }
        }

        for sample in output.iter_mut() {
            *sample = (*sample * self.master_gain).clamp(-1.0, 1.0);
        }

        self.clock.advance(frames as u64);
    }

    /// Renders the given number of frames into a new buffer.
    pub fn process_frames(&mut self, frames: usize) -> Vec<f32> {
        let mut output = vec![0.0; frames * self.channels as usize];
        self.process_into(&mut output);
        output
    }
}
