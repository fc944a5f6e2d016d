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
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config;

pub mod cpal;
mod error;
pub mod mixer;
pub mod mock;
mod reverb;

pub use error::AudioError;
pub use mixer::{AudioMixer, MixerCommand, ScheduledVoice};

/// Channel used to hand voices and settings to the mixer without locking it.
pub type MixerSender = crossbeam_channel::Sender<MixerCommand>;

/// A monotonic clock measured in seconds of rendered audio.
pub trait AudioClock: Send {
    /// The current audio time in seconds.
    fn now(&self) -> f64;
}

/// An audio clock driven by the number of frames the mixer has rendered.
#[derive(Clone, Debug)]
pub struct FrameClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl FrameClock {
    /// Creates a new clock at frame zero.
    pub fn new(sample_rate: u32) -> FrameClock {
        FrameClock {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate,
        }
    }

    /// The next frame that will be rendered.
    pub fn frame(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Records that the given number of frames has been rendered.
    pub fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::AcqRel);
    }

    /// The sample rate of the clock.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Converts an audio time in seconds to the nearest frame.
    pub fn frame_at(&self, time: f64) -> u64 {
        (time.max(0.0) * self.sample_rate as f64).round() as u64
    }
}

impl AudioClock for FrameClock {
    fn now(&self) -> f64 {
        self.frame() as f64 / self.sample_rate as f64
    }
}

/// An output that renders the mixer and exposes its clock.
pub trait Device: fmt::Display + Send {
    /// The clock advanced by this device's mixer.
    fn clock(&self) -> FrameClock;

    /// A sender for scheduling voices on this device's mixer.
    fn sender(&self) -> MixerSender;
}

/// Lists the output devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, AudioError> {
    cpal::Device::list()
}

/// Gets the output device described by the configuration.
pub fn get_device(config: &config::Audio) -> Result<Box<dyn Device>, AudioError> {
    let name = config.device();
    if name.starts_with("mock") {
        let device = mock::Device::get(
            name,
            config.channels(),
            config.sample_rate(),
            config.master_gain(),
        );
        device.start_pacing();
        return Ok(Box::new(device));
    }

    Ok(Box::new(cpal::Device::get(config)?))
}
