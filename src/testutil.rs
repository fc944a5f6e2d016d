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
use std::any::TypeId;
use std::error::Error;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;

use crate::audio::AudioClock;
use crate::pattern::Instrument;
use crate::samples::{VoiceMix, VoiceTrigger};
use crate::scheduler::StepEvent;

/// Wait for the given predicate to return true or fail.
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    let tick = Duration::from_millis(5);
    let timeout = Duration::from_secs(3);

    loop {
        if start.elapsed() > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Writes one vector of samples per channel to an interleaved WAV file.
pub fn write_wav<S: hound::Sample + Copy + 'static>(
    path: PathBuf,
    samples: Vec<Vec<S>>,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    let (sample_format, bits_per_sample) = if TypeId::of::<S>() == TypeId::of::<f32>() {
        (SampleFormat::Float, 32)
    } else if TypeId::of::<S>() == TypeId::of::<i32>() {
        (SampleFormat::Int, 32)
    } else if TypeId::of::<S>() == TypeId::of::<i16>() {
        (SampleFormat::Int, 16)
    } else {
        return Err("Unsupported sample format".into());
    };

    let num_channels = samples.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let mut writer = WavWriter::new(
        File::create(path)?,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample,
            sample_format,
        },
    )?;

    let frames = samples.iter().map(Vec::len).max().unwrap_or(0);
    for frame in 0..frames {
        for channel in &samples {
            writer.write_sample(channel[frame])?;
        }
    }
    writer.finalize()?;

    Ok(())
}

/// An audio clock set by hand.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn set(&self, now: f64) {
        *self.now.lock() = now;
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}

/// A voice that was triggered.
#[derive(Clone, Debug, PartialEq)]
pub struct Triggered {
    pub instrument: Instrument,
    pub time: f64,
    pub mix: VoiceMix,
}

/// A voice trigger that records what it was asked to play.
#[derive(Clone, Default)]
pub struct RecordingTrigger {
    triggers: Arc<Mutex<Vec<Triggered>>>,
    effects: Arc<Mutex<Vec<(Option<String>, f64)>>>,
}

impl RecordingTrigger {
    pub fn triggers(&self) -> Vec<Triggered> {
        self.triggers.lock().clone()
    }

    pub fn effects(&self) -> Vec<(Option<String>, f64)> {
        self.effects.lock().clone()
    }
}

impl VoiceTrigger for RecordingTrigger {
    fn trigger(&mut self, instrument: Instrument, time: f64, mix: &VoiceMix) {
        self.triggers.lock().push(Triggered {
            instrument,
            time,
            mix: mix.clone(),
        });
    }

    fn configure_effect(&mut self, effect: Option<&str>, mix: f64) {
        self.effects.lock().push((effect.map(str::to_string), mix));
    }
}

/// Returns a step listener and the log it appends to.
pub fn event_log() -> (
    Arc<Mutex<Vec<StepEvent>>>,
    impl FnMut(StepEvent) + Send + 'static,
) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = events.clone();
    (events, move |event| log.lock().push(event))
}
