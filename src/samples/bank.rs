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

//! Sample loading for drum kits.
//!
//! Kit voices are decoded entirely into memory once, before playback starts. A voice that
//! fails to decode is left out of the bank and stays silent.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::error::SampleError;

/// A decoded sample that can be shared between voices.
#[derive(Clone)]
pub struct LoadedSample {
    /// Interleaved sample data.
    data: Arc<Vec<f32>>,
    /// Number of channels in the sample.
    channel_count: u16,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl LoadedSample {
    /// Creates a sample from interleaved data.
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> LoadedSample {
        LoadedSample {
            data: Arc::new(data),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// Decodes a WAV file and resamples it to the target rate.
    pub fn from_file(path: &Path, target_sample_rate: u32) -> Result<LoadedSample, SampleError> {
        let decode_err = |source| SampleError::Decode {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = hound::WavReader::open(path).map_err(decode_err)?;
        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(decode_err)?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 * scale))
                    .collect::<Result<_, _>>()
                    .map_err(decode_err)?
            }
        };

        if samples.is_empty() {
            return Err(SampleError::Empty {
                path: path.to_path_buf(),
            });
        }

        let samples = if spec.sample_rate != target_sample_rate {
            debug!(
                source_rate = spec.sample_rate,
                target_rate = target_sample_rate,
                "Transcoding sample"
            );
            transcode_samples(
                &samples,
                spec.channels,
                spec.sample_rate,
                target_sample_rate,
            )
        } else {
            samples
        };

        Ok(LoadedSample::new(samples, spec.channels, target_sample_rate))
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of frames.
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    /// Returns the playing time of the sample.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Returns the left and right values of a frame. Mono samples feed both sides.
    fn frame(&self, index: usize) -> Option<(f32, f32)> {
        let channels = self.channel_count as usize;
        let base = index * channels;
        let left = *self.data.get(base)?;
        let right = if channels > 1 {
            self.data[base + 1]
        } else {
            left
        };
        Some((left, right))
    }

    /// Reads a stereo frame at a fractional position using linear interpolation.
    /// Returns None once the position is past the end of the sample.
    pub fn frame_at(&self, position: f64) -> Option<(f32, f32)> {
        let index = position.floor() as usize;
        let frac = position.fract() as f32;
        let (l0, r0) = self.frame(index)?;
        if frac == 0.0 {
            return Some((l0, r0));
        }
        let (l1, r1) = self.frame(index + 1).unwrap_or((l0, r0));
        Some((l0 + (l1 - l0) * frac, r0 + (r1 - r0) * frac))
    }

    /// Mixes the sample down to mono, keeping at most `max_frames` frames.
    pub fn to_mono(&self, max_frames: usize) -> Vec<f32> {
        let channels = self.channel_count as usize;
        self.data
            .chunks_exact(channels)
            .take(max_frames)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }
}

impl std::fmt::Debug for LoadedSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedSample")
            .field("channels", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}

/// Decoded kit voices and reverb impulses, looked up by name.
#[derive(Default)]
pub struct SampleBank {
    /// Voices that decoded successfully.
    samples: HashMap<String, LoadedSample>,
    /// Impulse responses for the reverb, by effect name.
    impulses: HashMap<String, LoadedSample>,
}

impl SampleBank {
    /// Creates an empty bank.
    pub fn new() -> SampleBank {
        SampleBank::default()
    }

    /// Decodes `<name>.wav` from the kit directory for every name, in parallel.
    /// Voices that fail to load are logged and left out of the bank.
    pub fn load_kit(kit_path: &Path, names: &[&str], sample_rate: u32) -> SampleBank {
        info!(path = ?kit_path, voices = names.len(), "Loading kit");

        let results: Vec<(&str, Result<LoadedSample, SampleError>)> = names
            .par_iter()
            .map(|name| {
                let path = kit_path.join(format!("{}.wav", name));
                (*name, LoadedSample::from_file(&path, sample_rate))
            })
            .collect();

        let mut bank = SampleBank::new();
        for (name, result) in results {
            match result {
                Ok(sample) => {
                    debug!(
                        name,
                        duration_ms = sample.duration().as_millis() as u64,
                        memory_kb = sample.memory_size() / 1024,
                        "Voice loaded"
                    );
                    bank.insert(name, sample);
                }
                Err(e) => warn!(name, error = %e, "Voice failed to load, it will be silent"),
            }
        }

        info!(
            loaded = bank.len(),
            memory_kb = bank.memory_usage() / 1024,
            "Kit loaded"
        );
        bank
    }

    /// Decodes every WAV file in the directory as a reverb impulse named by its file stem.
    /// Impulses that fail to load are logged and skipped.
    pub fn load_impulses(&mut self, path: &Path, sample_rate: u32) -> std::io::Result<()> {
        let mut files = Vec::new();
        for entry in fs::read_dir(path)? {
            let file = entry?.path();
            if file.extension().is_some_and(|ext| ext == "wav") {
                if let Some(stem) = file.file_stem().and_then(|stem| stem.to_str()) {
                    files.push((stem.to_string(), file.clone()));
                }
            }
        }

        let results: Vec<(String, Result<LoadedSample, SampleError>)> = files
            .into_par_iter()
            .map(|(name, path)| (name, LoadedSample::from_file(&path, sample_rate)))
            .collect();

        for (name, result) in results {
            match result {
                Ok(sample) => {
                    debug!(name, "Impulse loaded");
                    self.impulses.insert(name, sample);
                }
                Err(e) => warn!(name, error = %e, "Impulse failed to load"),
            }
        }
        Ok(())
    }

    /// Gets a voice by name.
    pub fn get(&self, name: &str) -> Option<&LoadedSample> {
        self.samples.get(name)
    }

    /// Gets an impulse response by effect name.
    pub fn impulse(&self, name: &str) -> Option<&LoadedSample> {
        self.impulses.get(name)
    }

    /// Adds or replaces a voice.
    pub fn insert(&mut self, name: &str, sample: LoadedSample) {
        self.samples.insert(name.to_string(), sample);
    }

    /// Adds or replaces an impulse response.
    pub fn insert_impulse(&mut self, name: &str, sample: LoadedSample) {
        self.impulses.insert(name.to_string(), sample);
    }

    /// The number of loaded voices.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if no voices are loaded.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the total memory used by voices and impulses.
    pub fn memory_usage(&self) -> usize {
        self.samples
            .values()
            .chain(self.impulses.values())
            .map(|sample| sample.memory_size())
            .sum()
    }
}

impl std::fmt::Debug for SampleBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBank")
            .field("voices", &self.samples.len())
            .field("impulses", &self.impulses.len())
            .field("memory_kb", &(self.memory_usage() / 1024))
            .finish()
    }
}

/// Transcodes samples from one sample rate to another using linear interpolation.
/// Linear interpolation is sufficient for drum hits and one-shots.
fn transcode_samples(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let channels = channel_count.max(1) as usize;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);

    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let idx0 = source_frame * channels + channel;
            let idx1 = (source_frame + 1) * channels + channel;

            let s0 = samples.get(idx0).copied().unwrap_or(0.0);
            let s1 = samples.get(idx1).copied().unwrap_or(s0);

            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}
