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
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

use super::{AudioError, AudioMixer, FrameClock, MixerSender};
use crate::config;

/// An output device driven by cpal. The stream lives on its own thread, which also owns
/// the mixer rendering into it.
pub struct Device {
    name: String,
    clock: FrameClock,
    sender: MixerSender,
    /// Dropping this sender shuts the output thread down.
    shutdown: Option<crossbeam_channel::Sender<()>>,
    output_thread: Option<JoinHandle<()>>,
}

/// Builds a stream that renders the mixer straight into cpal's buffer.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: AudioMixer,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            mixer.process_into(&mut scratch);
            for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(src);
            }
        },
        |err| error!(err = %err, "CPAL output stream error"),
        None,
    )
}

fn open_stream(
    device: &cpal::Device,
    mixer: AudioMixer,
) -> Result<cpal::Stream, AudioError> {
    let format = device.default_output_config()?.sample_format();
    let config = cpal::StreamConfig {
        channels: mixer.channels(),
        sample_rate: cpal::SampleRate(mixer.sample_rate()),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = match format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, &config, mixer)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(device, &config, mixer)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(device, &config, mixer)?,
        cpal::SampleFormat::I32 => build_stream::<i32>(device, &config, mixer)?,
        format => return Err(AudioError::UnsupportedFormat(format.to_string())),
    };
    stream.play()?;
    Ok(stream)
}

impl Device {
    /// Lists the names of the default host's output devices.
    pub fn list() -> Result<Vec<String>, AudioError> {
        let host = cpal::default_host();
        let mut names = Vec::new();
        for device in host.output_devices()? {
            match device.name() {
                Ok(name) => names.push(name),
                Err(e) => error!(err = %e, "Unable to read device name"),
            }
        }
        names.sort();
        Ok(names)
    }

    fn find(name: &str) -> Result<cpal::Device, AudioError> {
        let host = cpal::default_host();
        if name == "default" {
            return host
                .default_output_device()
                .ok_or_else(|| AudioError::NoDevice(name.to_string()));
        }

        for device in host.output_devices()? {
            if device.name()?.trim() == name {
                return Ok(device);
            }
        }
        Err(AudioError::NoDevice(name.to_string()))
    }

    /// Opens the configured device and starts its output stream.
    pub fn get(config: &config::Audio) -> Result<Device, AudioError> {
        let span = span!(Level::INFO, "cpal device");
        let _enter = span.enter();

        let device = Device::find(config.device())?;
        let name = device.name()?;
        let (mixer, sender) =
            AudioMixer::new(config.channels(), config.sample_rate(), config.master_gain());
        let clock = mixer.clock();

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), AudioError>>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let output_thread = thread::spawn(move || {
            let stream = match open_stream(&device, mixer) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            // Keep the stream alive until the device is dropped.
            let _ = shutdown_rx.recv();
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = output_thread.join();
                return Err(e);
            }
            Err(_) => return Err(AudioError::OutputThread),
        }

        info!(
            device = name.as_str(),
            sample_rate = config.sample_rate(),
            channels = config.channels(),
            "Output stream started"
        );
        Ok(Device {
            name,
            clock,
            sender,
            shutdown: Some(shutdown_tx),
            output_thread: Some(output_thread),
        })
    }
}

impl super::Device for Device {
    fn clock(&self) -> FrameClock {
        self.clock.clone()
    }

    fn sender(&self) -> MixerSender {
        self.sender.clone()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (CPAL, {}Hz)",
            self.name,
            self.clock.sample_rate()
        )
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.shutdown.take();
        if let Some(thread) = self.output_thread.take() {
            if thread.join().is_err() {
                error!(device = self.name.as_str(), "Output thread panicked");
            }
        }
    }
}
