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
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{AudioMixer, FrameClock, MixerSender};
use crate::playsync::CancelHandle;

/// Frames rendered per pacing step.
const BLOCK_FRAMES: u64 = 256;

/// A mock device. Renders into memory instead of a sound card, either on demand or paced
/// against the wall clock.
pub struct Device {
    name: String,
    mixer: Arc<Mutex<AudioMixer>>,
    clock: FrameClock,
    sender: MixerSender,
    pacing: Mutex<Option<(CancelHandle, JoinHandle<()>)>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, channels: u16, sample_rate: u32, master_gain: f32) -> Device {
        let (mixer, sender) = AudioMixer::new(channels, sample_rate, master_gain);
        let clock = mixer.clock();
        Device {
            name: name.to_string(),
            mixer: Arc::new(Mutex::new(mixer)),
            clock,
            sender,
            pacing: Mutex::new(None),
        }
    }

    /// Renders the given number of frames and returns them interleaved.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        self.mixer.lock().process_frames(frames)
    }

    /// The number of voices playing or waiting to start.
    pub fn active_voices(&self) -> usize {
        self.mixer.lock().active_voices()
    }

    /// Starts rendering and discarding audio in real time, so the clock advances the way a
    /// sound card would drive it.
    pub fn start_pacing(&self) {
        let mut pacing = self.pacing.lock();
        if pacing.is_some() {
            return;
        }

        let cancel = CancelHandle::new();
        let mixer = self.mixer.clone();
        let sample_rate = self.clock.sample_rate() as f64;
        let block = Duration::from_secs_f64(BLOCK_FRAMES as f64 / sample_rate);
        let join = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                let start = Instant::now();
                let mut rendered: u64 = 0;
                while !cancel.is_cancelled() {
                    let due = (start.elapsed().as_secs_f64() * sample_rate) as u64;
                    if due > rendered {
                        mixer.lock().process_frames((due - rendered) as usize);
                        rendered = due;
                    }
                    spin_sleep::sleep(block);
                }
                debug!(rendered, "Mock pacing stopped");
            })
        };
        info!(device = self.name.as_str(), "Mock device pacing started");
        *pacing = Some((cancel, join));
    }

    fn stop_pacing(&self) {
        if let Some((cancel, join)) = self.pacing.lock().take() {
            cancel.cancel();
            let _ = join.join();
        }
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
        write!(f, "{} (Mock)", self.name)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.stop_pacing();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::{AudioClock, Device as _, MixerCommand, ScheduledVoice};
    use crate::samples::LoadedSample;
    use crate::testutil::eventually;

    #[test]
    fn test_render_on_demand() {
        let device = Device::get("mock-device", 2, 1000, 1.0);
        assert_eq!(device.to_string(), "mock-device (Mock)");

        device
            .sender()
            .send(MixerCommand::Schedule(ScheduledVoice {
                sample: LoadedSample::new(vec![0.5], 1, 1000),
                start_frame: 1,
                playback_rate: 1.0,
                dry_gain: 1.0,
                wet_gain: 0.0,
                panner: None,
            }))
            .unwrap();

        assert_eq!(device.render(2), vec![0.0, 0.0, 0.5, 0.5]);
        assert_eq!(device.clock().frame(), 2);
        assert_eq!(device.active_voices(), 1);
        device.render(1);
        assert_eq!(device.active_voices(), 0);
    }

    #[test]
    fn test_pacing_advances_the_clock() {
        let device = Device::get("mock-device", 2, 44100, 0.7);
        let clock = device.clock();
        device.start_pacing();
        device.start_pacing();

        eventually(|| clock.now() > 0.01, "Mock pacing never advanced the clock");

        drop(device);
        let stopped_at = clock.frame();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(clock.frame(), stopped_at);
    }
}
