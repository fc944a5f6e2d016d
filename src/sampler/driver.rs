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
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error};

use super::Sampler;
use crate::audio::AudioClock;
use crate::playsync::CancelHandle;
use crate::samples::VoiceTrigger;

struct LoopHandles {
    join: JoinHandle<()>,
    cancel: CancelHandle,
}

/// Drives a sampler's scheduling loop from a dedicated control thread.
///
/// The loop is re-armed every poll interval while the transport plays. Stopping cancels
/// and joins the loop before the transport stops, so nothing is scheduled afterwards.
pub struct Transport<C: AudioClock + 'static, T: VoiceTrigger + 'static> {
    sampler: Arc<Mutex<Sampler<C, T>>>,
    poll_interval: Duration,
    /// There should only be one loop running at a time.
    handles: Option<LoopHandles>,
}

impl<C: AudioClock + 'static, T: VoiceTrigger + 'static> Transport<C, T> {
    pub fn new(sampler: Sampler<C, T>, poll_interval: Duration) -> Transport<C, T> {
        Transport {
            sampler: Arc::new(Mutex::new(sampler)),
            poll_interval,
            handles: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.sampler.lock().is_playing()
    }

    /// Starts playback and the scheduling loop. Returns false if already playing.
    pub fn play(&mut self) -> bool {
        let started = self.sampler.lock().play();
        self.sync_loop();
        started
    }

    /// Stops the scheduling loop and then the transport. Returns false if already stopped.
    pub fn stop(&mut self) -> bool {
        self.stop_loop();
        self.sampler.lock().stop()
    }

    /// Plays if stopped and stops if playing. Returns true if now playing.
    pub fn toggle(&mut self) -> bool {
        if self.is_playing() {
            self.stop();
            false
        } else {
            self.play();
            true
        }
    }

    /// Runs an operation against the sampler, then starts or stops the loop to match
    /// the transport state it left behind.
    pub fn with_sampler<R>(&mut self, f: impl FnOnce(&mut Sampler<C, T>) -> R) -> R {
        let result = {
            let mut sampler = self.sampler.lock();
            f(&mut sampler)
        };
        self.sync_loop();
        result
    }

    fn sync_loop(&mut self) {
        let playing = self.is_playing();
        let running = self
            .handles
            .as_ref()
            .is_some_and(|handles| !handles.join.is_finished());

        if playing && !running {
            self.stop_loop();
            self.start_loop();
        } else if !playing && self.handles.is_some() {
            self.stop_loop();
        }
    }

    fn start_loop(&mut self) {
        let cancel = CancelHandle::new();
        let sampler = self.sampler.clone();
        let poll_interval = self.poll_interval;
        let join = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                debug!("Scheduling loop started");
                loop {
                    {
                        let mut sampler = sampler.lock();
                        if !sampler.is_playing() {
                            break;
                        }
                        sampler.tick();
                    }
                    if cancel.wait_timeout(poll_interval) {
                        break;
                    }
                }
                debug!("Scheduling loop finished");
            })
        };
        self.handles = Some(LoopHandles { join, cancel });
    }

    fn stop_loop(&mut self) {
        if let Some(handles) = self.handles.take() {
            handles.cancel.cancel();
            if handles.join.join().is_err() {
                error!("Scheduling loop panicked");
            }
        }
    }
}

impl<C: AudioClock + 'static, T: VoiceTrigger + 'static> Drop for Transport<C, T> {
    fn drop(&mut self) {
        self.stop();
    }
}
