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

//! A 16-step, six-voice drum sampler.
//!
//! A [`pattern::Pattern`] holds the beat. The [`scheduler::Scheduler`] walks it with a
//! lookahead window against the audio clock, handing each step to a
//! [`samples::VoiceTrigger`] stamped with the exact time it must sound. The
//! [`sampler::Sampler`] ties these together, and [`sampler::Transport`] keeps its
//! scheduling loop running on a control thread.

pub mod audio;
pub mod config;
pub mod pattern;
pub mod playsync;
pub mod sampler;
pub mod samples;
pub mod scheduler;

#[cfg(test)]
mod testutil;
