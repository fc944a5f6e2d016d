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

//! Drum kit samples and voice triggering.
//!
//! This module provides:
//! - Kit loading into memory, tolerating voices that fail to decode
//! - The per-instrument mix table
//! - Scheduling one-shot voices on the mixer at exact audio-clock times

mod bank;
mod error;
mod voice;

pub use bank::{LoadedSample, SampleBank};
pub use error::SampleError;
pub use voice::{MixerVoiceTrigger, VoiceMix, VoiceTrigger};
