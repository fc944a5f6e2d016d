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
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Longest impulse response handed to the reverb by default, in frames.
pub const DEFAULT_MAX_IMPULSE_FRAMES: usize = 8192;

/// A YAML representation of the drum kit.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Kit {
    /// Directory holding one WAV file per instrument.
    path: Option<PathBuf>,

    /// Directory of impulse responses, named by effect.
    impulse_path: Option<PathBuf>,

    /// Longest impulse response handed to the reverb, in frames.
    max_impulse_frames: Option<usize>,
}

impl Kit {
    /// The kit directory, if one is configured.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The impulse response directory, if one is configured.
    pub fn impulse_path(&self) -> Option<&Path> {
        self.impulse_path.as_deref()
    }

    pub fn max_impulse_frames(&self) -> usize {
        self.max_impulse_frames
            .unwrap_or(DEFAULT_MAX_IMPULSE_FRAMES)
            .max(1)
    }

    /// Resolves relative directories against the directory of the config file.
    pub(super) fn resolve(&mut self, base: &Path) {
        for dir in [&mut self.path, &mut self.impulse_path].into_iter().flatten() {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }
}
