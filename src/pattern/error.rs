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

/// Error types for loading and editing beat documents.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("Malformed beat document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Tempo {0} BPM is outside of {min}..={max}", min = super::MIN_TEMPO, max = super::MAX_TEMPO)]
    TempoOutOfRange(u32),

    #[error("Swing factor {0} is outside of 0.0..=1.0")]
    SwingOutOfRange(f64),

    #[error("Effect mix {0} is outside of 0.0..=1.0")]
    EffectMixOutOfRange(f64),

    #[error("Invalid hit level {0}, expected 0, 1 or 2")]
    InvalidHit(u8),

    #[error("Unknown instrument '{0}'")]
    UnknownInstrument(String),
}
