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

//! Shared convolution reverb fed by the voices' wet sends.

/// Overall gain applied after normalizing an impulse response.
const GAIN_CALIBRATION: f32 = 0.00125;

/// Lower bound on impulse power to avoid blowing up near-silent impulses.
const MIN_POWER: f32 = 0.000125;

/// A mono direct-form convolver. Without an impulse response it outputs silence.
#[derive(Default)]
pub struct Convolver {
    /// Normalized impulse response.
    impulse: Vec<f32>,
    /// Input history, used as a ring buffer the length of the impulse.
    history: Vec<f32>,
    /// Write position in the history.
    position: usize,
}

impl Convolver {
    /// Replaces the impulse response. An empty impulse disables the reverb.
    pub fn set_impulse(&mut self, impulse: Vec<f32>) {
        let scale = normalization_scale(&impulse);
        self.impulse = impulse.into_iter().map(|tap| tap * scale).collect();
        self.history = vec![0.0; self.impulse.len()];
        self.position = 0;
    }

    /// Returns true if an impulse response is loaded.
    pub fn is_active(&self) -> bool {
        !self.impulse.is_empty()
    }

    /// Convolves the buffer in place.
    pub fn process(&mut self, buffer: &mut [f32]) {
        if self.impulse.is_empty() {
            buffer.fill(0.0);
            return;
        }

        let len = self.history.len();
        for sample in buffer.iter_mut() {
            self.history[self.position] = *sample;

            let mut acc = 0.0f32;
            let mut index = self.position;
            for tap in &self.impulse {
                acc += tap * self.history[index];
                index = if index == 0 { len - 1 } else { index - 1 };
            }
            *sample = acc;

            self.position = (self.position + 1) % len;
        }
    }
}

/// Scales an impulse so that reverbs of different lengths sit at similar levels.
fn normalization_scale(impulse: &[f32]) -> f32 {
    if impulse.is_empty() {
        return 1.0;
    }

    let power = impulse.iter().map(|tap| tap * tap).sum::<f32>() / impulse.len() as f32;
    let power = power.sqrt().max(MIN_POWER);
    GAIN_CALIBRATION / power
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_without_impulse() {
        let mut convolver = Convolver::default();
        let mut buffer = vec![1.0, 0.5, -0.5];
        convolver.process(&mut buffer);
        assert!(!convolver.is_active());
        assert_eq!(buffer, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_impulse_delays_signal() {
        let mut convolver = Convolver::default();
        convolver.set_impulse(vec![0.0, 0.0, 1.0]);
        let scale = normalization_scale(&[0.0, 0.0, 1.0]);

        // Split across calls to exercise the history carried between blocks.
        let mut first = vec![1.0, 0.0];
        let mut second = vec![0.0, 0.0];
        convolver.process(&mut first);
        convolver.process(&mut second);

        assert_eq!(first, vec![0.0, 0.0]);
        assert!((second[0] - scale).abs() < 1e-6);
        assert_eq!(second[1], 0.0);
    }

    #[test]
    fn test_clearing_impulse() {
        let mut convolver = Convolver::default();
        convolver.set_impulse(vec![1.0]);
        assert!(convolver.is_active());
        convolver.set_impulse(Vec::new());
        assert!(!convolver.is_active());
    }
}
