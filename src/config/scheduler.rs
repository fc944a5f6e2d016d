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
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::scheduler::{Timing, LOOKAHEAD, START_DELAY};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A YAML representation of the scheduler timing.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Scheduler {
    /// How far ahead of the audio clock steps are scheduled (default: 200ms).
    lookahead: Option<String>,

    /// Delay between play and the first step (default: 5ms).
    start_delay: Option<String>,

    /// How often the control thread wakes to schedule (default: 1ms).
    poll_interval: Option<String>,
}

fn parse_duration(
    field: &'static str,
    value: &Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => match DurationString::from_string(value.clone()) {
            Ok(duration) => Ok(duration.into()),
            Err(e) => Err(ConfigError::Duration {
                field,
                value: value.clone(),
                reason: e.to_string(),
            }),
        },
        None => Ok(default),
    }
}

impl Scheduler {
    pub fn lookahead(&self) -> Result<Duration, ConfigError> {
        parse_duration(
            "lookahead",
            &self.lookahead,
            Duration::from_secs_f64(LOOKAHEAD),
        )
    }

    pub fn start_delay(&self) -> Result<Duration, ConfigError> {
        parse_duration(
            "start_delay",
            &self.start_delay,
            Duration::from_secs_f64(START_DELAY),
        )
    }

    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration("poll_interval", &self.poll_interval, DEFAULT_POLL_INTERVAL)
    }

    /// The timing constants for the scheduling loop.
    pub fn timing(&self) -> Result<Timing, ConfigError> {
        Ok(Timing::new(self.lookahead()?, self.start_delay()?))
    }
}
