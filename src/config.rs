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
use std::path::Path;

use serde::Deserialize;
use tracing::info;

mod audio;
mod error;
mod kit;
mod scheduler;

pub use audio::Audio;
pub use error::ConfigError;
pub use kit::Kit;
pub use scheduler::Scheduler;

/// The configuration for the drum sampler. Every section is optional.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Sampler {
    /// The audio output.
    #[serde(default)]
    audio: Audio,

    /// The drum kit and impulse responses.
    #[serde(default)]
    kit: Kit,

    /// Timing of the scheduling loop.
    #[serde(default)]
    scheduler: Scheduler,
}

impl Sampler {
    /// Loads the configuration from a YAML file. Relative kit paths are resolved against
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Sampler, ConfigError> {
        let mut sampler: Sampler = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()?
            .try_deserialize()?;

        if let Some(base) = path.parent() {
            sampler.kit.resolve(base);
        }
        info!(path = %path.display(), device = sampler.audio.device(), "Loaded config");
        Ok(sampler)
    }

    /// Loads the configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Sampler, ConfigError> {
        Ok(::config::Config::builder()
            .add_source(::config::File::from_str(yaml, ::config::FileFormat::Yaml))
            .build()?
            .try_deserialize()?)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Replaces the audio section, for overriding the device from the command line.
    pub fn set_audio(&mut self, audio: Audio) {
        self.audio = audio;
    }

    pub fn kit(&self) -> &Kit {
        &self.kit
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Sampler::from_yaml("{}").unwrap();
        assert_eq!(config.audio().device(), "default");
        assert_eq!(config.audio().sample_rate(), 44100);
        assert_eq!(config.audio().channels(), 2);
        assert_eq!(config.audio().master_gain(), 0.7);
        assert_eq!(config.kit().path(), None);
        assert_eq!(config.kit().max_impulse_frames(), 8192);
        assert_eq!(
            config.scheduler().lookahead().unwrap(),
            Duration::from_millis(200)
        );
        assert_eq!(
            config.scheduler().start_delay().unwrap(),
            Duration::from_millis(5)
        );
        assert_eq!(
            config.scheduler().poll_interval().unwrap(),
            Duration::from_millis(1)
        );
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
            audio:
              device: mock-device
              sample_rate: 48000
              channels: 1
              master_gain: 0.5
            kit:
              path: /kits/808
              impulse_path: /impulses
              max_impulse_frames: 4096
            scheduler:
              lookahead: 100ms
              start_delay: 10ms
              poll_interval: 2ms
        "#;

        let config = Sampler::from_yaml(yaml).unwrap();
        assert_eq!(config.audio().device(), "mock-device");
        assert_eq!(config.audio().sample_rate(), 48000);
        assert_eq!(config.audio().channels(), 1);
        assert_eq!(config.audio().master_gain(), 0.5);
        assert_eq!(config.kit().path(), Some(Path::new("/kits/808")));
        assert_eq!(config.kit().impulse_path(), Some(Path::new("/impulses")));
        assert_eq!(config.kit().max_impulse_frames(), 4096);

        let timing = config.scheduler().timing().unwrap();
        assert_eq!(timing.lookahead, 0.1);
        assert_eq!(timing.start_delay, 0.01);
        assert_eq!(
            config.scheduler().poll_interval().unwrap(),
            Duration::from_millis(2)
        );
    }

    #[test]
    fn test_bad_duration() {
        let config = Sampler::from_yaml("scheduler:\n  lookahead: soon\n").unwrap();
        assert!(matches!(
            config.scheduler().lookahead(),
            Err(ConfigError::Duration {
                field: "lookahead",
                ..
            })
        ));
    }

    #[test]
    fn test_load_resolves_kit_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drumsampler.yaml");
        fs::write(&path, "kit:\n  path: kits/acoustic\n  impulse_path: /abs/impulses\n").unwrap();

        let config = Sampler::load(&path).unwrap();
        assert_eq!(
            config.kit().path(),
            Some(dir.path().join("kits/acoustic").as_path())
        );
        assert_eq!(config.kit().impulse_path(), Some(Path::new("/abs/impulses")));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Sampler::load(Path::new("/does/not/exist.yaml")),
            Err(ConfigError::Load(_))
        ));
    }
}
