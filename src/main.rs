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
use std::error::Error;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use drumsampler::audio::{self, mock, AudioClock, Device};
use drumsampler::config;
use drumsampler::pattern::{Hit, Instrument, Pattern, STEPS};
use drumsampler::sampler::{Sampler, Transport};
use drumsampler::samples::{MixerVoiceTrigger, SampleBank};
use drumsampler::scheduler::StepEvent;

/// Frames rendered per block when bouncing offline.
const RENDER_BLOCK_FRAMES: usize = 512;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A 16-step drum sampler."
)]
struct Cli {
    /// The path to the sampler config.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Writes an all-silent beat.
    New {
        /// Where to write the beat. Prints to stdout if omitted.
        path: Option<PathBuf>,
    },
    /// Writes the built-in demo beat.
    Demo {
        /// Where to write the beat. Prints to stdout if omitted.
        path: Option<PathBuf>,
    },
    /// Validates a beat and prints its grid.
    Verify {
        /// The path to the beat.
        path: PathBuf,
    },
    /// Sets one cell of a beat's grid.
    Set {
        /// The path to the beat.
        path: PathBuf,
        /// The instrument: a name such as "kick" or a row number from 0 to 5.
        instrument: Instrument,
        /// The step, from 0 to 15.
        step: usize,
        /// The hit: off, soft, hard or 0, 1, 2.
        hit: Hit,
    },
    /// Changes a beat's tempo, swing or effect settings.
    Edit {
        /// The path to the beat.
        path: PathBuf,
        /// Tempo in BPM.
        #[arg(short, long)]
        tempo: Option<u32>,
        /// Swing factor from 0.0 to 1.0.
        #[arg(short, long)]
        swing: Option<f64>,
        /// Reverb impulse name. An empty string disables the reverb.
        #[arg(short, long)]
        effect: Option<String>,
        /// Reverb blend from 0.0 to 1.0.
        #[arg(short, long)]
        mix: Option<f64>,
    },
    /// Plays a beat through the audio device. Press enter to play or pause, q to quit.
    Play {
        /// The path to the beat. Plays the demo beat if omitted.
        path: Option<PathBuf>,
        /// The device name to play through, overriding the config.
        #[arg(short, long)]
        device: Option<String>,
        /// Play for this long and exit instead of reading commands, e.g. "30s".
        #[arg(long)]
        duration: Option<String>,
    },
    /// Bounces a beat to a WAV file without an audio device.
    Render {
        /// The path to the beat.
        path: PathBuf,
        /// The WAV file to write.
        output: PathBuf,
        /// How many times to play the loop.
        #[arg(short, long, default_value_t = 1)]
        loops: u32,
        /// How long to let the voices ring out after the last loop, e.g. "2s".
        #[arg(long, default_value = "2s")]
        tail: String,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => config::Sampler::load(path)?,
        None => config::Sampler::default(),
    };

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::New { path } => write_pattern(path.as_deref(), &Pattern::empty())?,
        Commands::Demo { path } => write_pattern(path.as_deref(), &Pattern::demo())?,
        Commands::Verify { path } => {
            let pattern = read_pattern(&path)?;
            println!("{}", path.display());
            print!("{}", pattern);
        }
        Commands::Set {
            path,
            instrument,
            step,
            hit,
        } => {
            if step >= STEPS {
                return Err(format!("step {} is outside of 0..{}", step, STEPS).into());
            }
            let mut pattern = read_pattern(&path)?;
            pattern.set_cell(instrument, step, hit);
            write_pattern(Some(&path), &pattern)?;
            print!("{}", pattern);
        }
        Commands::Edit {
            path,
            tempo,
            swing,
            effect,
            mix,
        } => {
            let mut pattern = read_pattern(&path)?;
            if let Some(tempo) = tempo {
                pattern.set_tempo(tempo)?;
            }
            if let Some(swing) = swing {
                pattern.set_swing_factor(swing)?;
            }
            if let Some(effect) = effect {
                pattern.set_effect(Some(effect).filter(|effect| !effect.is_empty()));
            }
            if let Some(mix) = mix {
                pattern.set_effect_mix(mix)?;
            }
            write_pattern(Some(&path), &pattern)?;
            print!("{}", pattern);
        }
        Commands::Play {
            path,
            device,
            duration,
        } => {
            let mut config = config;
            if let Some(device) = device {
                let mut audio = config.audio().clone();
                audio.set_device(&device);
                config.set_audio(audio);
            }
            let pattern = match path {
                Some(path) => read_pattern(&path)?,
                None => Pattern::demo(),
            };
            let duration = duration
                .map(|duration| DurationString::from_string(duration).map(Duration::from))
                .transpose()?;
            play(&config, pattern, duration)?;
        }
        Commands::Render {
            path,
            output,
            loops,
            tail,
        } => {
            let pattern = read_pattern(&path)?;
            let tail: Duration = DurationString::from_string(tail)?.into();
            render(&config, pattern, &output, loops, tail)?;
        }
    }

    Ok(())
}

fn read_pattern(path: &Path) -> Result<Pattern, Box<dyn Error>> {
    match Pattern::from_json(&fs::read_to_string(path)?) {
        Ok(pattern) => Ok(pattern),
        Err(e) => Err(format!("error parsing beat {}: {}", path.display(), e).into()),
    }
}

fn write_pattern(path: Option<&Path>, pattern: &Pattern) -> Result<(), Box<dyn Error>> {
    let json = pattern.to_json()?;
    match path {
        Some(path) => {
            fs::write(path, json)?;
            info!(path = %path.display(), "Wrote beat");
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Decodes the kit and impulse responses at the given sample rate. A kit directory may hold
/// one subdirectory per kit, selected by the beat's kit name.
fn load_bank(config: &config::Sampler, pattern: &Pattern, sample_rate: u32) -> SampleBank {
    let names = Instrument::ALL.map(Instrument::sample_name);
    let mut bank = match config.kit().path() {
        Some(path) => {
            let dir = pattern
                .kit()
                .map(|kit| path.join(kit))
                .filter(|dir| dir.is_dir())
                .unwrap_or_else(|| path.to_path_buf());
            SampleBank::load_kit(&dir, &names, sample_rate)
        }
        None => {
            warn!("No kit configured, all voices will be silent");
            SampleBank::new()
        }
    };

    if let Some(path) = config.kit().impulse_path() {
        if let Err(e) = bank.load_impulses(path, sample_rate) {
            warn!(path = %path.display(), err = %e, "Unable to load impulse responses");
        }
    }
    bank
}

fn play(
    config: &config::Sampler,
    pattern: Pattern,
    duration: Option<Duration>,
) -> Result<(), Box<dyn Error>> {
    let device = audio::get_device(config.audio())?;
    info!(device = %device, "Opened audio device");

    let bank = Arc::new(load_bank(config, &pattern, config.audio().sample_rate()));
    let trigger = MixerVoiceTrigger::new(
        bank,
        device.sender(),
        device.clock(),
        config.kit().max_impulse_frames(),
    );

    let mut sampler = Sampler::new(device.clock(), trigger, config.scheduler().timing()?);
    sampler.set_listener(|event| match event {
        StepEvent::Step { step, time } => debug!(step, time, "Step"),
        StepEvent::Stopped => debug!("No step highlighted"),
    });
    sampler.load(pattern);
    print!("{}", sampler.pattern());

    let mut transport = Transport::new(sampler, config.scheduler().poll_interval()?);
    transport.play();

    if let Some(duration) = duration {
        thread::sleep(duration);
        transport.stop();
        return Ok(());
    }

    println!("Press enter to play or pause, q to quit.");
    for line in io::stdin().lock().lines() {
        match line?.trim() {
            "q" | "quit" => break,
            _ => {
                let playing = transport.toggle();
                println!("{}", if playing { "Playing" } else { "Paused" });
            }
        }
    }
    transport.stop();
    Ok(())
}

fn render(
    config: &config::Sampler,
    pattern: Pattern,
    output: &Path,
    loops: u32,
    tail: Duration,
) -> Result<(), Box<dyn Error>> {
    let audio = config.audio();
    let device = mock::Device::get(
        "render",
        audio.channels(),
        audio.sample_rate(),
        audio.master_gain(),
    );
    let clock = device.clock();
    let bank = Arc::new(load_bank(config, &pattern, audio.sample_rate()));
    let trigger = MixerVoiceTrigger::new(
        bank,
        device.sender(),
        clock.clone(),
        config.kit().max_impulse_frames(),
    );

    let timing = config.scheduler().timing()?;
    let loop_length = 4.0 * pattern.seconds_per_beat();
    let mut sampler = Sampler::new(clock.clone(), trigger, timing);
    sampler.load(pattern);
    sampler.play();

    // Stop scheduling once the lookahead window would reach into the next loop.
    let end = timing.start_delay + loop_length * loops as f64;
    let total_frames = clock.frame_at(end + tail.as_secs_f64());

    let mut writer = WavWriter::create(
        output,
        WavSpec {
            channels: audio.channels(),
            sample_rate: audio.sample_rate(),
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    while clock.frame() < total_frames {
        if sampler.is_playing() {
            if clock.now() + timing.lookahead < end {
                sampler.tick();
            } else {
                sampler.stop();
            }
        }
        let frames = (total_frames - clock.frame()).min(RENDER_BLOCK_FRAMES as u64);
        for sample in device.render(frames as usize) {
            writer.write_sample(sample)?;
        }
    }
    writer.finalize()?;

    info!(
        path = %output.display(),
        loops,
        seconds = total_frames as f64 / audio.sample_rate() as f64,
        "Rendered beat"
    );
    Ok(())
}
