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

//! Beat documents.
//!
//! A beat is a fixed grid of six instruments by sixteen steps, plus the tempo, swing and
//! effect settings used to play it back. The grid shape is enforced by the types, so a
//! document that deserializes successfully always has the right dimensions.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

mod error;

pub use error::PatternError;

/// Number of steps in one loop of the pattern.
pub const STEPS: usize = 16;

/// Number of instrument rows in a pattern.
pub const INSTRUMENTS: usize = 6;

/// Slowest supported tempo.
pub const MIN_TEMPO: u32 = 50;

/// Fastest supported tempo.
pub const MAX_TEMPO: u32 = 180;

/// Maximum swing offset as a fraction of a beat.
pub const MAX_SWING: f64 = 0.08;

/// Volume scalars for each hit level.
const VOLUMES: [f32; 3] = [0.0, 0.3, 1.0];

/// The instrument role assigned to each row of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrument {
    Tom1,
    Tom2,
    Tom3,
    HiHat,
    Snare,
    Kick,
}

impl Instrument {
    /// All instruments in row order.
    pub const ALL: [Instrument; INSTRUMENTS] = [
        Instrument::Tom1,
        Instrument::Tom2,
        Instrument::Tom3,
        Instrument::HiHat,
        Instrument::Snare,
        Instrument::Kick,
    ];

    /// The grid row of this instrument.
    pub fn row(self) -> usize {
        self as usize
    }

    /// Gets the instrument for a grid row.
    pub fn from_row(row: usize) -> Option<Instrument> {
        Self::ALL.get(row).copied()
    }

    /// The display label of the instrument.
    pub fn label(self) -> &'static str {
        match self {
            Instrument::Tom1 => "Tom 1",
            Instrument::Tom2 => "Tom 2",
            Instrument::Tom3 => "Tom 3",
            Instrument::HiHat => "Hi-Hat",
            Instrument::Snare => "Snare",
            Instrument::Kick => "Kick",
        }
    }

    /// The name of the kit sample that voices this instrument.
    pub fn sample_name(self) -> &'static str {
        match self {
            Instrument::Tom1 => "tom1",
            Instrument::Tom2 => "tom2",
            Instrument::Tom3 => "tom3",
            Instrument::HiHat => "hihat",
            Instrument::Snare => "snare",
            Instrument::Kick => "kick",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Instrument {
    type Err = PatternError;

    /// Parses an instrument from its sample name, its label or its row number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-', '_'], "");
        if let Ok(row) = normalized.parse::<usize>() {
            return Instrument::from_row(row)
                .ok_or_else(|| PatternError::UnknownInstrument(s.to_string()));
        }

        Instrument::ALL
            .into_iter()
            .find(|instrument| instrument.sample_name() == normalized)
            .ok_or_else(|| PatternError::UnknownInstrument(s.to_string()))
    }
}

/// How hard a step is played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Hit {
    #[default]
    Off,
    Soft,
    Hard,
}

impl Hit {
    /// Returns true if the step produces a sound.
    pub fn is_on(self) -> bool {
        self != Hit::Off
    }

    /// The volume scalar for this hit level.
    pub fn volume(self) -> f32 {
        VOLUMES[u8::from(self) as usize]
    }
}

impl TryFrom<u8> for Hit {
    type Error = PatternError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Hit::Off),
            1 => Ok(Hit::Soft),
            2 => Ok(Hit::Hard),
            other => Err(PatternError::InvalidHit(other)),
        }
    }
}

impl From<Hit> for u8 {
    fn from(hit: Hit) -> u8 {
        match hit {
            Hit::Off => 0,
            Hit::Soft => 1,
            Hit::Hard => 2,
        }
    }
}

impl FromStr for Hit {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(Hit::Off),
            "soft" => Ok(Hit::Soft),
            "hard" => Ok(Hit::Hard),
            other => match other.parse::<u8>() {
                Ok(value) => Hit::try_from(value),
                Err(_) => Err(PatternError::InvalidHit(u8::MAX)),
            },
        }
    }
}

/// One instrument row of the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Playback rate multiplier. Persisted, not applied during playback.
    pitch: f64,

    /// The hit for each step.
    pattern: [Hit; STEPS],
}

impl Track {
    fn silent() -> Track {
        Track {
            pitch: 0.5,
            pattern: [Hit::Off; STEPS],
        }
    }

    fn with_hits(hits: &[usize]) -> Track {
        let mut track = Track::silent();
        for &step in hits {
            track.pattern[step] = Hit::Hard;
        }
        track
    }

    /// Gets the pitch value of this track.
    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Gets the hits of this track.
    pub fn hits(&self) -> &[Hit; STEPS] {
        &self.pattern
    }
}

/// The serialized shape of a beat, validated on the way into a [`Pattern`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    kit: Option<String>,
    tempo: u32,
    effect: Option<String>,
    effect_mix: f64,
    swing_factor: f64,
    instruments: [Track; INSTRUMENTS],
}

/// A beat document: tempo, swing, effect settings and the hit grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "Document")]
pub struct Pattern {
    kit: Option<String>,
    tempo: u32,
    effect: Option<String>,
    effect_mix: f64,
    swing_factor: f64,
    instruments: [Track; INSTRUMENTS],
}

impl TryFrom<Document> for Pattern {
    type Error = PatternError;

    fn try_from(document: Document) -> Result<Self, Self::Error> {
        let mut pattern = Pattern {
            kit: document.kit,
            tempo: MIN_TEMPO,
            effect: document.effect,
            effect_mix: 0.0,
            swing_factor: 0.0,
            instruments: document.instruments,
        };
        pattern.set_tempo(document.tempo)?;
        pattern.set_swing_factor(document.swing_factor)?;
        pattern.set_effect_mix(document.effect_mix)?;
        Ok(pattern)
    }
}

impl Pattern {
    /// Creates an all-silent pattern at 120 BPM.
    pub fn empty() -> Pattern {
        Pattern {
            kit: None,
            tempo: 120,
            effect: None,
            effect_mix: 0.25,
            swing_factor: 0.0,
            instruments: std::array::from_fn(|_| Track::silent()),
        }
    }

    /// Creates the built-in demo beat.
    pub fn demo() -> Pattern {
        Pattern {
            instruments: [
                Track::with_hits(&[7, 9, 10]),
                Track::with_hits(&[2]),
                Track::with_hits(&[14]),
                Track::with_hits(&[6, 8]),
                Track::with_hits(&[4, 12]),
                Track::with_hits(&[0]),
            ],
            ..Pattern::empty()
        }
    }

    /// Parses and validates a serialized beat document.
    pub fn from_json(data: &str) -> Result<Pattern, PatternError> {
        Ok(serde_json::from_str(data)?)
    }

    /// Serializes the beat into its document form.
    pub fn to_json(&self) -> Result<String, PatternError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Gets the kit identifier.
    pub fn kit(&self) -> Option<&str> {
        self.kit.as_deref()
    }

    /// Gets the effect (impulse response) identifier.
    pub fn effect(&self) -> Option<&str> {
        self.effect.as_deref()
    }

    /// Gets the reverb blend.
    pub fn effect_mix(&self) -> f64 {
        self.effect_mix
    }

    /// Gets the tempo in beats per minute.
    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    /// Gets the swing factor.
    pub fn swing_factor(&self) -> f64 {
        self.swing_factor
    }

    /// The length of one beat in seconds.
    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.tempo as f64
    }

    /// Gets the hit for the given instrument and step.
    ///
    /// # Panics
    ///
    /// Panics if `step` is not less than [`STEPS`].
    pub fn hit(&self, instrument: Instrument, step: usize) -> Hit {
        self[instrument].pattern[step]
    }

    /// Sets a single cell of the grid.
    ///
    /// # Panics
    ///
    /// Panics if `step` is not less than [`STEPS`].
    pub fn set_cell(&mut self, instrument: Instrument, step: usize, hit: Hit) {
        self[instrument].pattern[step] = hit;
    }

    /// Sets the tempo, which must be within [`MIN_TEMPO`] and [`MAX_TEMPO`].
    pub fn set_tempo(&mut self, tempo: u32) -> Result<(), PatternError> {
        if !(MIN_TEMPO..=MAX_TEMPO).contains(&tempo) {
            return Err(PatternError::TempoOutOfRange(tempo));
        }
        self.tempo = tempo;
        Ok(())
    }

    /// Sets the swing factor, which must be within 0.0 and 1.0.
    pub fn set_swing_factor(&mut self, swing_factor: f64) -> Result<(), PatternError> {
        if !(0.0..=1.0).contains(&swing_factor) {
            return Err(PatternError::SwingOutOfRange(swing_factor));
        }
        self.swing_factor = swing_factor;
        Ok(())
    }

    /// Sets the reverb blend, which must be within 0.0 and 1.0.
    pub fn set_effect_mix(&mut self, effect_mix: f64) -> Result<(), PatternError> {
        if !(0.0..=1.0).contains(&effect_mix) {
            return Err(PatternError::EffectMixOutOfRange(effect_mix));
        }
        self.effect_mix = effect_mix;
        Ok(())
    }

    /// Sets the effect identifier.
    pub fn set_effect(&mut self, effect: Option<String>) {
        self.effect = effect;
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Pattern::empty()
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pattern::from_json(s)
    }
}

impl Index<Instrument> for Pattern {
    type Output = Track;

    fn index(&self, instrument: Instrument) -> &Track {
        &self.instruments[instrument.row()]
    }
}

impl IndexMut<Instrument> for Pattern {
    fn index_mut(&mut self, instrument: Instrument) -> &mut Track {
        &mut self.instruments[instrument.row()]
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Tempo: {} BPM, swing: {:.2}, effect: {} ({:.2})",
            self.tempo,
            self.swing_factor,
            self.effect.as_deref().unwrap_or("none"),
            self.effect_mix
        )?;
        for instrument in Instrument::ALL {
            write!(f, "{:<7}|", instrument.label())?;
            for (step, hit) in self[instrument].pattern.iter().enumerate() {
                let cell = match hit {
                    Hit::Off => '.',
                    Hit::Soft => 'o',
                    Hit::Hard => 'X',
                };
                write!(f, "{}", cell)?;
                if step % 4 == 3 {
                    write!(f, "|")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const DEMO_JSON: &str = r#"{
        "kit": null,
        "tempo": 120,
        "effect": null,
        "effectMix": 0.25,
        "swingFactor": 0,
        "instruments": [
            {"pitch": 0.5, "pattern": [0,0,0,0,0,0,0,2,0,2,2,0,0,0,0,0]},
            {"pitch": 0.5, "pattern": [0,0,2,0,0,0,0,0,0,0,0,0,0,0,0,0]},
            {"pitch": 0.5, "pattern": [0,0,0,0,0,0,0,0,0,0,0,0,0,0,2,0]},
            {"pitch": 0.5, "pattern": [0,0,0,0,0,0,2,0,2,0,0,0,0,0,0,0]},
            {"pitch": 0.5, "pattern": [0,0,0,0,2,0,0,0,0,0,0,0,2,0,0,0]},
            {"pitch": 0.5, "pattern": [2,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0]}
        ]
    }"#;

    fn replace_instruments(json: &str, instruments: &str) -> String {
        let start = json.find("\"instruments\"").unwrap();
        format!("{}\"instruments\": {}}}", &json[..start], instruments)
    }

    #[test]
    fn test_demo_matches_document() {
        let parsed = Pattern::from_json(DEMO_JSON).unwrap();
        assert_eq!(parsed, Pattern::demo());
        assert_eq!(parsed.hit(Instrument::Kick, 0), Hit::Hard);
        assert_eq!(parsed.hit(Instrument::Snare, 4), Hit::Hard);
        assert_eq!(parsed.hit(Instrument::Snare, 5), Hit::Off);
    }

    #[test]
    fn test_round_trip() {
        let mut pattern = Pattern::demo();
        pattern.set_tempo(97).unwrap();
        pattern.set_swing_factor(0.37).unwrap();
        pattern.set_effect_mix(0.6).unwrap();
        pattern.set_effect(Some("hall".to_string()));
        pattern.set_cell(Instrument::HiHat, 3, Hit::Soft);

        let serialized = pattern.to_json().unwrap();
        assert_eq!(Pattern::from_json(&serialized).unwrap(), pattern);

        let empty = Pattern::empty();
        assert_eq!(Pattern::from_json(&empty.to_json().unwrap()).unwrap(), empty);
    }

    #[test]
    fn test_serialized_field_names() {
        let value: serde_json::Value =
            serde_json::from_str(&Pattern::empty().to_json().unwrap()).unwrap();
        let object = value.as_object().unwrap();
        for key in ["kit", "tempo", "effect", "effectMix", "swingFactor", "instruments"] {
            assert!(object.contains_key(key), "missing {}", key);
        }
        assert_eq!(object["instruments"].as_array().unwrap().len(), INSTRUMENTS);
        assert_eq!(object["instruments"][0]["pattern"].as_array().unwrap().len(), STEPS);
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let five_instruments = replace_instruments(
            DEMO_JSON,
            &format!("[{}]", vec![r#"{"pitch": 0.5, "pattern": [0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0]}"#; 5].join(",")),
        );
        assert!(matches!(
            Pattern::from_json(&five_instruments),
            Err(PatternError::Parse(_))
        ));

        let short_pattern = replace_instruments(
            DEMO_JSON,
            &format!("[{}]", vec![r#"{"pitch": 0.5, "pattern": [0,0,0]}"#; 6].join(",")),
        );
        assert!(Pattern::from_json(&short_pattern).is_err());
    }

    #[test]
    fn test_rejects_out_of_domain_values() {
        let slow = DEMO_JSON.replace("\"tempo\": 120", "\"tempo\": 49");
        assert!(Pattern::from_json(&slow).is_err());

        let fast = DEMO_JSON.replace("\"tempo\": 120", "\"tempo\": 181");
        assert!(Pattern::from_json(&fast).is_err());

        let swing = DEMO_JSON.replace("\"swingFactor\": 0", "\"swingFactor\": 1.5");
        assert!(Pattern::from_json(&swing).is_err());

        let hit = DEMO_JSON.replace("[2,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0]", "[3,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0]");
        assert!(Pattern::from_json(&hit).is_err());
    }

    #[test]
    fn test_tempo_bounds() {
        let mut pattern = Pattern::empty();
        assert!(pattern.set_tempo(MIN_TEMPO).is_ok());
        assert!(pattern.set_tempo(MAX_TEMPO).is_ok());
        assert!(matches!(
            pattern.set_tempo(MAX_TEMPO + 1),
            Err(PatternError::TempoOutOfRange(181))
        ));
        assert_eq!(pattern.tempo(), MAX_TEMPO);
    }

    #[test]
    fn test_hit_volumes() {
        assert_eq!(Hit::Off.volume(), 0.0);
        assert_eq!(Hit::Soft.volume(), 0.3);
        assert_eq!(Hit::Hard.volume(), 1.0);
        assert!(!Hit::Off.is_on());
        assert!(Hit::Soft.is_on());
    }

    #[test]
    fn test_instrument_rows() {
        for (row, instrument) in Instrument::ALL.iter().enumerate() {
            assert_eq!(instrument.row(), row);
            assert_eq!(Instrument::from_row(row), Some(*instrument));
        }
        assert_eq!(Instrument::from_row(INSTRUMENTS), None);
        assert_eq!(Instrument::Kick.row(), 5);
        assert_eq!(Instrument::Tom1.row(), 0);
    }

    #[test]
    fn test_instrument_parsing() {
        assert_eq!("kick".parse::<Instrument>().unwrap(), Instrument::Kick);
        assert_eq!("Hi-Hat".parse::<Instrument>().unwrap(), Instrument::HiHat);
        assert_eq!("Tom 3".parse::<Instrument>().unwrap(), Instrument::Tom3);
        assert_eq!("4".parse::<Instrument>().unwrap(), Instrument::Snare);
        assert!("cowbell".parse::<Instrument>().is_err());
        assert!("6".parse::<Instrument>().is_err());
    }

    #[test]
    fn test_display_grid() {
        let rendered = Pattern::demo().to_string();
        assert!(rendered.contains("Kick   |X...|....|....|....|"));
        assert!(rendered.contains("Tempo: 120 BPM"));
    }
}
