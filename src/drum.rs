use crate::{error::ScoreError, score::Track};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Instrument {
    Kick,
    Snare,
    Hihat,
    OpenHihat,
    Clap,
    Dial,
    Star,
}

impl Instrument {
    /// Paint order on the clock face. Cues without a slot go underneath.
    pub fn draw_order(self) -> i8 {
        match self {
            Instrument::Kick => 0,
            Instrument::Snare => 1,
            Instrument::Hihat => 2,
            Instrument::Clap => 3,
            Instrument::OpenHihat | Instrument::Dial | Instrument::Star => -1,
        }
    }
}

/// One drum track and the pitch each instrument is written on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DrumDefinition {
    pub track: String,
    pub pitches: BTreeMap<Instrument, u8>,
}

impl DrumDefinition {
    pub fn sitala() -> Self {
        Self {
            track: "Sitala".into(),
            pitches: [
                (Instrument::Kick, 36),
                (Instrument::Snare, 37),
                (Instrument::Hihat, 38),
                (Instrument::Clap, 40),
                (Instrument::OpenHihat, 41),
            ]
            .into(),
        }
    }
}

/// Pitch to instrument lookup, inverted from a [`DrumDefinition`] once at
/// startup.
#[derive(Debug, Clone)]
pub struct DrumKit {
    track: String,
    instruments: [Option<Instrument>; 128],
}

impl DrumKit {
    pub fn new(definition: &DrumDefinition) -> Result<Self, ScoreError> {
        definition.pitches.iter().try_fold(
            Self {
                track: definition.track.clone(),
                instruments: [None; 128],
            },
            |mut kit, (&instrument, &pitch)| {
                let slot = kit
                    .instruments
                    .get_mut(pitch as usize)
                    .ok_or_else(|| ScoreError::UnmappedPitch {
                        track: definition.track.clone(),
                        pitch,
                    })?;

                match slot.replace(instrument) {
                    Some(first) => Err(ScoreError::DuplicatePitch {
                        pitch,
                        first: format!("{first:?}"),
                        second: format!("{instrument:?}"),
                    }),
                    None => Ok(kit),
                }
            },
        )
    }

    pub fn track(&self) -> &str {
        &self.track
    }

    pub fn instrument(&self, pitch: u8) -> Option<Instrument> {
        self.instruments.get(pitch as usize).copied().flatten()
    }

    /// Every note of `track` must resolve to an instrument.
    pub fn validate(&self, track: &Track) -> Result<(), ScoreError> {
        track
            .notes
            .iter()
            .find(|note| self.instrument(note.pitch).is_none())
            .map_or(Ok(()), |note| {
                Err(ScoreError::UnmappedPitch {
                    track: track.name.clone(),
                    pitch: note.pitch,
                })
            })
    }
}
