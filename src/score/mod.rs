mod query;
mod smf;

pub use query::{Active, Direction, EventQuery};

use crate::{error::ScoreError, progress::AnimationPhase, timing::*};
use bevy::prelude::Resource;
use itertools::Itertools;

/// A note event with its position resolved against the score's tempo map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub pitch: u8,
    pub start_tick: u32,
    pub duration_ticks: u32,
    pub velocity: f32,
    pub start_seconds: f64,
    pub start_measure: f64,
}

impl Note {
    pub fn new(pitch: u8, start_tick: u32, duration_ticks: u32, velocity: f32, tempo: &TempoMap) -> Self {
        Self {
            pitch,
            start_tick,
            duration_ticks,
            velocity,
            start_seconds: tempo.ticks_to_seconds(start_tick as f64),
            start_measure: tempo.ticks_to_measures(start_tick as f64),
        }
    }

    pub fn end_tick(&self) -> u32 {
        self.start_tick.saturating_add(self.duration_ticks)
    }

    pub fn scheduled_at(&self, tick: f64) -> bool {
        AnimationPhase::of(self, tick, 0., 0.).is_active()
    }

    /// Pitch class as a fraction of the octave, `0` for C.
    pub fn degree(&self) -> f64 {
        (self.pitch % 12) as f64 / 12.
    }

    /// Velocity used as a flag: soft notes select the half-size variant.
    pub fn is_half(&self) -> bool {
        self.velocity <= 0.5
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextCue {
    pub tick: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub name: String,
    pub notes: Vec<Note>,
    pub texts: Vec<TextCue>,
}

impl Track {
    pub fn new(name: impl Into<String>, mut notes: Vec<Note>, mut texts: Vec<TextCue>) -> Self {
        notes.sort_by_key(|note| note.start_tick);
        texts.sort_by_key(|cue| cue.tick);
        Self {
            name: name.into(),
            notes,
            texts,
        }
    }

    /// Text event sharing the note's start tick, if the track has one.
    pub fn text_for(&self, note: &Note) -> Option<&str> {
        self.texts
            .iter()
            .find(|cue| cue.tick == note.start_tick)
            .map(|cue| cue.text.as_str())
    }

    pub fn end_tick(&self) -> u32 {
        self.notes.iter().map(Note::end_tick).max().unwrap_or(0)
    }
}

/// The whole authored piece: read-only after loading.
#[derive(Debug, Clone, Default, Resource)]
pub struct Score {
    pub tempo: TempoMap,
    pub tracks: Vec<Track>,
}

impl Score {
    pub fn new(tempo: TempoMap, tracks: Vec<Track>) -> Self {
        Self { tempo, tracks }
    }

    pub fn track(&self, name: &str) -> Result<&Track, ScoreError> {
        self.tracks
            .iter()
            .find(|track| track.name == name)
            .ok_or_else(|| ScoreError::MissingTrack(name.to_string()))
    }

    /// Seconds until the last note of any track ends.
    pub fn song_length(&self) -> f64 {
        self.tracks
            .iter()
            .map(Track::end_tick)
            .max()
            .map_or(0., |tick| self.tempo.ticks_to_seconds(tick as f64))
    }

    /// Moves the tracks of `other` into this score. Ticks are rescaled onto
    /// this score's resolution and times re-resolved against this tempo map.
    #[rustfmt::skip]
    pub fn absorb(&mut self, other: Score) {
        let ratio = self.tempo.ppq() as f64 / other.tempo.ppq() as f64;
        let rescale = |tick: u32| (tick as f64 * ratio).round() as u32;
        let tempo = &self.tempo;

        let absorbed = other.tracks.into_iter().map(|track| Track::new(
            track.name,
            track.notes.iter().map(|note| Note::new(
                note.pitch,
                rescale(note.start_tick),
                rescale(note.duration_ticks).max(1),
                note.velocity,
                tempo,
            )).collect(),
            track.texts.into_iter().map(|cue| TextCue { tick: rescale(cue.tick), ..cue }).collect(),
        )).collect_vec();

        self.tracks.extend(absorbed);
    }
}
