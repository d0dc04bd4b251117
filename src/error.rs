use bevy::{app::AppExit, prelude::*};
use std::{fmt::Display, io, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("Track `{0}` not found in score")]
    MissingTrack(String),

    #[error("Malformed MIDI file: {0}")]
    Midi(#[from] midly::Error),

    #[error("Timecode based MIDI timing is not supported")]
    UnsupportedTiming,

    #[error("Pitch {pitch} in track `{track}` has no instrument mapping")]
    UnmappedPitch { track: String, pitch: u8 },

    #[error("Pitch {pitch} is mapped to both {first} and {second}")]
    DuplicatePitch {
        pitch: u8,
        first: String,
        second: String,
    },
}

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Could not read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Could not load audio {path}: {reason}")]
    Audio { path: PathBuf, reason: String },

    #[error("Could not decode image {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Invalid atlas description: {0}")]
    Atlas(#[from] serde_json::Error),

    #[error("Atlas has no region named `{0}`")]
    MissingRegion(String),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("No background image named `{0}`")]
    MissingBackground(String),

    #[error("Background cue at tick {0} carries no image name")]
    UnnamedBackground(u32),

    #[error("Atlas has no region named `{0}`")]
    MissingRegion(String),

    #[error("Chord glyph index {0} is outside the chord sheet")]
    GlyphOutOfRange(i32),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read settings from {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Invalid settings: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Terminal system for fallible setup steps: a failure is logged and the app
/// shuts down.
pub fn exit_on_error<E: Display>(In(result): In<Result<(), E>>, mut exit: EventWriter<AppExit>) {
    if let Err(err) = result {
        error!("{err}");
        exit.send(AppExit);
    }
}
