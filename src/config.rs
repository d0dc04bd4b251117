use crate::{drum::DrumDefinition, error::ConfigError};
use bevy::{asset::FileAssetIo, prelude::*};
use serde::Deserialize;
use std::{fs, io, path::Path, path::PathBuf};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockSource {
    /// Frames follow the audio position.
    #[default]
    Audio,
    /// Frames advance by one per update, for deterministic frame capture.
    Capture,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AssetPaths {
    pub root: PathBuf,
    pub score: String,
    pub timeline: String,
    pub audio: String,
    pub chord_sheet: String,
    pub illustration: String,
    pub atlas: String,
    pub backgrounds: String,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            root: "assets".into(),
            score: "main.mid".into(),
            timeline: "timeline.mid".into(),
            audio: "main.ogg".into(),
            chord_sheet: "chord.png".into(),
            illustration: "illusts/main.png".into(),
            atlas: "atlas.json".into(),
            backgrounds: "backgrounds".into(),
        }
    }
}

impl AssetPaths {
    /// Absolute path of an asset file under the asset root.
    pub fn resolve(&self, file: &str) -> PathBuf {
        FileAssetIo::get_base_path().join(&self.root).join(file)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackNames {
    pub chords: String,
    pub backgrounds: String,
    pub bridge: String,
    pub chord_names: String,
}

impl Default for TrackNames {
    fn default() -> Self {
        Self {
            chords: "LABS".into(),
            backgrounds: "backgrounds".into(),
            bridge: "bridge".into(),
            chord_names: "chord".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Resource, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub width: f32,
    pub height: f32,
    pub dot_unit: f32,
    pub bg: [u8; 3],
    pub fg: [u8; 3],
    pub volume: f64,
    pub volume_step: f64,
    pub seek_step: f64,
    pub clock_source: ClockSource,
    pub assets: AssetPaths,
    pub tracks: TrackNames,
    pub drums: Vec<DrumDefinition>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: 1920.,
            height: 1080.,
            dot_unit: 4.,
            bg: [0, 0, 0],
            fg: [0x43, 0xb0, 0xd5],
            volume: 0.5,
            volume_step: 0.1,
            seek_step: 5.,
            clock_source: ClockSource::Audio,
            assets: AssetPaths::default(),
            tracks: TrackNames::default(),
            drums: vec![DrumDefinition::sitala()],
        }
    }
}

impl Settings {
    pub const FILE: &'static str = "assets/settings.json";

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads settings from `path`; a missing file means defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }
}
