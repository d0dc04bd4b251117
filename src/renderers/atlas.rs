use crate::error::{AssetError, RenderError};
use bevy::math::{Rect, Vec2};
use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};

/// Marker pixels painted into a sprite sheet to anchor overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Eyes = 0,
    Mouth = 1,
    Foot = 2,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtlasRegion {
    pub start: [f32; 2],
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub yellow_pixels: Vec<[f32; 2]>,
}

impl AtlasRegion {
    pub fn origin(&self) -> Vec2 {
        self.start.into()
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn rect(&self) -> Rect {
        Rect::from_corners(self.origin(), self.origin() + self.size())
    }

    /// Marker position relative to the region's top left corner.
    pub fn marker(&self, index: usize) -> Option<Vec2> {
        self.yellow_pixels
            .get(index)
            .map(|&pixel| Vec2::from(pixel) - self.origin())
    }

    pub fn anchor(&self, anchor: Anchor) -> Option<Vec2> {
        self.marker(anchor as usize)
    }
}

/// Named regions of a sprite sheet.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Atlas {
    regions: HashMap<String, AtlasRegion>,
}

impl Atlas {
    pub fn from_json(json: &str) -> Result<Self, AssetError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, AssetError> {
        fs::read_to_string(path)
            .map_err(|source| AssetError::Io {
                path: path.to_path_buf(),
                source,
            })
            .and_then(|json| Self::from_json(&json))
    }

    pub fn region(&self, name: &str) -> Result<&AtlasRegion, RenderError> {
        self.regions
            .get(name)
            .ok_or_else(|| RenderError::MissingRegion(name.to_string()))
    }

    pub fn anchor(&self, name: &str, anchor: Anchor) -> Result<Vec2, RenderError> {
        self.region(name)?
            .anchor(anchor)
            .ok_or_else(|| RenderError::MissingRegion(format!("{name} {anchor:?}")))
    }

    /// Fails on the first of `names` the atlas lacks.
    pub fn require<'a>(&self, mut names: impl Iterator<Item = &'a str>) -> Result<(), AssetError> {
        names
            .find(|name| !self.regions.contains_key(*name))
            .map_or(Ok(()), |name| Err(AssetError::MissingRegion(name.to_string())))
    }
}
