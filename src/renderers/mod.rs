pub mod atlas;
pub mod background;
pub mod bridge;
pub mod chord;
pub mod clock;
pub mod pixelsort;

use crate::{
    canvas::Canvas,
    config::Settings,
    error::{AssetError, RenderError},
    playback::PlaybackState,
    score::Score,
};
use bevy::math::Vec2;
use std::path::Path;

/// Everything a renderer may read during one frame.
#[derive(Clone, Copy)]
pub struct FrameContext<'a> {
    pub score: &'a Score,
    pub playback: &'a PlaybackState,
    pub settings: &'a Settings,
}

impl FrameContext<'_> {
    pub fn tick(&self) -> f64 {
        self.playback.tick()
    }

    pub fn measure(&self) -> f64 {
        self.playback.measure()
    }

    pub fn dot_unit(&self) -> f32 {
        self.settings.dot_unit
    }
}

/// One layer of the piece. Renderers own whatever they prepared during setup
/// and draw from the frame context alone; they never touch the clock.
pub trait Renderer: Send + Sync {
    fn name(&self) -> &'static str;

    fn draw(&mut self, canvas: &mut Canvas, frame: &FrameContext) -> Result<(), RenderError>;
}

pub fn load_image(path: &Path) -> Result<image::RgbaImage, AssetError> {
    image::open(path)
        .map(|image| image.into_rgba8())
        .map_err(|source| AssetError::Image {
            path: path.to_path_buf(),
            source,
        })
}

/// Point on a circle of `radius` around the origin. `0` is twelve o'clock and
/// one unit is a full clockwise turn.
pub fn clock_point(value: f64, radius: f32) -> Vec2 {
    let angle = value * std::f64::consts::TAU - std::f64::consts::FRAC_PI_2;
    Vec2::new(angle.cos() as f32, angle.sin() as f32) * radius
}
