pub mod audio;
pub mod canvas;
pub mod compositor;
pub mod config;
pub mod drum;
pub mod easing;
pub mod error;
pub mod playback;
pub mod progress;
pub mod renderers;
pub mod score;
pub mod timing;
pub mod utils;

use audio::TransportSet;
use bevy::prelude::*;
use canvas::present::{present, TextureRegistry};
use compositor::{render_frame, Compositor, Frame};
use config::Settings;
use error::{exit_on_error, AssetError, Error};
use renderers::{background::Background, bridge::Bridge, chord::ChordTicker, clock::Clock};
use score::Score;
use std::fs;

fn read_asset(settings: &Settings, file: &str) -> Result<Vec<u8>, AssetError> {
    let path = settings.assets.resolve(file);
    fs::read(&path).map_err(|source| AssetError::Io { path, source })
}

/// Loads the score and prepares every renderer, back to front.
pub fn setup(
    mut commands: Commands,
    settings: Res<Settings>,
    mut compositor: ResMut<Compositor>,
    mut registry: ResMut<TextureRegistry>,
) -> Result<(), Error> {
    let mut score = Score::from_smf(&read_asset(&settings, &settings.assets.score)?)?;
    score.absorb(Score::from_smf(&read_asset(&settings, &settings.assets.timeline)?)?);

    info!(
        "Loaded score with {} tracks ({:.1}s)",
        score.tracks.len(),
        score.song_length()
    );

    *compositor = Compositor::new(vec![
        Box::new(Background::load(&settings, &score)?),
        Box::new(Clock::new(&settings, &score)?),
        Box::new(Bridge::load(&settings, &score, &mut registry)?),
        Box::new(ChordTicker::load(&settings, &score, &mut registry)?),
    ]);

    info!("Clock source: {:?}", settings.clock_source);
    commands.insert_resource(score);

    Ok(())
}

/// Score, renderers and presentation. Expects [`Settings`] to be inserted
/// before it is added.
pub struct VisualsPlugin;

impl Plugin for VisualsPlugin {
    fn build(&self, game: &mut App) {
        game.init_resource::<Score>()
            .init_resource::<Compositor>()
            .init_resource::<TextureRegistry>()
            .init_resource::<Frame>()
            .add_startup_system(setup.pipe(exit_on_error))
            .add_systems((render_frame, present).chain().after(TransportSet));
    }
}
