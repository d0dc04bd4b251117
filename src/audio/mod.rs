use crate::{
    config::{ClockSource, Settings},
    error::{exit_on_error, AssetError},
    playback::{PlaybackState, TransportCommand},
    score::Score,
    timing::*,
};
use bevy::prelude::*;
pub use bevy_kira_audio::prelude::{
    AudioInstance as KiraInstance, AudioPlugin as KiraPlugin, AudioSource as KiraSource, *,
};

#[derive(Resource, Default)]
pub struct SongChannel;

#[derive(Resource, Default, Debug)]
pub struct SongInfo {
    pub volume: f64,
    pub handle: Handle<KiraInstance>,
}

/// Systems that move the playback clock, in the order they run.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransportSet;

fn clock_source_is(source: ClockSource) -> impl Fn(Res<Settings>) -> bool {
    move |settings: Res<Settings>| settings.clock_source == source
}

/// Loads the song and leaves it paused at the start.
pub fn load_song(
    settings: Res<Settings>,
    song_channel: Res<AudioChannel<SongChannel>>,
    mut kira_sources: ResMut<Assets<KiraSource>>,
    mut song_info: ResMut<SongInfo>,
) -> Result<(), AssetError> {
    let path = settings.assets.resolve(&settings.assets.audio);

    let source = StaticSoundData::from_file(&path, StaticSoundSettings::default())
        .map(|sound| KiraSource { sound })
        .map_err(|err| AssetError::Audio {
            path: path.clone(),
            reason: err.to_string(),
        })?;

    info!(
        "Loaded {} ({:.1}s)",
        path.display(),
        source.sound.duration().as_secs_f64()
    );

    song_channel.set_volume(settings.volume);
    *song_info = SongInfo {
        volume: settings.volume,
        handle: song_channel.play(kira_sources.add(source)).handle(),
    };
    song_channel.pause();

    Ok(())
}

#[rustfmt::skip]
pub fn read_keyboard(
    keys: Res<Input<KeyCode>>,
    settings: Res<Settings>,
    mut commands: EventWriter<TransportCommand>,
) {
    [
        (KeyCode::Space, TransportCommand::TogglePlay),
        (KeyCode::Right, TransportCommand::Seek(settings.seek_step)),
        (KeyCode::Left, TransportCommand::Seek(-settings.seek_step)),
        (KeyCode::Up, TransportCommand::Volume(settings.volume_step)),
        (KeyCode::Down, TransportCommand::Volume(-settings.volume_step)),
    ]
    .into_iter()
    .filter(|(key, _)| keys.just_pressed(*key))
    .for_each(|(_, command)| commands.send(command));
}

pub fn apply_transport(
    mut commands: EventReader<TransportCommand>,
    mut playback: ResMut<PlaybackState>,
    score: Res<Score>,
) {
    commands.iter().for_each(|command| {
        debug!("Transport {command:?}");
        match command {
            TransportCommand::TogglePlay => playback.playing = !playback.playing,
            TransportCommand::Seek(seconds) => playback.seek(*seconds, &score.tempo),
            TransportCommand::Volume(_) => {}
        }
    });
}

/// Mirrors transport commands onto the song instance. In capture mode the
/// song stays paused and only volume is forwarded.
pub fn sync_audio(
    mut commands: EventReader<TransportCommand>,
    playback: Res<PlaybackState>,
    settings: Res<Settings>,
    song_channel: Res<AudioChannel<SongChannel>>,
    mut song_info: ResMut<SongInfo>,
    mut instances: ResMut<Assets<KiraInstance>>,
) {
    let follows_audio = settings.clock_source == ClockSource::Audio;

    commands.iter().for_each(|command| {
        let instance = instances.get_mut(&song_info.handle);
        match (command, instance) {
            (TransportCommand::Volume(delta), _) => {
                song_info.volume = (song_info.volume + delta).clamp(0., 1.);
                song_channel.set_volume(song_info.volume);
                debug!("Volume {:.1}", song_info.volume);
            }
            (TransportCommand::TogglePlay, Some(instance)) if follows_audio && playback.playing => {
                instance.seek_to(playback.time());
                instance.resume(AudioTween::default());
            }
            (TransportCommand::TogglePlay, Some(instance)) => {
                instance.pause(AudioTween::default());
            }
            (TransportCommand::Seek(_), Some(instance)) if follows_audio && playback.playing => {
                instance.seek_to(playback.time());
            }
            _ => {}
        }
    });
}

/// Frame the song instance puts playback at. An instance only reports a seek
/// or a resume a frame after it is told, so a frame that applied a transport
/// command keeps the clock where the command left it.
fn audio_frame(playing: bool, transported: bool, position: Option<f64>) -> Option<f64> {
    (playing && !transported)
        .then_some(position)
        .flatten()
        .map(seconds_to_frame)
}

pub fn follow_audio_clock(
    mut commands: EventReader<TransportCommand>,
    mut playback: ResMut<PlaybackState>,
    score: Res<Score>,
    song_info: Res<SongInfo>,
    instances: Res<Assets<KiraInstance>>,
) {
    let transported = commands
        .iter()
        .filter(|command| !matches!(command, TransportCommand::Volume(_)))
        .count()
        != 0;
    let position = instances
        .get(&song_info.handle)
        .and_then(|instance| instance.state().position());

    if let Some(frame) = audio_frame(playback.playing, transported, position) {
        playback.set_frame(frame, &score.tempo);
    }
}

pub fn step_capture_clock(mut playback: ResMut<PlaybackState>, score: Res<Score>) {
    if playback.playing {
        let frame = playback.frame().floor() + 1.;
        playback.set_frame(frame, &score.tempo);
    }
}

pub struct AudioPlugin;

impl Plugin for AudioPlugin {
    fn build(&self, game: &mut App) {
        game.add_plugin(KiraPlugin)
            .init_resource::<SongInfo>()
            .init_resource::<PlaybackState>()
            .add_audio_channel::<SongChannel>()
            .add_event::<TransportCommand>()
            .add_startup_system(load_song.pipe(exit_on_error))
            .add_systems(
                (
                    read_keyboard,
                    apply_transport,
                    sync_audio,
                    follow_audio_clock.run_if(clock_source_is(ClockSource::Audio)),
                    step_capture_clock.run_if(clock_source_is(ClockSource::Capture)),
                )
                    .chain()
                    .in_set(TransportSet),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tap::Tap;
    use test_case::test_case;

    fn capture_app() -> App {
        App::new().tap_mut(|game| {
            game.add_event::<TransportCommand>()
                .insert_resource(Settings {
                    clock_source: ClockSource::Capture,
                    ..Settings::default()
                })
                .insert_resource(Score::default())
                .init_resource::<PlaybackState>()
                .add_systems(
                    (
                        apply_transport,
                        step_capture_clock.run_if(clock_source_is(ClockSource::Capture)),
                    )
                        .chain(),
                );
        })
    }

    fn frame(game: &App) -> f64 {
        game.world.resource::<PlaybackState>().frame()
    }

    #[test]
    fn capture_clock_steps_only_while_playing() {
        let mut game = capture_app();
        game.update();
        assert_eq!(frame(&game), 0.);

        game.world.send_event(TransportCommand::TogglePlay);
        game.update();
        game.update();
        assert_eq!(frame(&game), 2.);

        game.world.send_event(TransportCommand::TogglePlay);
        game.update();
        assert_eq!(frame(&game), 2.);
        assert!(!game.world.resource::<PlaybackState>().playing);
    }

    #[test]
    fn seeking_is_clamped() {
        let mut game = capture_app();
        game.world.send_event(TransportCommand::Seek(5.));
        game.update();
        assert_eq!(frame(&game), 300.);

        game.world.send_event(TransportCommand::Seek(-5.));
        game.world.send_event(TransportCommand::Seek(-5.));
        game.update();
        assert_eq!(frame(&game), 0.);
        assert_eq!(game.world.resource::<PlaybackState>().time(), 0.);
    }

    #[test]
    fn volume_leaves_clock_alone() {
        let mut game = capture_app();
        game.world.send_event(TransportCommand::Volume(0.1));
        game.update();
        assert_eq!(*game.world.resource::<PlaybackState>(), PlaybackState::default());
    }

    #[test_case(true, false, Some(2.), Some(120.); "follows the song")]
    #[test_case(true, true, Some(2.), None; "stale after a command")]
    #[test_case(false, false, Some(2.), None; "paused")]
    #[test_case(true, false, None, None; "no instance yet")]
    fn audio_clock(playing: bool, transported: bool, position: Option<f64>, expected: Option<f64>) {
        assert_eq!(audio_frame(playing, transported, position), expected);
    }
}
