use bevy::{asset::FileAssetIo, prelude::*, window::WindowResolution};
use bevy_egui::EguiPlugin;
use score_clock::{audio::AudioPlugin, config::Settings, error::Error, VisualsPlugin};

fn spawn_camera(mut commands: Commands) {
    commands.spawn(Camera2dBundle::default());
}

fn main() -> Result<(), Error> {
    let settings = Settings::load(FileAssetIo::get_base_path().join(Settings::FILE))?;
    let [r, g, b] = settings.bg;

    let mut game = App::new();
    game.insert_resource(ClearColor(Color::rgb_u8(r, g, b)))
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "score-clock".into(),
                resolution: WindowResolution::new(settings.width, settings.height),
                ..default()
            }),
            ..default()
        }))
        .insert_resource(settings)
        .add_plugin(EguiPlugin)
        .add_plugin(AudioPlugin)
        .add_plugin(VisualsPlugin)
        .add_startup_system(spawn_camera);

    #[cfg(debug_assertions)]
    game.add_plugin(bevy_screen_diagnostics::ScreenDiagnosticsPlugin::default())
        .add_plugin(bevy_screen_diagnostics::ScreenFrameDiagnosticsPlugin);

    game.run();
    Ok(())
}
