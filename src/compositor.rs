use crate::{
    canvas::{Canvas, Rgba},
    config::Settings,
    playback::PlaybackState,
    renderers::{FrameContext, Renderer},
    score::Score,
};
use bevy::prelude::*;

const ERROR_BACKGROUND: Rgba = Rgba([255, 0, 0, 250]);
const ERROR_TEXT_SIZE: f32 = 64.;

/// The canvas everything is recorded into this frame.
#[derive(Resource, Deref, DerefMut)]
pub struct Frame(pub Canvas);

impl FromWorld for Frame {
    fn from_world(world: &mut World) -> Self {
        let size = world
            .get_resource::<Settings>()
            .map_or(Settings::default().size(), Settings::size);
        Self(Canvas::new(size))
    }
}

/// Runs the renderers back to front. A renderer failing replaces the whole
/// frame with the error text; the error is logged once per failing run.
#[derive(Resource, Default)]
pub struct Compositor {
    renderers: Vec<Box<dyn Renderer>>,
    errored_last_frame: bool,
}

impl Compositor {
    pub fn new(renderers: Vec<Box<dyn Renderer>>) -> Self {
        Self {
            renderers,
            errored_last_frame: false,
        }
    }

    pub fn render(&mut self, canvas: &mut Canvas, frame: &FrameContext) {
        canvas.reset();
        canvas.background(Rgba::rgb(frame.settings.bg));

        let outcome = self.renderers.iter_mut().try_for_each(|renderer| {
            renderer
                .draw(&mut canvas.scoped(), frame)
                .map_err(|err| format!("{}: {err}", renderer.name()))
        });

        match outcome {
            Ok(()) => self.errored_last_frame = false,
            Err(message) => {
                if !self.errored_last_frame {
                    error!("{message}");
                }
                self.errored_last_frame = true;

                canvas.reset();
                canvas.background(ERROR_BACKGROUND);
                canvas.fill(Rgba::WHITE);
                canvas.text(message, Vec2::splat(32.), ERROR_TEXT_SIZE);
            }
        }
    }
}

pub fn render_frame(
    mut compositor: ResMut<Compositor>,
    mut frame: ResMut<Frame>,
    score: Res<Score>,
    playback: Res<PlaybackState>,
    settings: Res<Settings>,
) {
    let context = FrameContext {
        score: &score,
        playback: &playback,
        settings: &settings,
    };
    compositor.render(&mut frame, &context);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        canvas::{PixelBuffer, Shape},
        error::RenderError,
        renderers::{
            atlas::{tests::SHEET, Atlas},
            background::Background,
            bridge::Bridge,
            chord::ChordTicker,
            clock::Clock,
            tests::*,
        },
        score::{tests::*, TextCue, Track},
    };
    use pretty_assertions::assert_eq;

    /// Fails until the first bar is over.
    struct LateStarter;

    impl Renderer for LateStarter {
        fn name(&self) -> &'static str {
            "late"
        }

        fn draw(&mut self, canvas: &mut Canvas, frame: &FrameContext) -> Result<(), RenderError> {
            canvas.translate(Vec2::splat(50.));
            canvas.no_stroke();
            if frame.tick() < 480. {
                return Err(RenderError::MissingBackground("intro.png".into()));
            }
            canvas.circle(Vec2::ZERO, 10.);
            Ok(())
        }
    }

    /// Draws at the origin with whatever state it is handed.
    struct Marker;

    impl Renderer for Marker {
        fn name(&self) -> &'static str {
            "marker"
        }

        fn draw(&mut self, canvas: &mut Canvas, _: &FrameContext) -> Result<(), RenderError> {
            canvas.line(Vec2::ZERO, Vec2::X);
            Ok(())
        }
    }

    fn score_with(tracks: Vec<Track>) -> Score {
        Score::new(
            short_bars(),
            ["Sitala", "LABS", "backgrounds", "bridge", "chord"]
                .into_iter()
                .map(|name| {
                    tracks
                        .iter()
                        .find(|track| track.name == name)
                        .cloned()
                        .unwrap_or_else(|| Track::new(name, vec![], vec![]))
                })
                .collect(),
        )
    }

    fn score() -> Score {
        score_with(vec![])
    }

    fn render(compositor: &mut Compositor, canvas: &mut Canvas, score: &Score, tick: f64) {
        let settings = Settings::default();
        let playback = playback_at_tick(tick, &score.tempo);
        compositor.render(canvas, &frame_at(score, &playback, &settings));
        assert_eq!(canvas.depth(), 0);
    }

    #[test]
    fn renderer_state_does_not_leak() {
        let mut compositor = Compositor::new(vec![Box::new(LateStarter), Box::new(Marker)]);
        let (mut canvas, score) = (canvas(), score());
        render(&mut compositor, &mut canvas, &score, 600.);

        assert_eq!(
            canvas.shapes(),
            &[
                Shape::Background(Rgba::rgb([0, 0, 0])),
                Shape::Circle {
                    center: Vec2::splat(50.),
                    radius: 5.,
                    fill: Some(Rgba::WHITE),
                    stroke: None,
                },
                Shape::Line {
                    from: Vec2::ZERO,
                    to: Vec2::X,
                    stroke: crate::canvas::Stroke {
                        width: 1.,
                        color: Rgba([0, 0, 0, 255]),
                    },
                },
            ]
        );
    }

    #[test]
    fn failing_frame_is_replaced_then_recovers() {
        let mut compositor = Compositor::new(vec![Box::new(Marker), Box::new(LateStarter)]);
        let (mut canvas, score) = (canvas(), score());

        render(&mut compositor, &mut canvas, &score, 10.);
        assert!(compositor.errored_last_frame);
        assert_eq!(
            canvas.shapes(),
            &[
                Shape::Background(ERROR_BACKGROUND),
                Shape::Text {
                    position: Vec2::splat(32.),
                    text: "late: No background image named `intro.png`".into(),
                    size: ERROR_TEXT_SIZE,
                    color: Rgba::WHITE,
                },
            ]
        );

        render(&mut compositor, &mut canvas, &score, 20.);
        assert!(compositor.errored_last_frame);

        render(&mut compositor, &mut canvas, &score, 600.);
        assert!(!compositor.errored_last_frame);
        assert_eq!(canvas.shapes().len(), 3);
        assert!(matches!(canvas.shapes()[0], Shape::Background(color) if color == Rgba::rgb([0, 0, 0])));
    }

    fn textures(canvas: &Canvas) -> Vec<&str> {
        canvas
            .shapes()
            .iter()
            .map(|shape| match shape {
                Shape::Background(_) => "",
                Shape::Image { texture, .. } => texture.0.as_str(),
                _ => "mark",
            })
            .collect()
    }

    #[test]
    fn silent_score_shows_only_the_clock_face() {
        let score = score();
        let settings = Settings::default();
        let mut compositor = Compositor::new(vec![
            Box::new(Background::new(
                score.track("backgrounds").unwrap().clone(),
                [("city.png".to_string(), PixelBuffer::new(4, 4))].into_iter().collect(),
            )),
            Box::new(Clock::new(&settings, &score).unwrap()),
            Box::new(
                Bridge::new(
                    score.track("bridge").unwrap().clone(),
                    Atlas::from_json(SHEET).unwrap(),
                    "illusts/main.png".into(),
                )
                .unwrap(),
            ),
            Box::new(ChordTicker::new(
                score.track("chord").unwrap().clone(),
                "chord.png".into(),
                Vec2::new(1364., 2000.),
            )),
        ]);
        let mut canvas = canvas();
        render(&mut compositor, &mut canvas, &score, 0.);

        assert_eq!(textures(&canvas), vec!["", "clock"]);
        let uploads = canvas.take_uploads();
        assert_eq!(uploads.len(), 1);

        // Face ring and hand only.
        let (_, layer) = &uploads[0];
        let marked = layer.data.chunks_exact(4).filter(|pixel| pixel[3] != 0).count();
        assert!(0 < marked && marked < 2000);
        assert_eq!(layer.pixel(240, 189).map(|pixel| pixel[3]), Some(255));
    }

    #[test]
    fn snare_erases_the_clock_but_not_the_background() {
        let tempo = short_bars();
        let score = score_with(vec![
            Track::new("Sitala", vec![note(37, 0, 10, &tempo)], vec![]),
            Track::new(
                "backgrounds",
                vec![note(60, 0, 960, &tempo)],
                vec![TextCue { tick: 0, text: "city.png".into() }],
            ),
        ]);
        let settings = Settings::default();
        let city = PixelBuffer {
            width: 4,
            height: 4,
            data: [200, 120, 40, 255].repeat(16),
        };
        let mut compositor = Compositor::new(vec![
            Box::new(Background::new(
                score.track("backgrounds").unwrap().clone(),
                [("city.png".to_string(), city)].into_iter().collect(),
            )),
            Box::new(Clock::new(&settings, &score).unwrap()),
        ]);
        let mut canvas = canvas();
        render(&mut compositor, &mut canvas, &score, 60.);

        assert_eq!(textures(&canvas), vec!["", "background", "clock"]);
        assert!(!canvas.shapes().iter().any(|shape| matches!(shape, Shape::Erase { .. })));

        let uploads = canvas.take_uploads();
        let keys = uploads.iter().map(|(key, _)| key.0.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, vec!["background", "clock"]);

        // The hole at twelve o'clock is transparent, so the background shows
        // through it instead of a disc of the clear colour.
        let (_, layer) = &uploads[1];
        assert_eq!(layer.pixel(240, 27).map(|pixel| pixel[3]), Some(0));
        assert_eq!(layer.pixel(240, 189).map(|pixel| pixel[3]), Some(255));
        assert!(uploads[0].1.data.chunks_exact(4).all(|pixel| pixel[3] == 255));
    }
}
