use super::{pixelsort::*, *};
use crate::{
    canvas::{PixelBuffer, Rgba},
    easing::{ease_in_quint, Easing},
    error::Error,
    progress::progress_within_event,
    score::{EventQuery, Track},
};
use bevy::{
    log::{info, warn},
    math::Rect,
    utils::HashMap,
};
use image::imageops::{self, FilterType};
use std::{f64::consts::PI, fs};

const IMAGE_SWITCH: u8 = 60;
const SORT_IN: u8 = 61;
const SORT_OUT: u8 = 62;
const ALPHA_IN: u8 = 63;

/// Working buffers are this many times smaller than the canvas.
const SCALE_DOWN: f32 = 4.;
const MAX_ALPHA: f64 = 192.;
const TEXTURE: &str = "background";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    Still,
    SortIn(f64),
    SortOut(f64),
}

impl Transition {
    /// Run threshold for the pixel sort: disorder grows while sorting in and
    /// recedes while sorting out.
    pub fn threshold(self) -> f64 {
        match self {
            Transition::Still => 0.,
            Transition::SortIn(progress) => MAX_THRESHOLD * ease_in_quint(progress),
            Transition::SortOut(progress) => MAX_THRESHOLD * ease_in_quint(1. - progress),
        }
    }
}

/// What the background shows at one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene<'a> {
    pub image: &'a str,
    pub transition: Transition,
    pub alpha: f64,
}

pub struct Background {
    track: Track,
    images: HashMap<String, PixelBuffer>,
    work: PixelBuffer,
    output: PixelBuffer,
}

impl Background {
    pub fn new(track: Track, images: HashMap<String, PixelBuffer>) -> Self {
        Self {
            track,
            images,
            work: PixelBuffer::new(0, 0),
            output: PixelBuffer::new(0, 0),
        }
    }

    /// Decodes every png in the background directory, shrunk to the working
    /// resolution.
    pub fn load(settings: &Settings, score: &Score) -> Result<Self, Error> {
        let track = score.track(&settings.tracks.backgrounds)?.clone();
        let dir = settings.assets.resolve(&settings.assets.backgrounds);
        let (width, height) = (
            (settings.width / SCALE_DOWN) as u32,
            (settings.height / SCALE_DOWN) as u32,
        );

        let io = |source| AssetError::Io {
            path: dir.clone(),
            source,
        };
        let images = fs::read_dir(&dir)
            .map_err(io)?
            .map(|entry| entry.map(|entry| entry.path()).map_err(io))
            .filter(|path| {
                path.as_ref().map_or(true, |path| {
                    path.extension().map_or(false, |extension| extension == "png")
                })
            })
            .map(|path| {
                let path = path?;
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let image = imageops::resize(&load_image(&path)?, width, height, FilterType::Triangle);
                Ok((name, PixelBuffer::from_image(image)))
            })
            .collect::<Result<HashMap<_, _>, AssetError>>()?;

        info!("Loaded {} background images", images.len());

        track
            .notes
            .iter()
            .filter(|note| note.pitch == IMAGE_SWITCH)
            .filter_map(|note| track.text_for(note))
            .filter(|name| !images.contains_key(*name))
            .for_each(|name| warn!("Background `{name}` is cued but not present"));

        Ok(Self::new(track, images))
    }

    fn progress_of(&self, tick: f64, pitch: u8) -> Option<f64> {
        self.track
            .notes
            .active_at(tick)
            .find(|note| note.pitch == pitch)
            .map(|note| progress_within_event(note, tick))
    }

    pub fn scene(&self, tick: f64) -> Result<Option<Scene<'_>>, RenderError> {
        let notes = self.track.notes.as_slice();
        let Some(switch) = notes.active_at(tick).find(|note| note.pitch == IMAGE_SWITCH) else {
            return Ok(None);
        };

        let image = self
            .track
            .text_for(switch)
            .ok_or(RenderError::UnnamedBackground(switch.start_tick))?;

        let transition = notes
            .active_at(tick)
            .find(|note| note.pitch == SORT_IN || note.pitch == SORT_OUT)
            .map_or(Transition::Still, |note| {
                let progress = progress_within_event(note, tick);
                match note.pitch {
                    SORT_IN => Transition::SortIn(progress),
                    _ => Transition::SortOut(progress),
                }
            });

        let alpha = self
            .progress_of(tick, ALPHA_IN)
            .map_or(MAX_ALPHA, |progress| MAX_ALPHA * Easing::OutQuint.eval(progress));

        Ok(Some(Scene {
            image,
            transition,
            alpha,
        }))
    }
}

impl Renderer for Background {
    fn name(&self) -> &'static str {
        "background"
    }

    fn draw(&mut self, canvas: &mut Canvas, frame: &FrameContext) -> Result<(), RenderError> {
        let Some(Scene { image, transition, alpha }) = self.scene(frame.tick())? else {
            return Ok(());
        };

        let source = self
            .images
            .get(image)
            .ok_or_else(|| RenderError::MissingBackground(image.to_string()))?;

        let unit = frame.dot_unit() / SCALE_DOWN;
        self.work.clone_from(source);
        pixel_sort(&mut self.work, transition.threshold());
        pixelize(
            &self.work,
            &mut self.output,
            (unit * 2.).round() as u32,
            (frame.measure() * PI).sin() * unit as f64,
        );

        let size = canvas.size();
        canvas.upload(TEXTURE, self.output.clone());

        let mut canvas = canvas.scoped();
        canvas.tint(Rgba::WHITE.with_alpha(alpha));
        canvas.image(TEXTURE, Rect::from_corners(Vec2::ZERO, size), None);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        canvas::Shape,
        renderers::tests::*,
        score::{tests::*, Note, TextCue},
    };
    use pretty_assertions::assert_eq;

    fn background(notes: Vec<Note>, names: &[(u32, &str)]) -> Background {
        let texts = names
            .iter()
            .map(|&(tick, text)| TextCue { tick, text: text.into() })
            .collect();
        let image = PixelBuffer {
            width: 4,
            height: 2,
            data: (0..8u8).flat_map(|l| [l * 30, 0, 0, 255]).collect(),
        };
        Background::new(
            Track::new("backgrounds", notes, texts),
            [("city.png".to_string(), image)].into_iter().collect(),
        )
    }

    fn render(background: &mut Background, tick: f64) -> Result<Canvas, RenderError> {
        let score = Score::new(short_bars(), vec![]);
        let settings = Settings::default();
        let playback = playback_at_tick(tick, &score.tempo);
        let mut canvas = canvas();
        background.draw(&mut canvas, &frame_at(&score, &playback, &settings))?;
        Ok(canvas)
    }

    #[test]
    fn nothing_without_a_cue() {
        let tempo = short_bars();
        let mut background = background(vec![note(IMAGE_SWITCH, 480, 480, &tempo)], &[(480, "city.png")]);
        let mut canvas = render(&mut background, 0.).unwrap();
        assert!(canvas.shapes().is_empty());
        assert!(canvas.take_uploads().is_empty());
    }

    #[test]
    fn still_image_at_resting_alpha() {
        let tempo = short_bars();
        let mut background = background(vec![note(IMAGE_SWITCH, 0, 960, &tempo)], &[(0, "city.png")]);
        let scene = background.scene(0.).unwrap().unwrap();
        assert_eq!(
            scene,
            Scene { image: "city.png", transition: Transition::Still, alpha: MAX_ALPHA }
        );

        let mut canvas = render(&mut background, 0.).unwrap();
        assert_eq!(canvas.take_uploads().len(), 1);
        match &canvas.shapes()[0] {
            Shape::Image { texture, dest, tint, .. } => {
                assert_eq!(texture.0, TEXTURE);
                assert_eq!(*dest, Rect::new(0., 0., 1920., 1080.));
                assert_eq!(tint[3], 192);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn transitions_and_fade() {
        let tempo = short_bars();
        let background = background(
            vec![
                note(IMAGE_SWITCH, 0, 1920, &tempo),
                note(SORT_IN, 0, 480, &tempo),
                note(SORT_OUT, 960, 480, &tempo),
                note(ALPHA_IN, 0, 480, &tempo),
            ],
            &[(0, "city.png")],
        );

        let entering = background.scene(240.).unwrap().unwrap();
        assert_eq!(entering.transition, Transition::SortIn(0.5));
        assert_eq!(entering.transition.threshold(), 16.);
        assert_eq!(entering.alpha, 192. * (1. - 0.5f64.powi(5)));

        let settled = background.scene(600.).unwrap().unwrap();
        assert_eq!((settled.transition, settled.alpha), (Transition::Still, MAX_ALPHA));

        let leaving = background.scene(1080.).unwrap().unwrap();
        assert_eq!(leaving.transition, Transition::SortOut(0.25));
        assert_eq!(leaving.transition.threshold(), 512. * 0.75f64.powi(5));
    }

    #[test]
    fn thresholds_span_the_range() {
        assert_eq!(Transition::SortIn(0.).threshold(), 0.);
        assert_eq!(Transition::SortIn(1.).threshold(), MAX_THRESHOLD);
        assert_eq!(Transition::SortOut(0.).threshold(), MAX_THRESHOLD);
        assert_eq!(Transition::SortOut(1.).threshold(), 0.);
    }

    #[test]
    fn broken_cues_are_frame_errors() {
        let tempo = short_bars();
        let mut unnamed = background(vec![note(IMAGE_SWITCH, 0, 480, &tempo)], &[]);
        assert!(matches!(render(&mut unnamed, 0.), Err(RenderError::UnnamedBackground(0))));

        let mut missing = background(vec![note(IMAGE_SWITCH, 0, 480, &tempo)], &[(0, "sea.png")]);
        assert!(matches!(
            render(&mut missing, 0.),
            Err(RenderError::MissingBackground(name)) if name == "sea.png"
        ));
    }
}
