use super::{atlas::*, *};
use crate::{
    canvas::{present::TextureRegistry, PixelBuffer, Rgba, TextureKey},
    error::Error,
    score::{EventQuery, Note, Track},
};
use bevy::math::Rect;
use itertools::Itertools;

const BRIDGE_CUE: u8 = 48;
const CHARACTER_X: f32 = 100.;
const GROUND: f32 = 20.;
const SHADOW: Rgba = Rgba([213, 199, 209, 255]);

struct Character {
    name: &'static str,
    base: u8,
    side: f32,
}

const CHARACTERS: [Character; 2] = [
    Character { name: "rei", base: 60, side: -1. },
    Character { name: "tyc", base: 72, side: 1. },
];

#[derive(Debug, Clone, Copy, PartialEq)]
struct Pose {
    bob: f32,
    eyes_open: bool,
}

impl Character {
    /// A note on the base pitch or the one above it brings the character on;
    /// the base pitch itself drops the upper body by a pixel. Base + 4 closes
    /// the eyes.
    fn pose(&self, notes: &[Note], tick: f64) -> Option<Pose> {
        let base = self.base;
        let note = notes
            .active_at(tick)
            .find(|note| (base..base + 2).contains(&note.pitch))?;

        Some(Pose {
            bob: if note.pitch == base { 1. } else { 0. },
            eyes_open: notes.active_at(tick).all(|note| note.pitch != base + 4),
        })
    }

    fn regions(&self) -> [String; 4] {
        let name = self.name;
        [
            name.to_string(),
            format!("{name}_eyes_open"),
            format!("{name}_eyes_closed"),
            format!("{name}_mouth_n"),
        ]
    }
}

/// Two characters on a bridge, mirrored into a tinted reflection below it.
pub struct Bridge {
    track: Track,
    atlas: Atlas,
    sheet: TextureKey,
}

impl Bridge {
    pub fn new(track: Track, atlas: Atlas, sheet: TextureKey) -> Result<Self, AssetError> {
        let regions = ["bridge".to_string(), "bridge_shadow".to_string()]
            .into_iter()
            .chain(CHARACTERS.iter().flat_map(Character::regions))
            .collect_vec();
        atlas.require(regions.iter().map(String::as_str))?;

        Ok(Self {
            track,
            atlas,
            sheet,
        })
    }

    pub fn load(
        settings: &Settings,
        score: &Score,
        registry: &mut TextureRegistry,
    ) -> Result<Self, Error> {
        let assets = &settings.assets;
        let track = score.track(&settings.tracks.bridge)?.clone();
        let atlas = Atlas::load(&assets.resolve(&assets.atlas))?;
        let sheet = load_image(&assets.resolve(&assets.illustration)).map(PixelBuffer::from_image)?;

        registry.queue(assets.illustration.as_str(), sheet);
        Ok(Self::new(track, atlas, assets.illustration.as_str().into())?)
    }

    fn blit(&self, canvas: &mut Canvas, at: Vec2, src: Rect) {
        canvas.image(
            self.sheet.clone(),
            Rect::from_corners(at, at + src.size()),
            Some(src),
        );
    }

    /// Draws a character standing on the origin. The feet stay put while the
    /// rest of the body bobs.
    fn draw_character(
        &self,
        canvas: &mut Canvas,
        character: &Character,
        pose: Pose,
    ) -> Result<(), RenderError> {
        let name = character.name;
        let body = self.atlas.region(name)?;
        let foot = self.atlas.anchor(name, Anchor::Foot)?.y;
        let eyes_at = self.atlas.anchor(name, Anchor::Eyes)?;
        let mouth_at = self.atlas.anchor(name, Anchor::Mouth)?;
        let eyes = self.atlas.region(&format!(
            "{name}_eyes_{}",
            if pose.eyes_open { "open" } else { "closed" }
        ))?;
        let mouth = self.atlas.region(&format!("{name}_mouth_n"))?;

        let corner = Vec2::new(-body.width / 2., -body.height);
        let bobbed = corner + Vec2::new(0., pose.bob);
        let origin = body.origin();

        self.blit(
            canvas,
            corner + Vec2::new(0., foot),
            Rect::new(origin.x, origin.y + foot, origin.x + body.width, origin.y + body.height),
        );
        self.blit(
            canvas,
            bobbed,
            Rect::new(origin.x, origin.y, origin.x + body.width, origin.y + foot),
        );
        self.blit(canvas, bobbed + eyes_at, eyes.rect());
        self.blit(canvas, bobbed + mouth_at, mouth.rect());

        Ok(())
    }

    fn draw_cast(&self, canvas: &mut Canvas, tick: f64, origin: Vec2, mirrored: bool) -> Result<(), RenderError> {
        CHARACTERS.iter().try_for_each(|character| {
            let Some(pose) = character.pose(&self.track.notes, tick) else {
                return Ok(());
            };

            let mut canvas = canvas.scoped();
            canvas.translate(origin + Vec2::new(character.side * CHARACTER_X, 0.));
            if mirrored {
                canvas.scale(Vec2::new(1., -1.));
            }
            self.draw_character(&mut canvas, character, pose)
        })
    }
}

impl Renderer for Bridge {
    fn name(&self) -> &'static str {
        "bridge"
    }

    fn draw(&mut self, canvas: &mut Canvas, frame: &FrameContext) -> Result<(), RenderError> {
        let tick = frame.tick();
        if self.track.notes.find_active(tick, |note| note.pitch == BRIDGE_CUE).is_none() {
            return Ok(());
        }

        let unit = frame.dot_unit();
        let (width, height) = (canvas.width() / unit, canvas.height() / unit);
        let mut canvas = canvas.scoped();
        canvas.scale(Vec2::splat(unit));

        let bridge = self.atlas.region("bridge")?;
        let shadow = self.atlas.region("bridge_shadow")?;
        let deck = height - (bridge.height - GROUND);
        let waterline = bridge
            .marker(0)
            .ok_or_else(|| RenderError::MissingRegion("bridge waterline".into()))?
            .y;
        let feet = Vec2::new(width / 2., height - GROUND);

        self.blit(&mut canvas, Vec2::new(0., deck), bridge.rect());
        {
            let mut reflection = canvas.scoped();
            reflection.tint(SHADOW);
            self.blit(&mut reflection, Vec2::new(0., deck + waterline), shadow.rect());
            self.draw_cast(&mut reflection, tick, feet, true)?;
        }
        self.draw_cast(&mut canvas, tick, feet, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        canvas::Shape,
        renderers::{atlas::tests::SHEET, tests::*},
        score::tests::*,
    };
    use pretty_assertions::assert_eq;

    fn bridge(notes: Vec<Note>) -> Bridge {
        Bridge::new(
            Track::new("bridge", notes, vec![]),
            Atlas::from_json(SHEET).unwrap(),
            "illusts/main.png".into(),
        )
        .unwrap()
    }

    fn images(bridge: &mut Bridge, tick: f64) -> Vec<(Rect, Rect, bool, Rgba)> {
        let score = Score::new(short_bars(), vec![]);
        let settings = Settings::default();
        let playback = playback_at_tick(tick, &score.tempo);
        let mut canvas = canvas();
        bridge
            .draw(&mut canvas, &frame_at(&score, &playback, &settings))
            .unwrap();
        assert_eq!(canvas.depth(), 0);

        canvas
            .shapes()
            .iter()
            .map(|shape| match shape {
                Shape::Image { dest, src: Some(src), flip_y, tint, .. } => (*dest, *src, *flip_y, *tint),
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    #[test]
    fn hidden_without_cue() {
        let tempo = short_bars();
        let mut bridge = bridge(vec![note(60, 0, 480, &tempo)]);
        assert!(images(&mut bridge, 10.).is_empty());
    }

    #[test]
    fn empty_bridge() {
        let tempo = short_bars();
        let mut bridge = bridge(vec![note(BRIDGE_CUE, 0, 480, &tempo)]);
        let drawn = images(&mut bridge, 10.);

        assert_eq!(drawn.len(), 2);
        // 60 px tall bridge sunk 20 px below a 270 px tall quarter canvas.
        assert_eq!(drawn[0].0, Rect::new(0., 920., 1920., 1160.));
        assert_eq!(drawn[1].0.min.y, 960.);
        assert_eq!(drawn[1].3, SHADOW);
    }

    #[test]
    fn characters_bob_and_reflect() {
        let tempo = short_bars();
        let mut bridge = bridge(vec![
            note(BRIDGE_CUE, 0, 480, &tempo),
            note(60, 0, 480, &tempo),
            note(73, 0, 480, &tempo),
        ]);
        let drawn = images(&mut bridge, 10.);
        assert_eq!(drawn.len(), 2 + 8 + 8);

        let (reflected, upright) = (&drawn[2..10], &drawn[10..]);
        assert!(reflected.iter().all(|(_, _, flip_y, tint)| *flip_y && *tint == SHADOW));
        assert!(upright.iter().all(|(_, _, flip_y, tint)| !*flip_y && *tint == Rgba::WHITE));

        // rei stands at x 140, y 250 on the quarter canvas.
        let (rei_feet, rei_body) = (upright[0].0, upright[1].0);
        assert_eq!(rei_feet.min, Vec2::new(520., 984.));
        assert_eq!(rei_body.min, Vec2::new(520., 844.));

        // tyc is on its second pitch and does not bob.
        let (tyc_feet, tyc_body) = (upright[4].0, upright[5].0);
        assert_eq!(tyc_body.min.y, tyc_feet.min.y - 36. * 4.);
    }

    #[test]
    fn eyes_close_on_cue() {
        let tempo = short_bars();
        let mut bridge = bridge(vec![
            note(BRIDGE_CUE, 0, 480, &tempo),
            note(61, 0, 480, &tempo),
            note(64, 0, 480, &tempo),
        ]);
        let drawn = images(&mut bridge, 10.);
        assert_eq!(drawn.len(), 2 + 4 + 4);
        assert_eq!(drawn[8].1, Rect::new(70., 4., 76., 6.));
    }

    #[test]
    fn incomplete_atlas_is_rejected() {
        let atlas = Atlas::from_json(r#"{ "bridge": { "start": [0, 0], "width": 1, "height": 1 } }"#).unwrap();
        assert!(matches!(
            Bridge::new(Track::new("bridge", vec![], vec![]), atlas, "sheet".into()),
            Err(AssetError::MissingRegion(name)) if name == "bridge_shadow"
        ));
    }
}
