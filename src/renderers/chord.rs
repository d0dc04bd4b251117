use super::*;
use crate::{
    canvas::{present::TextureRegistry, PixelBuffer, Rgba, TextureKey},
    easing::Easing,
    error::Error,
    progress::*,
    score::{EventQuery, Track},
    utils::*,
};
use bevy::math::Rect;

const BASE_PITCH: i32 = 60;

const DEST_WIDTH: f32 = 682.;
const PART_WIDTH: f32 = 236.;
const LEFT_PADDING: f32 = 86.;
const IMAGE_LEFT_PADDING: f32 = 44.;
const IMAGE_TOP_PADDING: f32 = 110.;
const IMAGE_PART_WIDTH: f32 = 124.;
const ROW_HEIGHT: f32 = 160.;
const LINE_HEIGHT: f32 = 80.;

const ANIMATION_WIDTH: f32 = 4.;
const ANIMATION_SECONDS: f64 = 0.5;

/// Chord name strip along the bottom edge with a cursor sweeping through the
/// current cell.
pub struct ChordTicker {
    track: Track,
    sheet: TextureKey,
    sheet_size: Vec2,
}

impl ChordTicker {
    pub fn new(track: Track, sheet: TextureKey, sheet_size: Vec2) -> Self {
        Self {
            track,
            sheet,
            sheet_size,
        }
    }

    pub fn load(
        settings: &Settings,
        score: &Score,
        registry: &mut TextureRegistry,
    ) -> Result<Self, Error> {
        let track = score.track(&settings.tracks.chord_names)?.clone();
        let file = &settings.assets.chord_sheet;
        let sheet = load_image(&settings.assets.resolve(file)).map(PixelBuffer::from_image)?;
        let size = sheet.size();

        registry.queue(file.as_str(), sheet);
        Ok(Self::new(track, file.as_str().into(), size))
    }

    /// Sheet rows are addressed from the top padding; a glyph must fit whole.
    fn glyph_row(&self, index: i32) -> Result<f32, RenderError> {
        let top = ROW_HEIGHT * index as f32 + IMAGE_TOP_PADDING;
        (0 <= index && top + ROW_HEIGHT <= self.sheet_size.y)
            .then_some(top)
            .ok_or(RenderError::GlyphOutOfRange(index))
    }
}

/// Cursor position for a cell. Half cells sweep the middle part; full cells
/// cover the left part in their first half and the right part in the second.
fn cursor_x(width: f32, half: bool, progress: f64) -> f32 {
    let center = width / 2.;
    let base = center - DEST_WIDTH / 2.;

    match (half, progress < 0.5) {
        (true, _) => (center - PART_WIDTH / 2.).lerp(&(center + PART_WIDTH / 2.), progress),
        (false, true) => map_range(
            progress,
            (0., 0.5),
            ((base + LEFT_PADDING) as f64, (base + PART_WIDTH + LEFT_PADDING) as f64),
        ) as f32,
        (false, false) => map_range(
            progress,
            (0.5, 1.),
            (
                (base + DEST_WIDTH - PART_WIDTH - LEFT_PADDING) as f64,
                (base + DEST_WIDTH - LEFT_PADDING) as f64,
            ),
        ) as f32,
    }
}

impl Renderer for ChordTicker {
    fn name(&self) -> &'static str {
        "chord"
    }

    fn draw(&mut self, canvas: &mut Canvas, frame: &FrameContext) -> Result<(), RenderError> {
        let Some(chord) = self.track.notes.find_active(frame.tick(), |_| true) else {
            return Ok(());
        };

        let index = chord.pitch as i32 - BASE_PITCH;
        if index == -1 {
            return Ok(());
        }
        let row = self.glyph_row(index)?;

        let unit = frame.dot_unit();
        let (width, height) = (canvas.width(), canvas.height());
        let padding = unit * 20.;
        let half = chord.is_half();
        let mut canvas = canvas.scoped();

        let x = cursor_x(width, half, progress_within_event(chord, frame.tick()));
        let line_y = height - padding - LINE_HEIGHT / 2.;
        canvas.stroke(Rgba::gray(255, 128.));
        canvas.stroke_weight(unit / 2.);
        canvas.no_fill();
        canvas.line(Vec2::new(x, line_y), Vec2::new(x, line_y + LINE_HEIGHT));

        let entrance = match self.track.notes.find_preceding_abutting(chord) {
            Some(_) => 1.,
            None => progress_within_window(chord, frame.playback.time(), ANIMATION_SECONDS),
        };
        let eased = Easing::OutQuint.eval(entrance);
        let nudge = ANIMATION_WIDTH * (1. - eased as f32);

        let rate = self.sheet_size.x / DEST_WIDTH;
        let top = height - padding - ROW_HEIGHT / rate + IMAGE_TOP_PADDING + unit * 2.;
        let (left, dest_width, src) = match half {
            true => (
                width / 2. - PART_WIDTH / 2.,
                PART_WIDTH,
                Rect::new(IMAGE_LEFT_PADDING, row, IMAGE_LEFT_PADDING + IMAGE_PART_WIDTH, row + ROW_HEIGHT),
            ),
            false => (
                width / 2. - DEST_WIDTH / 2.,
                DEST_WIDTH,
                Rect::new(0., row, self.sheet_size.x, row + ROW_HEIGHT),
            ),
        };

        canvas.tint(Rgba::WHITE.with_alpha(255. * eased));
        canvas.image(
            self.sheet.clone(),
            Rect::new(left - nudge, top, left - nudge + dest_width, top + ROW_HEIGHT / rate),
            Some(src),
        );

        Ok(())
    }
}
