use super::*;
use crate::{
    canvas::{raster::rasterize, PixelBuffer, Rgba},
    drum::{DrumKit, Instrument},
    easing::{clip, Easing},
    error::ScoreError,
    progress::*,
    score::{Direction, EventQuery, Note, Track},
};
use bevy::math::Rect;
use itertools::Itertools;
use noisy_float::prelude::*;
use tinyvec::TinyVec;

/// Chord-track notes at or below this pitch are bass and stay off the face.
const CHORD_THRESHOLD: u8 = 53;
/// Beats after which a chord change has fully settled.
const CHORD_SETTLE_BEATS: f64 = 4.;
const TEXTURE: &str = "clock";

type Degrees = TinyVec<[f64; 8]>;

/// Circular drum clock with the current chord drawn as a polygon inside it.
/// Drawn into its own layer at one pixel per dot; erasing cuts into that
/// layer only.
pub struct Clock {
    face: Face,
    layer: Canvas,
    pixels: PixelBuffer,
}

struct Face {
    kits: Vec<(DrumKit, Track)>,
    chords: Track,
}

impl Clock {
    pub fn new(settings: &Settings, score: &Score) -> Result<Self, ScoreError> {
        let kits = settings
            .drums
            .iter()
            .map(|definition| {
                let kit = DrumKit::new(definition)?;
                let track = score.track(kit.track())?.clone();
                kit.validate(&track)?;
                Ok((kit, track))
            })
            .collect::<Result<Vec<_>, ScoreError>>()?;

        let dots = settings.size() / settings.dot_unit;
        Ok(Self {
            face: Face {
                kits,
                chords: score.track(&settings.tracks.chords)?.clone(),
            },
            layer: Canvas::new(dots),
            pixels: PixelBuffer::new(dots.x as u32, dots.y as u32),
        })
    }
}

/// Hits in the bar under the hand and the one before it.
fn recent_hits(track: &Track, measure: f64) -> &[Note] {
    let bar = measure.floor();
    let from = track.notes.partition_point(|note| note.start_measure.floor() < bar - 1.);
    let to = track.notes.partition_point(|note| note.start_measure.floor() <= bar);
    &track.notes[from..to.max(from)]
}

/// Pops to 1.5 on the beat and settles back to 1 within a quarter bar.
/// `idle` is the size before the hit lands.
fn swell(passed: f64, idle: f64) -> f64 {
    if 0. < passed {
        1.5 - Easing::OutQuint.eval_clipped(passed * 4.) / 2.
    } else {
        idle
    }
}

struct Hit {
    instrument: Instrument,
    at: f64,
    passed: f64,
    post: f64,
    sustained: bool,
}

impl Hit {
    #[rustfmt::skip]
    fn draw(&self, canvas: &mut Canvas, size: f32, unit: f32) {
        let point = |radius: f32| clock_point(self.at, radius);
        let fade = 1. - clip(self.post * 4.);
        let mut canvas = canvas.scoped();

        match self.instrument {
            Instrument::Kick if !self.sustained => {
                let factor = (swell(self.passed, 0.8) * fade) as f32;
                canvas.fill(Rgba::WHITE);
                canvas.stroke(Rgba::WHITE);
                canvas.stroke_weight(unit);
                canvas.circle(point(size), unit * 8. * factor);
            }
            Instrument::Snare if !self.sustained => {
                let factor = swell(self.passed, 0.9) as f32;
                canvas.fill(Rgba::WHITE);
                canvas.stroke_weight(0.);
                canvas.erase();
                canvas.circle(point(size), unit * 8. * factor * fade as f32);

                canvas.no_erase();
                canvas.stroke(Rgba::WHITE);
                canvas.no_fill();
                canvas.stroke_weight(unit * 1.5 * fade as f32);
                canvas.circle(point(size), unit * 8. * factor);
            }
            Instrument::Hihat => {
                let reach = unit * 8. * swell(self.passed, 0.) as f32;
                canvas.no_fill();
                canvas.stroke(Rgba::gray(255, 255. * fade));
                canvas.stroke_weight(unit);
                canvas.line(point(size - reach), point(size + reach));
            }
            Instrument::Clap if 0. < self.passed => {
                let factor = swell(self.passed, 0.) as f32;
                canvas.fill(Rgba::WHITE);
                canvas.no_stroke();
                canvas.circle(
                    point(size + unit * 12. * factor),
                    unit * 4. * (1. - Easing::OutQuint.eval_clipped(self.post * 2.)) as f32,
                );
            }
            Instrument::Dial => {
                canvas.no_fill();
                canvas.stroke(Rgba::gray(255, 255. * (1. - clip(self.passed))));
                canvas.stroke_weight(unit * 2.);
                [(-16., -12.), (12., 16.)].into_iter().for_each(|(inner, outer)| {
                    canvas.line(point(size + unit * inner), point(size + unit * outer));
                });
            }
            Instrument::Star => {
                canvas.no_fill();
                canvas.stroke(Rgba::gray(255, 255. * (1. - clip(self.passed))));
                canvas.stroke_weight(unit * 2.);
                canvas.circle(point(size), unit * 16.);
            }
            _ => {}
        }
    }
}

fn draw_drums(canvas: &mut Canvas, kit: &DrumKit, track: &Track, frame: &FrameContext, size: f32) {
    let measure = frame.measure();
    let window = recent_hits(track, measure);

    window
        .iter()
        .filter_map(|note| kit.instrument(note.pitch).map(|instrument| (instrument, note)))
        .sorted_by_key(|(instrument, _)| instrument.draw_order())
        .map(|(instrument, note)| Hit {
            instrument,
            at: note.start_measure,
            passed: passed_measures(note, measure),
            post: post_exit_progress(note, measure),
            sustained: window
                .find_adjacent(note, Direction::Next, &frame.score.tempo)
                .is_some(),
        })
        .for_each(|hit| hit.draw(canvas, size, frame.dot_unit()));
}

fn chord_degrees<'a>(notes: impl Iterator<Item = &'a Note>) -> Degrees {
    notes
        .filter(|note| CHORD_THRESHOLD < note.pitch)
        .map(|note| r64(note.degree()))
        .sorted()
        .dedup()
        .map(R64::raw)
        .collect()
}

/// The sounding chord as sorted pitch-class degrees, morphing out of the
/// chord it directly follows.
#[derive(Debug, Clone, PartialEq)]
struct ChordShape {
    from: Degrees,
    to: Degrees,
    progress: f64,
    scale: f64,
}

impl ChordShape {
    fn at(track: &Track, tick: f64, ppq: u16) -> Option<Self> {
        let notes = track.notes.as_slice();
        let lowest = notes
            .active_at(tick)
            .filter(|note| CHORD_THRESHOLD < note.pitch)
            .min_by_key(|note| note.pitch)?;

        let previous = notes.find_preceding_abutting(lowest);
        let window = (lowest.duration_ticks as f64).min(ppq as f64 * CHORD_SETTLE_BEATS);
        let progress = progress_within_ticks(lowest, tick, window);

        Some(Self {
            from: previous.map_or_else(Degrees::default, |previous| {
                chord_degrees(notes.active_at(previous.start_tick as f64))
            }),
            to: chord_degrees(notes.active_at(tick)),
            progress,
            scale: match previous {
                Some(_) => 1.,
                None => Easing::OutQuint.eval_clipped(progress * 2.),
            },
        })
    }

    /// Degree `index` part way through the morph. Degrees the previous chord
    /// lacks start where they end.
    fn degree(&self, index: usize) -> f64 {
        let to = self.to[index];
        let from = self.from.get(index).copied().unwrap_or(to);
        lerp_with_loop(from, to, Easing::OutQuint.eval_clipped(self.progress))
    }

    fn draw(&self, canvas: &mut Canvas, size: f32, unit: f32) {
        let mut canvas = canvas.scoped();
        let radius = size * self.scale as f32;

        (0..self.to.len()).tuple_combinations().for_each(|(l, r)| {
            let adjacent = r - l == 1;
            canvas.stroke(Rgba::gray(255, (if adjacent { 255. } else { 160. }) * self.scale));
            canvas.stroke_weight(if adjacent { unit * 1.5 } else { unit * 0.75 });
            canvas.line(
                clock_point(self.degree(l), radius),
                clock_point(self.degree(r), radius),
            );
        });
    }
}

impl Face {
    /// Records the face in screen units.
    fn record(&self, canvas: &mut Canvas, frame: &FrameContext) {
        let unit = frame.dot_unit();
        let screen = frame.settings.size();
        let size = screen.y * 0.3;
        let mut face = canvas.scoped();

        face.translate(Vec2::new(screen.x / 2., screen.y * 0.4));
        face.no_fill();
        face.stroke(Rgba::WHITE);
        face.stroke_weight(unit * 2.);
        face.circle(Vec2::ZERO, size * 2.);
        face.line(Vec2::ZERO, clock_point(frame.measure(), size));

        self.kits
            .iter()
            .for_each(|(kit, track)| draw_drums(&mut face, kit, track, frame, size));

        if let Some(chord) = ChordShape::at(&self.chords, frame.tick(), frame.score.tempo.ppq()) {
            chord.draw(&mut face, size, unit);
        }
    }
}

impl Renderer for Clock {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn draw(&mut self, canvas: &mut Canvas, frame: &FrameContext) -> Result<(), RenderError> {
        self.layer.reset();
        {
            let mut dots = self.layer.scoped();
            dots.scale(Vec2::splat(1. / frame.dot_unit()));
            self.face.record(&mut dots, frame);
        }
        rasterize(self.layer.shapes(), &mut self.pixels);

        let size = canvas.size();
        canvas.upload(TEXTURE, self.pixels.clone());
        canvas.image(TEXTURE, Rect::from_corners(Vec2::ZERO, size), None);

        Ok(())
    }
}
