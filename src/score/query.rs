use super::Note;
use crate::timing::TempoMap;
use std::slice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

impl Direction {
    fn measures(self) -> f64 {
        match self {
            Direction::Previous => -1.,
            Direction::Next => 1.,
        }
    }
}

/// Notes scheduled at a tick, in sequence order. Stops scanning at the first
/// note starting after the tick.
pub struct Active<'a> {
    notes: slice::Iter<'a, Note>,
    tick: f64,
}

impl<'a> Iterator for Active<'a> {
    type Item = &'a Note;

    fn next(&mut self) -> Option<Self::Item> {
        let tick = self.tick;
        self.notes
            .by_ref()
            .take_while(|note| note.start_tick as f64 <= tick)
            .find(|note| note.scheduled_at(tick))
    }
}

/// Lookups over a sequence of notes ordered by start tick.
pub trait EventQuery {
    fn active_at(&self, tick: f64) -> Active<'_>;

    /// Last note scheduled at `tick` matching `filter`.
    fn find_active(&self, tick: f64, filter: impl Fn(&Note) -> bool) -> Option<&Note>;

    /// Note of the same pitch exactly one measure before or after `note`.
    fn find_adjacent(&self, note: &Note, direction: Direction, tempo: &TempoMap) -> Option<&Note>;

    /// Last note ending exactly where `note` starts, of any pitch.
    fn find_preceding_abutting(&self, note: &Note) -> Option<&Note>;
}

impl EventQuery for [Note] {
    fn active_at(&self, tick: f64) -> Active<'_> {
        Active {
            notes: self.iter(),
            tick,
        }
    }

    fn find_active(&self, tick: f64, filter: impl Fn(&Note) -> bool) -> Option<&Note> {
        self.active_at(tick).filter(|note| filter(note)).last()
    }

    #[rustfmt::skip]
    fn find_adjacent(&self, note: &Note, direction: Direction, tempo: &TempoMap) -> Option<&Note> {
        let target = tempo.shift_measures(note.start_tick, direction.measures())?;
        let start = self.partition_point(|other| other.start_tick < target);

        self[start..]
            .iter()
            .take_while(|other| other.start_tick == target)
            .find(|other| other.pitch == note.pitch)
    }

    fn find_preceding_abutting(&self, note: &Note) -> Option<&Note> {
        self[..self.partition_point(|other| other.start_tick < note.start_tick)]
            .iter()
            .rev()
            .find(|other| other.end_tick() == note.start_tick)
    }
}
