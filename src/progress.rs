use crate::{easing::clip, score::Note, utils::*};

/// Where a query time falls relative to a note and its animation windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationPhase {
    NotYetActive,
    Entering,
    Holding,
    Exiting,
    Past,
}

impl AnimationPhase {
    /// `enter` and `exit` are window lengths in ticks at the head and tail of
    /// the note. A note shorter than both windows is entering until its
    /// midpoint.
    #[rustfmt::skip]
    pub fn of(note: &Note, tick: f64, enter: f64, exit: f64) -> Self {
        let (start, end) = (note.start_tick as f64, note.end_tick() as f64);
        let entered = (start + enter).min((start + end) / 2.);

        match tick {
            tick if tick < start => Self::NotYetActive,
            tick if end <= tick => Self::Past,
            tick if tick < entered => Self::Entering,
            tick if end - exit <= tick => Self::Exiting,
            _ => Self::Holding,
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Entering | Self::Holding | Self::Exiting)
    }
}

/// How far `tick` is through the note itself.
pub fn progress_within_event(note: &Note, tick: f64) -> f64 {
    clip(tick.completion_ratio(note.start_tick as f64, note.end_tick() as f64))
}

/// How far `tick` is through a window of `window_ticks` starting at the note.
pub fn progress_within_ticks(note: &Note, tick: f64, window_ticks: f64) -> f64 {
    clip(tick.completion_ratio(note.start_tick as f64, note.start_tick as f64 + window_ticks))
}

/// How far `seconds` is through a fixed-length window starting at the note,
/// regardless of the note's own length.
pub fn progress_within_window(note: &Note, seconds: f64, window_seconds: f64) -> f64 {
    clip(seconds.completion_ratio(note.start_seconds, note.start_seconds + window_seconds))
}

/// Unclamped measures elapsed since the note started, negative before it.
pub fn passed_measures(note: &Note, measure: f64) -> f64 {
    measure - note.start_measure
}

/// How far playback is past the bar line following the note.
pub fn post_exit_progress(note: &Note, measure: f64) -> f64 {
    clip(measure - (note.start_measure + 1.).floor())
}

/// Interpolation in a cyclic domain of period one, taking the shorter way
/// around.
pub fn lerp_with_loop(a: f64, b: f64, t: f64) -> f64 {
    if (a - b).abs() < 0.5 {
        a.lerp(&b, t)
    } else if a < b {
        a.lerp(&(b - 1.), t) + 1.
    } else {
        a.lerp(&(b + 1.), t) - 1.
    }
}
