use crate::timing::*;
use bevy::prelude::*;
use tap::Tap;

/// The shared playback clock. Written once per frame by the transport
/// systems, read by every renderer.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackState {
    current_frame: f64,
    current_time: f64,
    current_tick: f64,
    current_measure: f64,
    pub playing: bool,
}

impl PlaybackState {
    pub fn at_frame(frame: f64, tempo: &TempoMap) -> Self {
        Self::default().tap_mut(|state| state.set_frame(frame, tempo))
    }

    /// Moves the clock, clamping at the start of the piece.
    pub fn set_frame(&mut self, frame: f64, tempo: &TempoMap) {
        let frame = frame.max(0.);
        let seconds = frame_to_seconds(frame);
        let tick = tempo.seconds_to_ticks(seconds);

        self.current_frame = frame;
        self.current_time = seconds;
        self.current_tick = tick;
        self.current_measure = tempo.ticks_to_measures(tick);
    }

    pub fn seek(&mut self, seconds: f64, tempo: &TempoMap) {
        self.set_frame(self.current_frame + seconds_to_frame(seconds), tempo)
    }

    pub fn frame(&self) -> f64 {
        self.current_frame
    }

    pub fn time(&self) -> f64 {
        self.current_time
    }

    pub fn tick(&self) -> f64 {
        self.current_tick
    }

    pub fn measure(&self) -> f64 {
        self.current_measure
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportCommand {
    TogglePlay,
    /// Relative seek in seconds.
    Seek(f64),
    /// Relative volume change.
    Volume(f64),
}
