use tap::Pipe;

pub const FRAME_RATE: f64 = 60.;
pub const DEFAULT_PPQ: u16 = 480;
pub const DEFAULT_BPM: f64 = 120.;

pub fn seconds_to_frame(seconds: f64) -> f64 {
    seconds * FRAME_RATE
}

pub fn frame_to_seconds(frame: f64) -> f64 {
    frame / FRAME_RATE
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoChange {
    pub tick: u32,
    pub bpm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub tick: u32,
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    fn ticks_per_measure(&self, ppq: u16) -> f64 {
        ppq as f64 * 4. * self.numerator as f64 / self.denominator as f64
    }
}

/// Start of a constant-tempo stretch, with the seconds elapsed before it.
#[derive(Debug, Clone, Copy)]
struct TempoSegment {
    tick: f64,
    seconds: f64,
    seconds_per_tick: f64,
}

/// Start of a constant-meter stretch, with the measures elapsed before it.
#[derive(Debug, Clone, Copy)]
struct MeterSegment {
    tick: f64,
    measures: f64,
    ticks_per_measure: f64,
}

/// Fixed mapping between score ticks, seconds and measures. Built once from the
/// tempo and time signature events of a score; every conversion is strictly
/// increasing.
#[derive(Debug, Clone)]
pub struct TempoMap {
    ppq: u16,
    tempos: Vec<TempoSegment>,
    meters: Vec<MeterSegment>,
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new(DEFAULT_PPQ, vec![], vec![])
    }
}

/// Keeps the last event per tick and guarantees one at tick zero.
#[rustfmt::skip]
fn normalize<T: Copy>(mut events: Vec<T>, tick: impl Fn(&T) -> u32, origin: T) -> Vec<T> {
    events.sort_by_key(|event| tick(event));
    events.reverse();
    events.dedup_by_key(|event| tick(event));
    events.reverse();

    match events.first() {
        Some(first) if tick(first) == 0 => events,
        _ => [origin].into_iter().chain(events).collect(),
    }
}

/// Index of the last segment starting at or before `value`, zero if none do.
fn segment_index<T>(segments: &[T], value: f64, key: impl Fn(&T) -> f64) -> usize {
    segments
        .partition_point(|segment| key(segment) <= value)
        .saturating_sub(1)
}

impl TempoMap {
    #[rustfmt::skip]
    pub fn new(ppq: u16, tempos: Vec<TempoChange>, signatures: Vec<TimeSignature>) -> Self {
        let ppq = ppq.max(1);

        let tempos = normalize(
            tempos.into_iter().filter(|change| 0. < change.bpm).collect(),
            |change| change.tick,
            TempoChange { tick: 0, bpm: DEFAULT_BPM },
        )
        .into_iter()
        .scan(None::<TempoSegment>, |prev, change| {
            let seconds = prev.map_or(0., |prev: TempoSegment| {
                prev.seconds + (change.tick as f64 - prev.tick) * prev.seconds_per_tick
            });
            let segment = TempoSegment {
                tick: change.tick as f64,
                seconds,
                seconds_per_tick: 60. / (change.bpm * ppq as f64),
            };
            *prev = Some(segment);
            Some(segment)
        })
        .collect();

        let meters = normalize(
            signatures
                .into_iter()
                .filter(|signature| 0 < signature.numerator && 0 < signature.denominator)
                .collect(),
            |signature| signature.tick,
            TimeSignature { tick: 0, numerator: 4, denominator: 4 },
        )
        .into_iter()
        .scan(None::<MeterSegment>, |prev, signature| {
            let measures = prev.map_or(0., |prev: MeterSegment| {
                prev.measures + (signature.tick as f64 - prev.tick) / prev.ticks_per_measure
            });
            let segment = MeterSegment {
                tick: signature.tick as f64,
                measures,
                ticks_per_measure: signature.ticks_per_measure(ppq),
            };
            *prev = Some(segment);
            Some(segment)
        })
        .collect();

        Self { ppq, tempos, meters }
    }

    pub fn ppq(&self) -> u16 {
        self.ppq
    }

    pub fn ticks_to_seconds(&self, tick: f64) -> f64 {
        self.tempos[segment_index(&self.tempos, tick, |s| s.tick)]
            .pipe(|s| s.seconds + (tick - s.tick) * s.seconds_per_tick)
    }

    pub fn seconds_to_ticks(&self, seconds: f64) -> f64 {
        self.tempos[segment_index(&self.tempos, seconds, |s| s.seconds)]
            .pipe(|s| s.tick + (seconds - s.seconds) / s.seconds_per_tick)
    }

    pub fn ticks_to_measures(&self, tick: f64) -> f64 {
        self.meters[segment_index(&self.meters, tick, |s| s.tick)]
            .pipe(|s| s.measures + (tick - s.tick) / s.ticks_per_measure)
    }

    pub fn measures_to_ticks(&self, measures: f64) -> f64 {
        self.meters[segment_index(&self.meters, measures, |s| s.measures)]
            .pipe(|s| s.tick + (measures - s.measures) * s.ticks_per_measure)
    }

    /// Measures shifted by whole bars, snapped back onto the tick grid.
    pub fn shift_measures(&self, tick: u32, measures: f64) -> Option<u32> {
        (self.ticks_to_measures(tick as f64) + measures)
            .pipe(|target| self.measures_to_ticks(target).round())
            .pipe(|shifted| (0. <= shifted && shifted <= u32::MAX as f64).then(|| shifted as u32))
    }
}
