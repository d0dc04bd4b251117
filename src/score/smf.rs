use super::{Note, Score, TextCue, Track};
use crate::{error::ScoreError, timing::*};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::{HashMap, VecDeque};

struct RawNote {
    pitch: u8,
    start: u32,
    end: u32,
    velocity: f32,
}

#[derive(Default)]
struct RawTrack {
    name: Option<String>,
    notes: Vec<RawNote>,
    texts: Vec<TextCue>,
}

fn text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim().to_string()
}

impl Score {
    /// Reads a standard MIDI file. Tempo and meter events from every track go
    /// into one tempo map; note-on/note-off pairs become notes.
    pub fn from_smf(bytes: &[u8]) -> Result<Self, ScoreError> {
        let smf = Smf::parse(bytes)?;
        let ppq = match smf.header.timing {
            Timing::Metrical(ppq) => ppq.as_int(),
            Timing::Timecode(..) => return Err(ScoreError::UnsupportedTiming),
        };

        let mut tempos = vec![];
        let mut signatures = vec![];

        let raw_tracks = smf
            .tracks
            .iter()
            .map(|events| {
                let mut tick = 0u32;
                // Open notes per (channel, key), oldest first.
                let mut pending = HashMap::<(u8, u8), VecDeque<(u32, f32)>>::new();
                let mut raw = RawTrack::default();

                for event in events {
                    tick = tick.saturating_add(event.delta.as_int());
                    match event.kind {
                        TrackEventKind::Meta(MetaMessage::Tempo(micros)) => {
                            tempos.push(TempoChange {
                                tick,
                                bpm: 60_000_000. / micros.as_int().max(1) as f64,
                            })
                        }
                        TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, power, ..)) => {
                            signatures.push(TimeSignature {
                                tick,
                                numerator,
                                denominator: 1u8.checked_shl(power as u32).unwrap_or(4),
                            })
                        }
                        TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                            raw.name = Some(text(name))
                        }
                        TrackEventKind::Meta(MetaMessage::Text(cue) | MetaMessage::Lyric(cue)) => {
                            raw.texts.push(TextCue { tick, text: text(cue) })
                        }
                        TrackEventKind::Midi {
                            channel,
                            message: MidiMessage::NoteOn { key, vel },
                        } if 0 < vel.as_int() => {
                            pending
                                .entry((channel.as_int(), key.as_int()))
                                .or_default()
                                .push_back((tick, vel.as_int() as f32 / 127.));
                        }
                        TrackEventKind::Midi {
                            channel,
                            message: MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. },
                        } => {
                            // A release on the tick a note starts belongs to an
                            // earlier note of the same key.
                            if let Some((start, velocity)) = pending
                                .get_mut(&(channel.as_int(), key.as_int()))
                                .filter(|open| open.front().map_or(false, |&(start, _)| start < tick))
                                .and_then(|open| open.pop_front())
                            {
                                raw.notes.push(RawNote {
                                    pitch: key.as_int(),
                                    start,
                                    end: tick,
                                    velocity,
                                })
                            }
                        }
                        _ => {}
                    }
                }
                raw
            })
            .collect::<Vec<_>>();

        let tempo = TempoMap::new(ppq, tempos, signatures);
        let tracks = raw_tracks
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                Track::new(
                    raw.name.unwrap_or_else(|| format!("track {index}")),
                    raw.notes
                        .iter()
                        .filter(|note| note.start < note.end)
                        .map(|note| {
                            Note::new(note.pitch, note.start, note.end - note.start, note.velocity, &tempo)
                        })
                        .collect(),
                    raw.texts,
                )
            })
            .collect();

        Ok(Score::new(tempo, tracks))
    }
}
