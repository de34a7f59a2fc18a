use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extractor::RawNoteEvent;
use crate::keymap::KeyPress;
use crate::midi_event::{EventKind, MidiSong};

// microseconds per second
const MICROS_PER_SEC: f64 = 1_000_000.0;
pub const DEFAULT_BPM: f64 = 120.0;
pub const DEFAULT_MICROS_PER_QUARTER: u32 = 500_000;

/// Fixed tempo used to turn ticks into wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tempo {
    pub ticks_per_quarter: u16,
    pub micros_per_quarter: u32,
}

impl Tempo {
    pub fn new(ticks_per_quarter: u16, micros_per_quarter: u32) -> Self {
        Self {
            ticks_per_quarter: ticks_per_quarter.max(1),
            micros_per_quarter,
        }
    }

    /// Uses the earliest tempo meta event in the song, or 120 BPM without one.
    ///
    /// Later tempo changes are ignored.
    pub fn resolve(song: &MidiSong) -> Self {
        let mut first: Option<(u64, u32)> = None;
        for (track_index, track) in song.tracks.iter().enumerate() {
            let mut ticks: u64 = 0;
            for event in &track.events {
                ticks += u64::from(event.delta_time);
                if let EventKind::Tempo(micros) = event.kind {
                    match first {
                        Some((at, _)) if at <= ticks => {
                            debug!(
                                track = track_index,
                                ticks, "ignoring tempo change to {:.2} BPM", bpm(micros)
                            );
                        }
                        _ => first = Some((ticks, micros)),
                    }
                }
            }
        }

        let micros_per_quarter = match first {
            Some((_, micros)) if micros > 0 => micros,
            _ => {
                debug!("no tempo event, assuming {} BPM", DEFAULT_BPM);
                DEFAULT_MICROS_PER_QUARTER
            }
        };
        Self::new(song.ticks_per_quarter, micros_per_quarter)
    }

    pub fn bpm(&self) -> f64 {
        bpm(self.micros_per_quarter)
    }

    pub fn ticks_to_seconds(&self, ticks: u64) -> f64 {
        // MIDI tempo is in microseconds per quarter note
        let tempo_in_secs = self.micros_per_quarter as f64 / MICROS_PER_SEC;
        let beats = ticks as f64 / self.ticks_per_quarter.max(1) as f64;
        beats * tempo_in_secs
    }

    /// Exact to the nanosecond, so running totals never drift.
    pub fn ticks_to_duration(&self, ticks: u64) -> Duration {
        let nanos = u128::from(ticks) * u128::from(self.micros_per_quarter) * 1_000
            / u128::from(self.ticks_per_quarter.max(1));
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

fn bpm(micros_per_quarter: u32) -> f64 {
    MICROS_PER_SEC / micros_per_quarter as f64 * 60.0
}

/// A note that survived reduction, with its delay from the previous survivor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReducedNoteEvent {
    pub raw: RawNoteEvent,
    pub delta_time: u64,
    pub press: Option<KeyPress>,
}

impl ReducedNoteEvent {
    pub fn new(raw: RawNoteEvent, press: Option<KeyPress>) -> Self {
        Self {
            raw,
            delta_time: 0,
            press,
        }
    }
}

/// The unit the scheduler consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyAction {
    pub delta_ticks: u64,
    #[serde(default)]
    pub press: Option<KeyPress>,
}

impl From<&ReducedNoteEvent> for KeyAction {
    fn from(event: &ReducedNoteEvent) -> Self {
        Self {
            delta_ticks: event.delta_time,
            press: event.press,
        }
    }
}

/// Rewrite delays from absolute times: the first note waits its own time,
/// each later one waits for the gap since its predecessor.
///
/// Input must be sorted by time.
pub fn recalculate_deltas(events: Vec<ReducedNoteEvent>) -> Vec<ReducedNoteEvent> {
    let mut prev_time = 0;
    events
        .into_iter()
        .map(|mut e| {
            e.delta_time = e.raw.time.saturating_sub(prev_time);
            prev_time = e.raw.time;
            e
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi_event::{Track, TrackEvent};
    use proptest::prelude::*;

    fn reduced(time: u64) -> ReducedNoteEvent {
        ReducedNoteEvent::new(
            RawNoteEvent {
                time,
                note: 60,
                velocity: 100,
                channel: 0,
                track: 0,
            },
            None,
        )
    }

    #[test]
    fn first_delta_is_absolute_time() {
        let out = recalculate_deltas(vec![reduced(15), reduced(15), reduced(40)]);
        let deltas: Vec<u64> = out.iter().map(|e| e.delta_time).collect();
        assert_eq!(deltas, vec![15, 0, 25]);
    }

    #[test]
    fn default_tempo_is_120_bpm() {
        let song = MidiSong {
            format: 0,
            ticks_per_quarter: 480,
            tracks: vec![Track::default()],
        };
        let tempo = Tempo::resolve(&song);
        assert_eq!(tempo.micros_per_quarter, DEFAULT_MICROS_PER_QUARTER);
        assert!((tempo.bpm() - 120.0).abs() < 1e-9);
        assert_eq!(tempo.ticks_to_duration(480), Duration::from_millis(500));
    }

    #[test]
    fn earliest_tempo_event_wins() {
        let song = MidiSong {
            format: 1,
            ticks_per_quarter: 96,
            tracks: vec![
                Track {
                    events: vec![TrackEvent::new(100, EventKind::Tempo(400_000))],
                },
                Track {
                    events: vec![
                        TrackEvent::new(0, EventKind::Tempo(1_000_000)),
                        TrackEvent::new(10, EventKind::Tempo(250_000)),
                    ],
                },
            ],
        };
        let tempo = Tempo::resolve(&song);
        assert_eq!(tempo.micros_per_quarter, 1_000_000);
        assert!((tempo.bpm() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn tick_conversion_matches_float_path() {
        let tempo = Tempo::new(96, 500_000);
        let secs = tempo.ticks_to_seconds(144);
        assert!((secs - 0.75).abs() < 1e-9);
        assert_eq!(tempo.ticks_to_duration(144), Duration::from_millis(750));
        assert_eq!(tempo.ticks_to_duration(1), Duration::from_nanos(5_208_333));
    }

    proptest! {
        #[test]
        fn deltas_sum_back_to_absolute_times(mut times in prop::collection::vec(0u64..10_000, 0..50)) {
            times.sort_unstable();
            let out = recalculate_deltas(times.iter().map(|&t| reduced(t)).collect());
            let mut total = 0;
            for (event, time) in out.iter().zip(&times) {
                total += event.delta_time;
                prop_assert_eq!(total, *time);
            }
        }
    }
}
