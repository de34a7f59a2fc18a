use std::collections::BTreeSet;
use std::fmt;

use crate::error::{MidiKeysError, Result};
use crate::keymap::note_name;
use crate::midi_event::{EventKind, MidiSong, Track};

/// A sounding note-on, positioned on its track's absolute tick clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawNoteEvent {
    pub time: u64,
    pub note: u8,
    pub velocity: u8,
    pub channel: u8,
    pub track: usize,
}

/// Which part of a song to pull notes from.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub track_index: Option<usize>,
    pub channel_filter: Option<BTreeSet<u8>>,
}

impl ExtractOptions {
    fn accepts_channel(&self, channel: u8) -> bool {
        self.channel_filter
            .as_ref()
            .map_or(true, |set| set.contains(&channel))
    }
}

/// Collect every note-on with non-zero velocity, ordered by `(time, note)`.
///
/// Each track keeps its own clock starting at tick 0. A `track_index` outside
/// the song is an error rather than an empty result.
pub fn extract_notes(song: &MidiSong, options: &ExtractOptions) -> Result<Vec<RawNoteEvent>> {
    let selected: Vec<(usize, &Track)> = match options.track_index {
        Some(index) => {
            let track = song
                .tracks
                .get(index)
                .ok_or(MidiKeysError::TrackOutOfRange {
                    index,
                    count: song.tracks.len(),
                })?;
            vec![(index, track)]
        }
        None => song.tracks.iter().enumerate().collect(),
    };

    let mut notes = Vec::new();
    for (track_index, track) in selected {
        let mut ticks: u64 = 0;
        for event in &track.events {
            ticks += u64::from(event.delta_time);
            if let EventKind::NoteOn {
                channel,
                note,
                velocity,
            } = event.kind
            {
                // velocity 0 is a note-off
                if velocity == 0 || !options.accepts_channel(channel) {
                    continue;
                }
                notes.push(RawNoteEvent {
                    time: ticks,
                    note,
                    velocity,
                    channel,
                    track: track_index,
                });
            }
        }
    }

    notes.sort_by_key(|n| (n.time, n.note));
    Ok(notes)
}

/// Per-track summary printed before processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub index: usize,
    pub note_count: usize,
    pub channels: BTreeSet<u8>,
    pub note_range: Option<(u8, u8)>,
    pub name: Option<String>,
}

impl TrackInfo {
    pub fn from_track(index: usize, track: &Track) -> Self {
        let mut note_count = 0;
        let mut channels = BTreeSet::new();
        let mut note_range: Option<(u8, u8)> = None;

        for event in &track.events {
            if let EventKind::NoteOn {
                channel,
                note,
                velocity,
            } = event.kind
            {
                if velocity == 0 {
                    continue;
                }
                note_count += 1;
                channels.insert(channel);
                note_range = Some(match note_range {
                    Some((lo, hi)) => (lo.min(note), hi.max(note)),
                    None => (note, note),
                });
            }
        }

        Self {
            index,
            note_count,
            channels,
            note_range,
            name: track.name().map(str::to_owned),
        }
    }
}

impl fmt::Display for TrackInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let range = match self.note_range {
            Some((lo, hi)) => format!("{}-{}", note_name(lo), note_name(hi)),
            None => "none".to_string(),
        };
        write!(
            f,
            "Track {}: {} notes {}",
            self.index, self.note_count, range
        )?;
        if !self.channels.is_empty() {
            let list: Vec<String> = self.channels.iter().map(|c| c.to_string()).collect();
            write!(f, " ch {}", list.join(","))?;
        }
        if let Some(name) = &self.name {
            write!(f, " \"{}\"", name)?;
        }
        Ok(())
    }
}

pub fn track_infos(song: &MidiSong) -> Vec<TrackInfo> {
    song.tracks
        .iter()
        .enumerate()
        .map(|(i, t)| TrackInfo::from_track(i, t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi_event::TrackEvent;
    use proptest::prelude::*;

    fn on(dt: u32, channel: u8, note: u8, velocity: u8) -> TrackEvent {
        TrackEvent::new(
            dt,
            EventKind::NoteOn {
                channel,
                note,
                velocity,
            },
        )
    }

    fn song(tracks: Vec<Vec<TrackEvent>>) -> MidiSong {
        MidiSong {
            format: 1,
            ticks_per_quarter: 96,
            tracks: tracks.into_iter().map(|events| Track { events }).collect(),
        }
    }

    #[test]
    fn each_track_has_its_own_clock() {
        let s = song(vec![
            vec![on(10, 0, 60, 100), on(10, 0, 62, 100)],
            vec![on(5, 1, 50, 90), on(30, 1, 52, 90)],
        ]);
        let notes = extract_notes(&s, &ExtractOptions::default()).unwrap();
        let got: Vec<(u64, u8, usize)> = notes.iter().map(|n| (n.time, n.note, n.track)).collect();
        assert_eq!(got, vec![(5, 50, 1), (10, 60, 0), (20, 62, 0), (35, 52, 1)]);
    }

    #[test]
    fn velocity_zero_is_dropped_but_advances_clock() {
        let s = song(vec![vec![
            on(0, 0, 60, 100),
            on(10, 0, 60, 0),
            on(10, 0, 64, 100),
        ]]);
        let notes = extract_notes(&s, &ExtractOptions::default()).unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[1].time, 20);
        assert_eq!(notes[1].note, 64);
    }

    #[test]
    fn channel_filter_keeps_time_accumulation() {
        let s = song(vec![vec![
            on(10, 9, 36, 100),
            on(10, 0, 60, 100),
            TrackEvent::new(5, EventKind::Other),
            on(0, 0, 62, 100),
        ]]);
        let options = ExtractOptions {
            track_index: None,
            channel_filter: Some([0].into_iter().collect()),
        };
        let notes = extract_notes(&s, &options).unwrap();
        let got: Vec<(u64, u8)> = notes.iter().map(|n| (n.time, n.note)).collect();
        assert_eq!(got, vec![(20, 60), (25, 62)]);
    }

    #[test]
    fn single_track_keeps_its_index() {
        let s = song(vec![vec![on(0, 0, 60, 100)], vec![on(0, 0, 70, 100)]]);
        let options = ExtractOptions {
            track_index: Some(1),
            channel_filter: None,
        };
        let notes = extract_notes(&s, &options).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].track, 1);
        assert_eq!(notes[0].note, 70);
    }

    #[test]
    fn missing_track_is_an_error() {
        let s = song(vec![vec![on(0, 0, 60, 100)]]);
        let options = ExtractOptions {
            track_index: Some(3),
            channel_filter: None,
        };
        assert!(matches!(
            extract_notes(&s, &options),
            Err(MidiKeysError::TrackOutOfRange { index: 3, count: 1 })
        ));
    }

    #[test]
    fn track_info_summary() {
        let mut events = vec![
            TrackEvent::new(0, EventKind::TrackName("Piano".to_string())),
            on(0, 0, 60, 100),
            on(0, 2, 72, 100),
            on(0, 0, 30, 0),
        ];
        events.push(TrackEvent::new(0, EventKind::Other));
        let info = TrackInfo::from_track(0, &Track { events });
        assert_eq!(info.note_count, 2);
        assert_eq!(info.note_range, Some((60, 72)));
        assert_eq!(info.to_string(), "Track 0: 2 notes C4-C5 ch 0,2 \"Piano\"");

        let empty = TrackInfo::from_track(3, &Track::default());
        assert_eq!(empty.to_string(), "Track 3: 0 notes none");
    }

    fn arb_event() -> impl Strategy<Value = TrackEvent> {
        (0u32..50, 0u8..16, 0u8..128, 0u8..128).prop_map(|(dt, ch, note, vel)| on(dt, ch, note, vel))
    }

    proptest! {
        #[test]
        fn output_sorted_without_note_offs(
            tracks in prop::collection::vec(prop::collection::vec(arb_event(), 0..40), 1..4)
        ) {
            let s = song(tracks);
            let notes = extract_notes(&s, &ExtractOptions::default()).unwrap();
            prop_assert!(notes.iter().all(|n| n.velocity > 0));
            prop_assert!(notes.windows(2).all(|w| (w[0].time, w[0].note) <= (w[1].time, w[1].note)));
        }
    }
}
