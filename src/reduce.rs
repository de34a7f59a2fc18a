use std::collections::{BTreeMap, HashSet};
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::extractor::RawNoteEvent;

/// How simultaneous notes collapse into a playable stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum MergeMode {
    /// Keep every note, chords become rapid sequential presses.
    #[default]
    #[serde(rename = "all")]
    All,
    /// Drop repeated pitches at the same tick.
    #[serde(rename = "dedupe")]
    Dedupe,
    /// Keep only the highest pitch at each tick.
    #[serde(rename = "melody")]
    Melody,
    /// Highest pitch per track and tick, then dedupe across tracks.
    #[value(name = "track-melody+dedupe")]
    #[serde(rename = "track-melody+dedupe")]
    TrackMelodyDedupe,
}

/// Note counts observed while reducing, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReduceStats {
    pub mode: MergeMode,
    pub input: usize,
    /// Count after the per-track phase of `track-melody+dedupe`.
    pub intermediate: Option<usize>,
    pub output: usize,
}

impl MergeMode {
    /// Reduce a `(time, note)`-sorted note list.
    pub fn reduce(&self, notes: &[RawNoteEvent]) -> Vec<RawNoteEvent> {
        self.reduce_with_stats(notes).0
    }

    pub fn reduce_with_stats(&self, notes: &[RawNoteEvent]) -> (Vec<RawNoteEvent>, ReduceStats) {
        let mut intermediate = None;
        let reduced = match self {
            MergeMode::All => notes.to_vec(),
            MergeMode::Dedupe => dedupe(notes),
            MergeMode::Melody => melody(notes),
            MergeMode::TrackMelodyDedupe => {
                let per_track = track_melody(notes);
                intermediate = Some(per_track.len());
                dedupe(&per_track)
            }
        };
        let stats = ReduceStats {
            mode: *self,
            input: notes.len(),
            intermediate,
            output: reduced.len(),
        };
        (reduced, stats)
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeMode::All => "all",
            MergeMode::Dedupe => "dedupe",
            MergeMode::Melody => "melody",
            MergeMode::TrackMelodyDedupe => "track-melody+dedupe",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ReduceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.mode, self.intermediate) {
            (MergeMode::Dedupe, _) => write!(
                f,
                "Merge mode: dedupe (removed {} duplicate simultaneous notes)",
                self.input - self.output
            ),
            (MergeMode::Melody, _) => write!(
                f,
                "Merge mode: melody (kept {} highest notes from {} total)",
                self.output, self.input
            ),
            (MergeMode::TrackMelodyDedupe, Some(mid)) => write!(
                f,
                "Merge mode: track-melody+dedupe\n  Step 1 (track-melody): {} -> {} notes\n  Step 2 (dedupe): {} -> {} notes",
                self.input, mid, mid, self.output
            ),
            _ => write!(f, "Merge mode: all (processing all {} notes)", self.input),
        }
    }
}

/// First occurrence of each pitch at each tick survives.
fn dedupe(notes: &[RawNoteEvent]) -> Vec<RawNoteEvent> {
    let mut out = Vec::with_capacity(notes.len());
    let mut current_time = None;
    let mut seen: HashSet<u8> = HashSet::new();

    for n in notes {
        if current_time != Some(n.time) {
            seen.clear();
            current_time = Some(n.time);
        }
        if seen.insert(n.note) {
            out.push(*n);
        }
    }
    out
}

/// Highest pitch at each tick; ties keep the earliest.
fn melody(notes: &[RawNoteEvent]) -> Vec<RawNoteEvent> {
    let mut out: Vec<RawNoteEvent> = Vec::new();
    for n in notes {
        match out.last_mut() {
            Some(best) if best.time == n.time => {
                if n.note > best.note {
                    *best = *n;
                }
            }
            _ => out.push(*n),
        }
    }
    out
}

/// Melody per source track, merged back into one `(time, note)`-sorted list.
fn track_melody(notes: &[RawNoteEvent]) -> Vec<RawNoteEvent> {
    let mut by_track: BTreeMap<usize, Vec<RawNoteEvent>> = BTreeMap::new();
    for n in notes {
        by_track.entry(n.track).or_default().push(*n);
    }

    let mut merged: Vec<RawNoteEvent> = by_track
        .into_values()
        .flat_map(|track_notes| {
            let mut best: BTreeMap<u64, RawNoteEvent> = BTreeMap::new();
            for n in track_notes {
                best.entry(n.time)
                    .and_modify(|b| {
                        if n.note > b.note {
                            *b = n;
                        }
                    })
                    .or_insert(n);
            }
            best.into_values()
        })
        .collect();

    merged.sort_by_key(|n| (n.time, n.note));
    merged
}
