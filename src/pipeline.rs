use std::collections::BTreeSet;

use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::{MidiKeysError, Result};
use crate::extractor::{extract_notes, ExtractOptions, RawNoteEvent};
use crate::keymap::KeyMap;
use crate::midi_event::MidiSong;
use crate::reduce::ReduceStats;
use crate::timing::{recalculate_deltas, KeyAction, ReducedNoteEvent, Tempo};

/// Everything computed for one playback queue.
#[derive(Debug, Clone)]
pub struct KeyPlan {
    pub track: Option<usize>,
    pub tempo: Tempo,
    pub stats: ReduceStats,
    /// Reduced notes in order, mapped or not.
    pub reduced: Vec<RawNoteEvent>,
    /// Mapped notes with delays between consecutive playable notes.
    pub playable: Vec<ReducedNoteEvent>,
    /// Distinct unmapped note numbers, ascending.
    pub out_of_range: Vec<u8>,
    /// How many reduced notes had no key.
    pub unmapped_count: usize,
}

impl KeyPlan {
    pub fn actions(&self) -> Vec<KeyAction> {
        self.playable.iter().map(KeyAction::from).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.playable.is_empty()
    }

    /// Errors with `NoPlayableNotes` when nothing maps to a key.
    pub fn ensure_playable(&self) -> Result<()> {
        if self.is_empty() {
            Err(MidiKeysError::NoPlayableNotes)
        } else {
            Ok(())
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    keymap: KeyMap,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_keymap(config, KeyMap::default())
    }

    pub fn with_keymap(config: PipelineConfig, keymap: KeyMap) -> Self {
        Self { config, keymap }
    }

    /// Runs extraction, reduction, mapping and delta recalculation over the
    /// configured track selection.
    pub fn plan(&self, song: &MidiSong) -> Result<KeyPlan> {
        self.plan_for(song, self.config.track_index)
    }

    /// One independent plan per track that yields at least one note.
    /// A configured track index narrows this to that one track.
    pub fn plan_per_track(&self, song: &MidiSong) -> Result<Vec<KeyPlan>> {
        if let Some(index) = self.config.track_index {
            return Ok(vec![self.plan_for(song, Some(index))?]);
        }

        let mut plans = Vec::new();
        for index in 0..song.tracks.len() {
            let plan = self.plan_for(song, Some(index))?;
            if plan.reduced.is_empty() {
                debug!(track = index, "skipping track without notes");
                continue;
            }
            plans.push(plan);
        }
        Ok(plans)
    }

    fn plan_for(&self, song: &MidiSong, track_index: Option<usize>) -> Result<KeyPlan> {
        let options = ExtractOptions {
            track_index,
            channel_filter: self.config.channel_filter.clone(),
        };
        let notes = extract_notes(song, &options)?;
        let (reduced, stats) = self.config.merge_mode.reduce_with_stats(&notes);
        debug!(?track_index, "{}", stats);

        let mut mapped = Vec::with_capacity(reduced.len());
        let mut out_of_range = BTreeSet::new();
        let mut unmapped_count = 0;
        for raw in &reduced {
            match self.keymap.lookup(raw.note) {
                Some(press) => mapped.push(ReducedNoteEvent::new(*raw, Some(press))),
                None => {
                    unmapped_count += 1;
                    out_of_range.insert(raw.note);
                }
            }
        }

        Ok(KeyPlan {
            track: track_index,
            tempo: Tempo::resolve(song),
            stats,
            reduced,
            playable: recalculate_deltas(mapped),
            out_of_range: out_of_range.into_iter().collect(),
            unmapped_count,
        })
    }
}
