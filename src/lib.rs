//! Turns the note-on events of a standard MIDI file into a timed stream of
//! key taps for a keyboard-driven instrument.
//!
//! The pipeline runs left to right: [`extractor`] pulls note-ons from the
//! decoded tracks, a [`reduce::MergeMode`] collapses simultaneous notes,
//! [`keymap`] maps pitches to keys, [`timing`] rewrites delays, and
//! [`scheduler`] replays the result in real time.

pub mod config;
pub mod error;
pub mod extractor;
pub mod formatter;
pub mod inject;
pub mod keymap;
pub mod loader;
pub mod midi_event;
pub mod pipeline;
pub mod reduce;
pub mod scheduler;
pub mod script;
pub mod timing;

pub use config::{PipelineConfig, Settings};
pub use error::{MidiKeysError, Result};
pub use pipeline::{KeyPlan, Pipeline};
pub use reduce::MergeMode;
