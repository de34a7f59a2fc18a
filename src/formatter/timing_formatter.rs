use std::time::Duration;

use crate::formatter::NoteFormatter;
use crate::keymap::note_name;
use crate::timing::{ReducedNoteEvent, Tempo};

/// One detailed line per note, for `--timing`.
pub struct TimingFormatter {
    tempo: Tempo,
}

impl TimingFormatter {
    pub fn new(tempo: Tempo) -> Self {
        Self { tempo }
    }
}

impl NoteFormatter for TimingFormatter {
    fn format(&self, event: &ReducedNoteEvent) -> String {
        // Time:    480 | DeltaTime:    240 | Note: C4   (MIDI  60) | Ch: 0 | Track: 1 -> Key: a [00:00.500]
        let raw = &event.raw;
        let key = event
            .press
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "Time: {time:>6} | DeltaTime: {delta:>6} | Note: {name:<4} (MIDI {note:>3}) | Ch: {channel} | Track: {track} -> Key: {key} [{clock}]",
            time = raw.time,
            delta = event.delta_time,
            name = note_name(raw.note),
            note = raw.note,
            channel = raw.channel,
            track = raw.track,
            key = key,
            clock = format_midi_time(self.tempo.ticks_to_seconds(raw.time)),
        )
    }
}

fn format_midi_time(seconds: f64) -> String {
    let duration = Duration::from_secs_f64(seconds.max(0.0));
    let minutes = duration.as_secs() / 60;
    let seconds = duration.as_secs() % 60;
    let fractional = duration.subsec_millis();
    format!("{:02}:{:02}.{:03}", minutes, seconds, fractional)
}
