use crate::formatter::NoteFormatter;
use crate::timing::ReducedNoteEvent;

/// Short key form for the "KEYS TO PRESS" line.
pub struct KeyFormatter;

impl NoteFormatter for KeyFormatter {
    fn format(&self, event: &ReducedNoteEvent) -> String {
        event.press.map(|p| p.to_string()).unwrap_or_default()
    }
}

pub fn key_sequence(events: &[ReducedNoteEvent]) -> String {
    events
        .iter()
        .map(|e| KeyFormatter.format(e))
        .filter(|k| !k.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
