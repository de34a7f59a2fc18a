use crate::timing::ReducedNoteEvent;

mod key_formatter;
mod timing_formatter;

pub use key_formatter::{key_sequence, KeyFormatter};
pub use timing_formatter::TimingFormatter;

pub trait NoteFormatter {
    fn format(&self, event: &ReducedNoteEvent) -> String;
}
