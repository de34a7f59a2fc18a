use std::io::ErrorKind;
use std::path::Path;

use midi_file::core::Message;
use midi_file::file::{Division, Event, Format, MetaEvent, TrackEvent as FileTrackEvent};
use midi_file::MidiFile;
use tracing::debug;

use crate::error::{MidiKeysError, Result};
use crate::midi_event::{EventKind, MidiSong, Track, TrackEvent};

/// Load a standard MIDI file from disk.
pub fn load_song(path: &Path) -> Result<MidiSong> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            return Err(MidiKeysError::InputNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(MidiKeysError::InputNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(MidiKeysError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    let file = MidiFile::load(path).map_err(|e| MidiKeysError::MalformedInput(e.to_string()))?;
    convert(&file)
}

fn convert(file: &MidiFile) -> Result<MidiSong> {
    let format = match file.header().format() {
        Format::Single => 0,
        Format::Multi => 1,
        Format::Sequential => 2,
    };

    let ticks_per_quarter = match file.header().division() {
        Division::QuarterNote(qtr) => {
            debug!("Quarter Note Division: {}", qtr.get());
            qtr.get()
        }
        Division::Smpte(smpte) => {
            return Err(MidiKeysError::MalformedInput(format!(
                "SMPTE time division is not supported: {:?}",
                smpte
            )))
        }
    };
    if ticks_per_quarter == 0 {
        return Err(MidiKeysError::MalformedInput(
            "time division of zero ticks per quarter note".to_string(),
        ));
    }

    let tracks = file
        .tracks()
        .map(|t| Track {
            events: t.events().map(convert_event).collect(),
        })
        .collect();

    Ok(MidiSong {
        format,
        ticks_per_quarter,
        tracks,
    })
}

fn convert_event(track_event: &FileTrackEvent) -> TrackEvent {
    let dt = track_event.delta_time();
    let kind = match track_event.event() {
        Event::Midi(Message::NoteOn(note)) => EventKind::NoteOn {
            channel: note.channel().get(), // midi_file is 0-based
            note: note.note_number().get(),
            velocity: note.velocity().get(),
        },
        Event::Midi(Message::NoteOff(note)) => EventKind::NoteOff {
            channel: note.channel().get(),
            note: note.note_number().get(),
        },
        Event::Meta(MetaEvent::TrackName(text)) => EventKind::TrackName(text.to_string()),
        Event::Meta(MetaEvent::SetTempo(tempo)) => EventKind::Tempo(tempo.get()),
        _ => EventKind::Other,
    };
    TrackEvent::new(dt, kind)
}
