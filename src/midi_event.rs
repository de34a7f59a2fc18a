/// A decoded standard MIDI file, reduced to what the key pipeline reads.
#[derive(Debug, Clone)]
pub struct MidiSong {
    pub format: u16,
    pub ticks_per_quarter: u16,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, Default)]
pub struct Track {
    pub events: Vec<TrackEvent>,
}

#[derive(Debug, Clone)]
pub struct TrackEvent {
    pub delta_time: u32, // ticks since the previous event in the same track
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    TrackName(String),
    Tempo(u32), // microseconds per quarter note
    Other,
}

impl Track {
    /// The first track-name meta event, if any.
    pub fn name(&self) -> Option<&str> {
        self.events.iter().find_map(|e| match &e.kind {
            EventKind::TrackName(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

impl TrackEvent {
    pub fn new(delta_time: u32, kind: EventKind) -> Self {
        Self { delta_time, kind }
    }
}
