use thiserror::Error;

/// Errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TuningError {
    /// Error parsing a formula string.
    #[error("Error parsing the formula: {0}")]
    ParseError(String),

    /// A reference or lookup resolved to a note outside of the frequency table.
    #[error("Note index {0} is outside of the scale.")]
    NoteIndexOutOfRange(i64),

    /// A MIDI note outside of the keyboard mapping.
    #[error("MIDI note {0} is outside of the keyboard mapping.")]
    MidiNoteOutOfRange(i64),

    /// More note values were given than the scale can hold.
    #[error("{0} notes given, which is more than the scale holds.")]
    TooManyNotes(usize),
}
