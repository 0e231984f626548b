use crate::{TuningError, NOTE_COUNT};

/// Keyboard mapping from MIDI note numbers to scale note numbers.
///
/// Without a loop size the mapping is a plain lookup table. With a loop size `n`, only the
/// first `n` entries are used and they are repeated every `n` keys, each repetition shifted
/// by `n` scale notes.
/// ```
/// # use functional_tuning_rs::*;
/// let mut m = MidiMapping::new();
/// m.set(0, 2).unwrap();
/// m.set_loop_size(12);
/// assert_eq!(m.map_midi_to_scale(12), Ok(14));
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiMapping {
    keys: Vec<i64>,
    loop_size: i64,
}

impl Default for MidiMapping {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiMapping {
    /// Constructs an identity mapping without looping.
    pub fn new() -> Self {
        MidiMapping {
            keys: (0..NOTE_COUNT as i64).collect(),
            loop_size: 0,
        }
    }

    /// Resets to the identity mapping without looping.
    pub fn reset(&mut self) {
        *self = MidiMapping::new();
    }

    /// Scale notes indexed by MIDI note number.
    pub fn keys(&self) -> &[i64] {
        &self.keys
    }

    /// Maps `midi_note` to `scale_note`.
    ///
    /// Returns a `TuningError::MidiNoteOutOfRange` if `midi_note` is not a key of the mapping.
    pub fn set(&mut self, midi_note: usize, scale_note: i64) -> Result<(), TuningError> {
        let key = self
            .keys
            .get_mut(midi_note)
            .ok_or(TuningError::MidiNoteOutOfRange(midi_note as i64))?;
        *key = scale_note;
        Ok(())
    }

    /// Size of the repeated part of the mapping. `0` means no looping.
    pub fn loop_size(&self) -> i64 {
        self.loop_size
    }

    /// Sets the loop size. Values less than 1 turn looping off.
    pub fn set_loop_size(&mut self, loop_size: i64) {
        self.loop_size = if loop_size < 1 { 0 } else { loop_size };
    }

    /// Returns the scale note number for `midi_note`.
    ///
    /// Looped mappings are clamped to the scale. Returns a `TuningError::MidiNoteOutOfRange`
    /// if the key looked up is not part of the mapping.
    pub fn map_midi_to_scale(&self, midi_note: i64) -> Result<i64, TuningError> {
        if self.loop_size <= 0 {
            return self.key(midi_note, midi_note);
        }

        let octave = midi_note / self.loop_size;
        let offset = midi_note % self.loop_size;
        let scale_note = self
            .key(offset, midi_note)?
            .saturating_add(octave * self.loop_size);

        Ok(scale_note.clamp(0, NOTE_COUNT as i64 - 1))
    }

    fn key(&self, index: i64, midi_note: i64) -> Result<i64, TuningError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.keys.get(i))
            .copied()
            .ok_or(TuningError::MidiNoteOutOfRange(midi_note))
    }
}
