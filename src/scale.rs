use std::fmt::Debug;

use log::debug;

use crate::{
    Formula, MidiMapping, TuningError, DEFAULT_BASE_FREQ_HZ, DEFAULT_BASE_NOTE, MIDI_0_FREQ,
    NOTE_COUNT,
};

/// Receives changes of note frequencies of a [`Scale`].
pub trait NoteObserver {
    /// Called once for every note whose frequency changed, in ascending note order.
    fn on_note_changed(&mut self, index: usize, new_freq_hz: f64);
}

/// The Scale holds the frequencies of all [`NOTE_COUNT`] scale notes together with the list of
/// formulas that produced them.
///
/// Frequencies are only changed through [`Scale::init_equal`] and [`Scale::add_formula`], so
/// the formula list always describes the current table. The table is indexed by scale note
/// number; use [`Scale::frequency_for_midi_note`] to go through the keyboard mapping.
///
/// Be aware that frequencies `<= 0` Hz can appear when formulas shift notes down. Such notes
/// should be treated as muted.
///
/// ```
/// # use functional_tuning_rs::*;
/// let mut s = Scale::new(); // 12-EDO with A = 440 Hz
/// assert_eq!(s.frequency_at(69), Ok(440.0));
///
/// s.add_formula_text(69, "%100").unwrap(); // one semitone up from itself
/// assert!((s.frequency_at(69).unwrap() - 466.1637615).abs() < 1e-6);
/// assert_eq!(s.formulas()[0].to_string(), "%100");
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scale {
    base_note: i64,
    base_freq_hz: f64,
    frequencies: Vec<f64>,
    formulas: Vec<Formula>,
    mapping: MidiMapping,

    #[cfg_attr(feature = "serde", serde(skip))]
    observers: Vec<Box<dyn NoteObserver + Send>>,
}

impl Default for Scale {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Scale {
    /// Clones the tuning. Observers stay with the original.
    fn clone(&self) -> Self {
        Scale {
            base_note: self.base_note,
            base_freq_hz: self.base_freq_hz,
            frequencies: self.frequencies.clone(),
            formulas: self.formulas.clone(),
            mapping: self.mapping.clone(),
            observers: Vec::new(),
        }
    }
}

impl Debug for Scale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scale")
            .field("base_note", &self.base_note)
            .field("base_freq_hz", &self.base_freq_hz)
            .field("frequencies", &self.frequencies)
            .field("formulas", &self.formulas)
            .field("mapping", &self.mapping)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Scale {
    /// Constructs a 12-EDO scale with A = 440 Hz and identity keyboard mapping.
    pub fn new() -> Self {
        let mut s = Scale {
            base_note: DEFAULT_BASE_NOTE,
            base_freq_hz: DEFAULT_BASE_FREQ_HZ,
            frequencies: Vec::new(),
            formulas: Vec::new(),
            mapping: MidiMapping::new(),
            observers: Vec::new(),
        };
        s.reset();
        s
    }

    /// Constructs a scale from absolute cents values of its notes, measured from
    /// [`MIDI_0_FREQ`]. Notes past the end of `cents` keep their 12-EDO frequency.
    ///
    /// Every note gets a formula referring to note 0, so the scale can be written back as
    /// formulas. Returns a `TuningError::TooManyNotes` if `cents` is longer than the scale.
    /// ```
    /// # use functional_tuning_rs::*;
    /// let s = Scale::from_note_cents(&[0.0, 100.0, 150.0]).unwrap();
    /// assert!((s.frequency_at(2).unwrap() - cents_to_hz(150.0, MIDI_0_FREQ)).abs() < 1e-9);
    /// assert_eq!(s.formulas().len(), 3);
    /// ```
    pub fn from_note_cents(cents: &[f64]) -> Result<Self, TuningError> {
        if cents.len() > NOTE_COUNT {
            return Err(TuningError::TooManyNotes(cents.len()));
        }

        let mut s = Scale::new();
        s.init_equal(0, MIDI_0_FREQ);

        // Note 0 is referenced by all others, so it is retuned last.
        for (i, &c) in cents.iter().enumerate().rev() {
            let mut formula = Formula::new(i);
            formula.set_to_cents_abs_ref(c, 0);
            s.add_formula(formula)?;
        }

        Ok(s)
    }

    /// Resets the scale to 12-EDO with A = 440 Hz, clears the formulas and resets the keyboard
    /// mapping.
    pub fn reset(&mut self) {
        self.frequencies.resize(NOTE_COUNT, 0.0);
        self.init_equal(DEFAULT_BASE_NOTE, DEFAULT_BASE_FREQ_HZ);
        self.mapping.reset();
    }

    /// Fills the scale with 12-EDO where the note `base_note` has the frequency `base_freq_hz`.
    /// All formulas are cleared.
    pub fn init_equal(&mut self, base_note: i64, base_freq_hz: f64) {
        debug!("initializing 12-EDO scale with note {base_note} at {base_freq_hz} Hz");
        self.base_note = base_note;
        self.base_freq_hz = base_freq_hz;

        let table = (0..NOTE_COUNT as i64)
            .map(|i| base_freq_hz * 2f64.powf((i - base_note) as f64 / 12.0))
            .collect();
        self.replace_table(table);
        self.formulas.clear();
    }

    /// Base note of the last equal initialization.
    pub fn base_note(&self) -> i64 {
        self.base_note
    }

    /// Base frequency of the last equal initialization.
    pub fn base_freq_hz(&self) -> f64 {
        self.base_freq_hz
    }

    /// Applies `formula` to the scale and appends it to the formula list.
    ///
    /// If a reference of the formula cannot be resolved, a `TuningError::NoteIndexOutOfRange`
    /// is returned and the scale is left unchanged.
    pub fn add_formula(&mut self, formula: Formula) -> Result<(), TuningError> {
        let mut table = self.frequencies.clone();
        formula.apply(&mut table)?;

        debug!("note {}: applied formula \"{formula}\"", formula.note_index());
        self.replace_table(table);
        self.formulas.push(formula);
        Ok(())
    }

    /// Parses `text` as a formula for the note `note_index` and adds it to the scale.
    pub fn add_formula_text(&mut self, note_index: usize, text: &str) -> Result<(), TuningError> {
        self.add_formula(Formula::from_text(note_index, text)?)
    }

    /// Formulas applied since the last equal initialization, in order of application.
    pub fn formulas(&self) -> &[Formula] {
        &self.formulas
    }

    /// Frequencies of all scale notes. The index is the scale note number, not the MIDI note
    /// number.
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Returns the frequency of the scale note `scale_note`.
    ///
    /// Takes the same note numbers [`Scale::map_midi_to_scale`] returns. Returns a
    /// `TuningError::NoteIndexOutOfRange` for notes outside of the scale.
    pub fn frequency_at(&self, scale_note: i64) -> Result<f64, TuningError> {
        usize::try_from(scale_note)
            .ok()
            .and_then(|i| self.frequencies.get(i))
            .copied()
            .ok_or(TuningError::NoteIndexOutOfRange(scale_note))
    }

    /// Returns the frequency of `midi_note` as mapped by the keyboard mapping.
    /// ```
    /// # use functional_tuning_rs::*;
    /// let mut s = Scale::new();
    /// s.set_mapping(60, 69).unwrap();
    /// assert_eq!(s.frequency_for_midi_note(60), Ok(440.0));
    /// ```
    pub fn frequency_for_midi_note(&self, midi_note: i64) -> Result<f64, TuningError> {
        self.frequency_at(self.map_midi_to_scale(midi_note)?)
    }

    /// Keyboard mapping of the scale.
    pub fn mapping(&self) -> &MidiMapping {
        &self.mapping
    }

    /// Maps `midi_note` to `scale_note`. See [`MidiMapping::set`].
    pub fn set_mapping(&mut self, midi_note: usize, scale_note: i64) -> Result<(), TuningError> {
        self.mapping.set(midi_note, scale_note)
    }

    /// See [`MidiMapping::set_loop_size`].
    pub fn set_loop_size(&mut self, loop_size: i64) {
        self.mapping.set_loop_size(loop_size);
    }

    /// See [`MidiMapping::map_midi_to_scale`].
    pub fn map_midi_to_scale(&self, midi_note: i64) -> Result<i64, TuningError> {
        self.mapping.map_midi_to_scale(midi_note)
    }

    /// Registers `observer` to be told about every frequency change from now on.
    pub fn subscribe(&mut self, observer: Box<dyn NoteObserver + Send>) {
        self.observers.push(observer);
    }

    fn replace_table(&mut self, table: Vec<f64>) {
        let old = std::mem::replace(&mut self.frequencies, table);
        if self.observers.is_empty() {
            return;
        }

        for (i, (&before, &after)) in old.iter().zip(&self.frequencies).enumerate() {
            if before.to_bits() != after.to_bits() {
                for observer in &mut self.observers {
                    observer.on_note_changed(i, after);
                }
            }
        }
    }
}
