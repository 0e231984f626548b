#![warn(missing_docs)]

//! Formula based tuning of a 128 note scale.
//!
//! This library keeps the frequencies of a scale of [`NOTE_COUNT`] notes and changes them with
//! the formulas of the `[Functional Tuning]` section of AnaMark tuning files (TUN). Formulas can
//! refer to fixed frequencies and to other notes of the scale, shift by factors and cents, and
//! repeat themselves over a range of notes. Every applied formula is kept, so the scale can be
//! written back exactly the way it was built.
//!
//! ```
//! # use functional_tuning_rs::*;
//! let mut s = Scale::new();
//! s.init_equal(60, 261.6255653);
//! s.add_formula_text(62, "#=60 *9 /8").unwrap(); // just major second
//! s.add_formula_text(60, "!256").unwrap(); // move the whole scale so C is 256 Hz
//! assert!((s.frequency_at(62).unwrap() - 288.0).abs() < 1e-9);
//! ```

mod error;
mod formula;
mod mapping;
mod scale;

pub use error::TuningError;
pub use formula::{Formula, RefParam};
pub use mapping::MidiMapping;
pub use scale::{NoteObserver, Scale};

/// Number of notes of a scale. Same as the number of MIDI notes.
pub const NOTE_COUNT: usize = 128;

/// Loop count of a formula that repeats until the end of the scale.
pub const OPEN_LOOP: i64 = 999;

/// Frequency of a MIDI note 0. Equal to `440 * 2^(-69/12)`.
pub const MIDI_0_FREQ: f64 = 8.1757989156437073336;

/// Base note used by [`Scale::new()`] and [`Scale::reset()`].
pub const DEFAULT_BASE_NOTE: i64 = 69;

/// Frequency of [`DEFAULT_BASE_NOTE`].
pub const DEFAULT_BASE_FREQ_HZ: f64 = 440.0;

/// Converts `hz` to cents above `base_hz`.
/// ```
/// # use functional_tuning_rs::*;
/// assert_eq!(hz_to_cents(880.0, 440.0), 1200.0);
/// ```
pub fn hz_to_cents(hz: f64, base_hz: f64) -> f64 {
    factor_to_cents(hz / base_hz)
}

/// Converts `cents` above `base_hz` to Hz.
pub fn cents_to_hz(cents: f64, base_hz: f64) -> f64 {
    base_hz * cents_to_factor(cents)
}

/// Returns the frequency ratio of `cents`.
pub fn cents_to_factor(cents: f64) -> f64 {
    2f64.powf(cents / 1200.0)
}

/// Returns the cents of the frequency ratio `factor`.
pub fn factor_to_cents(factor: f64) -> f64 {
    1200.0 * factor.log2()
}

/// Cents of `midi_note` above MIDI note 0 in standard 12-EDO. Notes outside of `0..=127` are
/// clamped.
pub fn default_midi_note_to_cents(midi_note: i32) -> f64 {
    midi_note.clamp(0, 127) as f64 * 100.0
}

/// Frequency of `midi_note` in standard 12-EDO with A = 440 Hz. Notes outside of `0..=127` are
/// clamped.
/// ```
/// # use functional_tuning_rs::*;
/// assert!((default_midi_note_to_hz(69) - 440.0).abs() < 1e-9);
/// assert_eq!(default_midi_note_to_hz(-5), MIDI_0_FREQ);
/// ```
pub fn default_midi_note_to_hz(midi_note: i32) -> f64 {
    cents_to_hz(default_midi_note_to_cents(midi_note), MIDI_0_FREQ)
}
