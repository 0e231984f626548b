//! Formulas of the `[Functional Tuning]` kind and the parameters they reference.

use std::fmt::Display;

use log::{trace, warn};

use crate::{cents_to_factor, TuningError, NOTE_COUNT, OPEN_LOOP};

/// Parameter of a formula given either by value or by reference to another note.
///
/// References are resolved when the formula is applied, not when it is parsed, so they always
/// see the current state of the frequency table.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RefParam {
    /// Literal value in Hz.
    /// ```
    /// # use functional_tuning_rs::*;
    /// RefParam::Value(440.0); // written as `440`
    /// ```
    Value(f64),

    /// Absolute reference to a note of the scale.
    /// ```
    /// # use functional_tuning_rs::*;
    /// RefParam::AbsRef(69); // written as `=69`
    /// ```
    AbsRef(i64),

    /// Reference relative to the note being evaluated.
    /// ```
    /// # use functional_tuning_rs::*;
    /// RefParam::RelRef(-12); // written as `>-12`, an octave below in 12-EDO
    /// ```
    RelRef(i64),
}

impl RefParam {
    /// Resolves the parameter against `table` for the note `note_index`.
    ///
    /// Returns a `TuningError::NoteIndexOutOfRange` if a reference points outside of `table`.
    /// ```
    /// # use functional_tuning_rs::*;
    /// let table = [100.0, 200.0, 300.0];
    /// assert_eq!(RefParam::AbsRef(0).resolve(&table, 2), Ok(100.0));
    /// assert_eq!(RefParam::RelRef(-1).resolve(&table, 2), Ok(200.0));
    /// assert!(RefParam::RelRef(1).resolve(&table, 2).is_err());
    /// ```
    pub fn resolve(&self, table: &[f64], note_index: usize) -> Result<f64, TuningError> {
        let index = match *self {
            RefParam::Value(value) => return Ok(value),
            RefParam::AbsRef(r) => r,
            RefParam::RelRef(r) => (note_index as i64).saturating_add(r),
        };

        usize::try_from(index)
            .ok()
            .and_then(|i| table.get(i))
            .copied()
            .ok_or(TuningError::NoteIndexOutOfRange(index))
    }

    /// Parses a parameter starting at byte `pos` of `text` and advances `pos` past it.
    ///
    /// `=` introduces an absolute reference, `>` a relative one, anything else is read as a
    /// literal value.
    pub fn parse(text: &str, pos: &mut usize) -> Result<Self, TuningError> {
        match text.as_bytes().get(*pos) {
            Some(b'=') => {
                *pos += 1;
                Ok(RefParam::AbsRef(scan_int(text, pos)?))
            }
            Some(b'>') => {
                *pos += 1;
                Ok(RefParam::RelRef(scan_int(text, pos)?))
            }
            _ => Ok(RefParam::Value(scan_float(text, pos)?)),
        }
    }
}

impl Display for RefParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefParam::Value(value) => write!(f, "{value}"),
            RefParam::AbsRef(r) => write!(f, "={r}"),
            RefParam::RelRef(r) => write!(f, ">{r}"),
        }
    }
}

fn scan_digits(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    pos
}

fn scan_sign(bytes: &[u8], pos: usize) -> usize {
    match bytes.get(pos) {
        Some(b'+' | b'-') => pos + 1,
        _ => pos,
    }
}

// Longest prefix of the form `[+-]digits[.digits][e[+-]digits]`, like `strtod`.
fn scan_float(text: &str, pos: &mut usize) -> Result<f64, TuningError> {
    let bytes = text.as_bytes();
    let start = *pos;
    let mut end = scan_sign(bytes, start);

    let int_end = scan_digits(bytes, end);
    let mut digits = int_end - end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = scan_digits(bytes, end + 1);
        if digits > 0 || frac_end > end + 1 {
            digits += frac_end - end - 1;
            end = frac_end;
        }
    }

    if digits == 0 {
        return Err(TuningError::ParseError(format!(
            "Expected a number at position {start}."
        )));
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let exp_start = scan_sign(bytes, end + 1);
        let exp_end = scan_digits(bytes, exp_start);
        if exp_end > exp_start {
            end = exp_end;
        }
    }

    let value = text[start..end].parse().map_err(|_| {
        TuningError::ParseError(format!("Value at position {start} is not numeric."))
    })?;
    *pos = end;
    Ok(value)
}

// Longest prefix of the form `[+-]digits`, like `strtol`.
fn scan_int(text: &str, pos: &mut usize) -> Result<i64, TuningError> {
    let bytes = text.as_bytes();
    let start = *pos;
    let digits_start = scan_sign(bytes, start);
    let end = scan_digits(bytes, digits_start);

    if end == digits_start {
        return Err(TuningError::ParseError(format!(
            "Expected an integer at position {start}."
        )));
    }

    let value = text[start..end].parse().map_err(|_| {
        TuningError::ParseError(format!("Integer at position {start} is out of range."))
    })?;
    *pos = end;
    Ok(value)
}

/// A formula changes the frequency of the note it is bound to (and, when looping, of the notes
/// next to it). It is the text on the right hand side of a `[Functional Tuning]` entry:
///
/// ```text
/// !<Hz>            ensure the note has this frequency by rescaling the whole scale
/// #<param>         range: the frequency to start from (default `#>0`, the note itself)
/// *<factor>        multiply
/// /<factor>        divide
/// %<cents>         shift by cents
/// +<param>         add a frequency in Hz
/// ~<count>         repeat over `count` notes, the sign gives the direction
/// ```
///
/// The resulting frequency is `range * mul / div * 2^(cents / 1200) + shift`.
///
/// ```
/// # use functional_tuning_rs::*;
/// let f = Formula::from_text(64, "#=60 *5 /4").unwrap(); // just major third above note 60
/// assert_eq!(f.range_hz, RefParam::AbsRef(60));
/// assert_eq!(f.to_string(), "#=60 *5 /4");
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Formula {
    note_index: usize,

    /// Frequency the note is ensured to have. Values `<= 0` mean the override is not used;
    /// [`Formula::from_text`] stores them as `0`.
    pub ensure_hz: f64,

    /// Frequency the formula starts from.
    pub range_hz: RefParam,

    /// Multiplication factor.
    pub mul: f64,

    /// Division factor.
    pub div: f64,

    /// Shift in cents.
    pub cents: f64,

    /// Frequency added at the end.
    pub shift_hz: RefParam,

    /// How many notes the formula is repeated over. Negative values repeat downwards, and
    /// `±OPEN_LOOP` repeats up to the end of the scale.
    pub loop_count: i64,
}

impl Formula {
    /// Constructs an identity formula for the note `note_index`. Applying it leaves the scale
    /// unchanged.
    pub fn new(note_index: usize) -> Self {
        Formula {
            note_index,
            ensure_hz: 0.0,
            range_hz: RefParam::RelRef(0),
            mul: 1.0,
            div: 1.0,
            cents: 0.0,
            shift_hz: RefParam::Value(0.0),
            loop_count: 0,
        }
    }

    /// Index of the note the formula is bound to.
    pub fn note_index(&self) -> usize {
        self.note_index
    }

    /// Returns whether the formula rescales the whole scale instead of setting a single note.
    pub fn is_ensure(&self) -> bool {
        self.ensure_hz > 0.0
    }

    /// Resets the formula back to identity.
    pub fn reset(&mut self) {
        *self = Formula::new(self.note_index);
    }

    /// Sets the formula to `cents` above the frequency `base_hz`.
    pub fn set_to_cents_with_freq(&mut self, cents: f64, base_hz: f64) {
        self.reset();
        self.range_hz = RefParam::Value(base_hz);
        self.cents = cents;
    }

    /// Sets the formula to `cents` above the note `abs_ref`.
    pub fn set_to_cents_abs_ref(&mut self, cents: f64, abs_ref: i64) {
        self.reset();
        self.range_hz = RefParam::AbsRef(abs_ref);
        self.cents = cents;
    }

    /// Sets the formula to a fixed frequency.
    pub fn set_to_hz(&mut self, hz: f64) {
        self.reset();
        self.range_hz = RefParam::Value(hz);
    }

    /// Sets the formula to rescale the scale so that its note lands on `hz`.
    pub fn set_to_ensure_hz(&mut self, hz: f64) {
        self.reset();
        self.ensure_hz = hz;
    }

    /// Parses a formula bound to the note `note_index`.
    ///
    /// Whitespace is ignored. Returns a `TuningError::ParseError` on unknown tokens or
    /// malformed numbers. Loop counts reaching past the scale are replaced by `±OPEN_LOOP`,
    /// and an ensure frequency `<= 0` turns the formula into identity.
    /// ```
    /// # use functional_tuning_rs::*;
    /// let f = Formula::from_text(5, "% 100 ~ -20").unwrap();
    /// assert_eq!(f.cents, 100.0);
    /// assert_eq!(f.loop_count, -OPEN_LOOP);
    ///
    /// assert!(Formula::from_text(5, "%100 ?").is_err());
    /// ```
    pub fn from_text(note_index: usize, text: &str) -> Result<Self, TuningError> {
        let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = text.as_bytes();
        let mut res = Formula::new(note_index);
        let mut pos = 0;

        while pos < bytes.len() {
            let token = bytes[pos];
            pos += 1;

            match token {
                b'!' => {
                    // Rescales the whole scale, so nothing else in the formula matters.
                    res.reset();
                    let hz = scan_float(&text, &mut pos)?;
                    res.ensure_hz = if hz > 0.0 { hz } else { 0.0 };
                    break;
                }
                b'#' => res.range_hz = RefParam::parse(&text, &mut pos)?,
                b'*' => res.mul = scan_float(&text, &mut pos)?,
                b'/' => res.div = scan_float(&text, &mut pos)?,
                b'%' => res.cents = scan_float(&text, &mut pos)?,
                b'+' => res.shift_hz = RefParam::parse(&text, &mut pos)?,
                b'~' => {
                    res.loop_count = scan_int(&text, &mut pos)?;
                    res.clamp_loop();
                }
                _ => {
                    let bad_char = text[pos - 1..].chars().next().unwrap_or_default();
                    return Err(TuningError::ParseError(format!(
                        "Unknown token {bad_char} at position {}.",
                        pos - 1
                    )));
                }
            }
        }

        Ok(res)
    }

    /// Replaces the formula by the one parsed from `text`. On error the formula is left as it
    /// was.
    pub fn set_from_text(&mut self, text: &str) -> Result<(), TuningError> {
        *self = Formula::from_text(self.note_index, text)?;
        Ok(())
    }

    fn clamp_loop(&mut self) {
        let last = (self.note_index as i64).saturating_add(self.loop_count);
        if last < 0 {
            self.loop_count = -OPEN_LOOP;
        }
        if last >= NOTE_COUNT as i64 {
            self.loop_count = OPEN_LOOP;
        }
    }

    /// Applies the formula to `table`.
    ///
    /// Notes are processed starting at the formula's note and moving in the direction of the
    /// loop. Looping stops silently at either end of the table. References are resolved
    /// against the table as it is at the moment each note is processed, so earlier iterations
    /// are visible to later ones.
    ///
    /// Returns a `TuningError::NoteIndexOutOfRange` if a reference points outside of the
    /// table. The table may then be partially updated; [`crate::Scale::add_formula`] takes
    /// care of that.
    pub fn apply(&self, table: &mut [f64]) -> Result<(), TuningError> {
        let step = if self.loop_count >= 0 { 1 } else { -1 };
        let mut offset: i64 = 0;

        loop {
            let target = self.note_index as i64 + offset;
            let Some(index) = usize::try_from(target).ok().filter(|i| *i < table.len()) else {
                break;
            };
            trace!("applying formula of note {} to note {index}", self.note_index);

            if self.is_ensure() {
                let current = table[index];
                if current <= 0.0 {
                    warn!("ensuring {} Hz on muted note {index}", self.ensure_hz);
                }
                let factor = self.ensure_hz / current;
                table.iter_mut().for_each(|freq| *freq *= factor);
            } else {
                let range = self.range_hz.resolve(table, index)?;
                let shift = self.shift_hz.resolve(table, index)?;
                table[index] = range * self.mul / self.div * cents_to_factor(self.cents) + shift;
            }

            offset += step;
            if offset.unsigned_abs() >= self.loop_count.unsigned_abs() {
                break;
            }
        }

        Ok(())
    }
}

impl Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_ensure() {
            return write!(f, "!{}", self.ensure_hz);
        }

        let mut items = Vec::new();
        if self.range_hz != RefParam::RelRef(0) {
            items.push(format!("#{}", self.range_hz));
        }
        if self.mul != 1.0 {
            items.push(format!("*{}", self.mul));
        }
        if self.div != 1.0 {
            items.push(format!("/{}", self.div));
        }
        if self.cents != 0.0 {
            items.push(format!("%{}", self.cents));
        }
        if self.shift_hz != RefParam::Value(0.0) {
            items.push(format!("+{}", self.shift_hz));
        }
        if self.loop_count != 0 {
            items.push(format!("~{}", self.loop_count));
        }

        write!(f, "{}", items.join(" "))
    }
}
