//! Single-field codecs: reals, integers, and vary flags.
//!
//! Decoding accepts the notations found in legacy parameter files, including
//! exponents written without their marker letter (`5.00000-5`). Encoding always
//! produces a string exactly as wide as the field, and refuses to drop a
//! significant digit: if a value cannot be written in the field without losing
//! precision, a [`CardError::FieldOverflow`] is returned.
use std::fmt::Display;

use ryu_floating_decimal::d2d;

use crate::card_error::{CardError, CResult};
use crate::parsing::parse_real;

/// Whether and how a parameter takes part in a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VaryFlag {
    /// Take the value from another source (code -2).
    UseFromOthers,
    /// Take the value from the parameter file (code -1).
    UseFromParfile,
    /// Hold fixed (code 0).
    #[default]
    No,
    /// Vary in the fit (code 1).
    Yes,
    /// Propagate uncertainty without varying (code 3).
    Pup,
}

impl VaryFlag {
    /// The integer code written in flag columns.
    pub fn code(&self) -> i64 {
        match self {
            VaryFlag::UseFromOthers => -2,
            VaryFlag::UseFromParfile => -1,
            VaryFlag::No => 0,
            VaryFlag::Yes => 1,
            VaryFlag::Pup => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -2 => Some(VaryFlag::UseFromOthers),
            -1 => Some(VaryFlag::UseFromParfile),
            0 => Some(VaryFlag::No),
            1 => Some(VaryFlag::Yes),
            3 => Some(VaryFlag::Pup),
            _ => None
        }
    }

    /// True for flags that make the fitter touch the parameter (`YES` or `PUP`).
    pub fn is_varied(&self) -> bool {
        matches!(self, VaryFlag::Yes | VaryFlag::Pup)
    }
}

impl Display for VaryFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Decode a real field. A blank field is `None`; anything else must be a number.
pub fn decode_float(raw: &str) -> CResult<Option<f64>> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(None)
    }
    parse_real(s).map(Some)
}

/// Decode an integer field. A blank field is `None`.
pub fn decode_int(raw: &str) -> CResult<Option<i64>> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(None)
    }
    s.parse::<i64>()
        .map(Some)
        .map_err(|e| CardError::NumericFormat { text: s.to_owned(), reason: e.to_string() })
}

/// Decode a flag field. A blank field means [`VaryFlag::No`].
pub fn decode_flag(raw: &str) -> CResult<VaryFlag> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(VaryFlag::No)
    }
    s.parse::<i64>()
        .ok()
        .and_then(VaryFlag::from_code)
        .ok_or_else(|| CardError::InvalidFlag { text: s.to_owned() })
}

/// Encode a real right-aligned in exactly `width` columns.
///
/// Scientific notation with `precision` digits after the decimal point is preferred
/// (more are used if the value needs them to round trip). If that is too wide, the
/// shortest scientific form and then fixed notation are tried.
pub fn encode_float(value: f64, width: usize, precision: usize) -> CResult<String> {
    if !value.is_finite() {
        return Err(CardError::FieldOverflow { value: value.to_string(), width })
    }

    let digits = Digits::of(value);
    let candidates = [
        digits.scientific(precision),
        digits.scientific(0),
        digits.fixed(),
        digits.fixed_compact(),
    ];

    candidates.into_iter()
        .find(|s| s.len() <= width)
        .map(|s| format!("{s:>width$}"))
        .ok_or_else(|| CardError::FieldOverflow { value: value.to_string(), width })
}

/// Encode an integer right-aligned in exactly `width` columns.
pub fn encode_int(value: i64, width: usize) -> CResult<String> {
    let mut b = itoa::Buffer::new();
    let s = b.format(value);
    if s.len() > width {
        return Err(CardError::FieldOverflow { value: s.to_owned(), width })
    }
    Ok(format!("{s:>width$}"))
}

/// Encode a flag right-aligned in exactly `width` columns.
///
/// Negative codes need two columns, so they overflow one-column flag fields.
pub fn encode_flag(flag: VaryFlag, width: usize) -> CResult<String> {
    encode_int(flag.code(), width)
}

/// Encode text left-aligned in exactly `width` columns.
pub fn encode_text(value: &str, width: usize) -> CResult<String> {
    if value.chars().count() > width {
        return Err(CardError::FieldOverflow { value: value.to_owned(), width })
    }
    Ok(format!("{value:<width$}"))
}

/// The shortest decimal digits that round trip a float: `value = ±digits × 10^exponent`.
struct Digits {
    negative: bool,
    digits: String,
    exponent: i32,
}

impl Digits {
    fn of(value: f64) -> Self {
        let negative = value < 0.0;
        if value == 0.0 {
            return Self { negative: false, digits: "0".to_owned(), exponent: 0 }
        }

        let v = d2d(value.abs());
        let mut mantissa = v.mantissa;
        let mut exponent = v.exponent;
        while mantissa != 0 && mantissa % 10 == 0 {
            mantissa /= 10;
            exponent += 1;
        }

        let mut b = itoa::Buffer::new();
        Self { negative, digits: b.format(mantissa).to_owned(), exponent }
    }

    fn sign(&self) -> &'static str {
        if self.negative { "-" } else { "" }
    }

    /// d.dddE±XX with at least `min_frac` digits after the point
    fn scientific(&self, min_frac: usize) -> String {
        let (lead, frac) = self.digits.split_at(1);
        let n_frac = min_frac.max(frac.len());
        let exp10 = if self.digits == "0" { 0 } else { self.exponent + frac.len() as i32 };
        let exp_sign = if exp10 < 0 { '-' } else { '+' };

        let mut b = itoa::Buffer::new();
        let exp_digits = b.format(exp10.unsigned_abs());

        format!("{}{lead}.{frac:0<n_frac$}E{exp_sign}{exp_digits:0>2}", self.sign())
    }

    /// Plain decimal notation, with at least one digit on each side of the point
    fn fixed(&self) -> String {
        let n = self.digits.len() as i32;
        if self.exponent >= 0 {
            let zeros = "0".repeat(self.exponent as usize);
            format!("{}{}{zeros}.0", self.sign(), self.digits)
        } else if n + self.exponent > 0 {
            let (int_part, frac_part) = self.digits.split_at((n + self.exponent) as usize);
            format!("{}{int_part}.{frac_part}", self.sign())
        } else {
            let zeros = "0".repeat((-self.exponent - n) as usize);
            format!("{}0.{zeros}{}", self.sign(), self.digits)
        }
    }

    /// Decimal notation without the optional zeros ("16." rather than "16.0", ".5" rather than "0.5")
    fn fixed_compact(&self) -> String {
        let s = self.fixed();
        let s = s.strip_suffix(".0").map(|s| format!("{s}.")).unwrap_or(s);
        if let Some(rest) = s.strip_prefix("-0.") {
            format!("-.{rest}")
        } else if let Some(rest) = s.strip_prefix("0.") {
            if rest.is_empty() { s } else { format!(".{rest}") }
        } else {
            s
        }
    }
}
