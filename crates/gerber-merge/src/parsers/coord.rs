use std::fmt;

use serde::Serialize;

use crate::error::MergeError;

/// Largest digit count a format field may declare.
const MAX_DIGITS: u8 = 9;

/// Scaled values this close to an integer are that integer; the rest is
/// float error from decode or a transform, not precision.
const SNAP_EPSILON: f64 = 1e-6;

/// Digit layout of a fixed-point coordinate.
///
/// `%FSTAX24Y24*%` gives 2 integer + 4 fractional digits per axis, so the
/// digit run `12345` decodes to `1.2345`. Excellon's `METRIC,TZ,000.000`
/// gives 3 + 3, shared by both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FixedPointFormat {
    pub integer_digits: u8,
    pub fractional_digits: u8,
}

impl FixedPointFormat {
    pub fn new(integer_digits: u8, fractional_digits: u8) -> Result<Self, MergeError> {
        if integer_digits > MAX_DIGITS || fractional_digits > MAX_DIGITS {
            return Err(MergeError::malformed(
                "format digit count",
                format!("{integer_digits}.{fractional_digits}"),
            ));
        }
        Ok(Self {
            integer_digits,
            fractional_digits,
        })
    }

    /// Parse a two-digit `%FS` field such as `24`.
    pub fn from_digit_pair(field: &str) -> Result<Self, MergeError> {
        let mut digits = field.chars().map(|c| c.to_digit(10));
        match (digits.next(), digits.next(), digits.next()) {
            (Some(Some(integer)), Some(Some(fractional)), None) => {
                Self::new(integer as u8, fractional as u8)
            }
            _ => Err(MergeError::malformed("format digit pair", field)),
        }
    }

    /// Derive the layout from an Excellon template such as `000.000`: the
    /// digit counts on either side of the decimal point.
    pub fn from_template(template: &str) -> Result<Self, MergeError> {
        let (before, after) = template.split_once('.').unwrap_or((template, ""));
        let count = |part: &str| {
            u8::try_from(part.len())
                .map_err(|_| MergeError::malformed("format template", template))
        };
        Self::new(count(before)?, count(after)?)
    }

    /// Excellon template for this layout, e.g. `000.000`.
    pub fn template(&self) -> String {
        format!(
            "{}.{}",
            "0".repeat(self.integer_digits as usize),
            "0".repeat(self.fractional_digits as usize)
        )
    }

    fn scale(&self) -> f64 {
        10f64.powi(self.fractional_digits as i32)
    }

    /// Decode an optionally signed digit run into a value in document units.
    pub fn decode(&self, digits: &str) -> Result<f64, MergeError> {
        let raw: i64 = digits
            .parse()
            .map_err(|_| MergeError::malformed("coordinate digits", digits))?;
        Ok(raw as f64 / self.scale())
    }

    /// Encode a value back to its digit run. Precision finer than the
    /// format's resolution is truncated toward zero.
    pub fn encode(&self, value: f64) -> i64 {
        let scaled = value * self.scale();
        let nearest = scaled.round();
        if (scaled - nearest).abs() < SNAP_EPSILON {
            nearest as i64
        } else {
            scaled.trunc() as i64
        }
    }
}

impl fmt::Display for FixedPointFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.integer_digits, self.fractional_digits)
    }
}

/// Unit system declared by `%MO` (Gerber) or `METRIC`/`INCH` (Excellon).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Inch,
    Millimetre,
}

impl Units {
    /// Gerber `%MO` code: `MM` or `IN`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "MM" => Some(Self::Millimetre),
            "IN" => Some(Self::Inch),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Millimetre => "MM",
            Self::Inch => "IN",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Millimetre => f.write_str("mm"),
            Self::Inch => f.write_str("inch"),
        }
    }
}
