//! Points on the media timeline.
//!
//! A [`Timecode`] is either a finite instant, stored as whole microseconds, or
//! the [`Timecode::END`] sentinel meaning "until the end of the media". The
//! sentinel is a separate variant rather than a huge number, so it orders after
//! every finite value, never takes part in arithmetic, and has no numeric
//! string form.
//!
//! Finite values cover `00:00:00.000000` through `99:59:59.999999`, which is
//! exactly the set the `[[HH:]MM:]SS[.ffffff]` grammar can express, so
//! `parse(format(t)) == t` holds for every finite value. Precision is one
//! microsecond; conversions from longer decimal or floating-point inputs round
//! to the nearest microsecond and are lossy beyond that.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Microseconds in one second.
pub const MICROS_PER_SECOND: u64 = 1_000_000;

const MICROS_PER_MINUTE: u64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: u64 = 60 * MICROS_PER_MINUTE;

/// Largest representable finite instant, `99:59:59.999999`.
pub const MAX_MICROS: u64 = 100 * MICROS_PER_HOUR - 1;

static TIMECODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:([0-9]{1,2}):)?([0-5]?[0-9]):)?([0-5]?[0-9])(?:\.([0-9]{1,6}))?$")
        .expect("timecode pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Repr {
    Finite(u64),
    End,
}

/// An immutable instant on the media timeline.
///
/// Ordering is total: finite values compare by time and [`Timecode::END`]
/// is greater than all of them and equal only to itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timecode(Repr);

impl Timecode {
    /// The start of the media.
    pub const ZERO: Timecode = Timecode(Repr::Finite(0));

    /// Open-ended "until the end of the media".
    pub const END: Timecode = Timecode(Repr::End);

    /// Build a finite timecode from whole microseconds.
    pub fn from_micros(micros: u64) -> Result<Self> {
        if micros > MAX_MICROS {
            return Err(Error::Range(format!(
                "{micros}us exceeds the maximum of 99:59:59.999999"
            )));
        }
        Ok(Timecode(Repr::Finite(micros)))
    }

    /// Build a finite timecode from floating-point seconds, rounded to the
    /// nearest microsecond.
    pub fn from_secs_f64(secs: f64) -> Result<Self> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(Error::Range(format!("{secs} is not a non-negative number of seconds")));
        }
        let micros = (secs * MICROS_PER_SECOND as f64).round();
        if micros > MAX_MICROS as f64 {
            return Err(Error::Range(format!(
                "{secs}s exceeds the maximum of 99:59:59.999999"
            )));
        }
        Self::from_micros(micros as u64)
    }

    /// Build a finite timecode from a decimal seconds string such as the
    /// engine's `61.033333`, without going through floating point.
    ///
    /// Digits past the sixth fractional place round half-up.
    pub fn from_seconds_str(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.starts_with('-') {
            return Err(Error::Range(format!("negative seconds: {text}")));
        }

        let (whole, frac) = text.split_once('.').unwrap_or((text, ""));
        let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !digits_only(whole) || !digits_only(frac) {
            return Err(Error::Parse(text.to_string()));
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| Error::Range(format!("{text}s is too large")))?
        };

        let frac = frac.as_bytes();
        let mut frac_micros = 0u64;
        for i in 0..6 {
            let digit = frac.get(i).map_or(0, |b| u64::from(b - b'0'));
            frac_micros = frac_micros * 10 + digit;
        }
        let round_up = u64::from(frac.get(6).is_some_and(|b| *b >= b'5'));

        let micros = whole
            .checked_mul(MICROS_PER_SECOND)
            .and_then(|m| m.checked_add(frac_micros + round_up))
            .ok_or_else(|| Error::Range(format!("{text}s is too large")))?;

        Self::from_micros(micros)
    }

    /// Whether this is the end-of-media sentinel.
    pub fn is_end(&self) -> bool {
        matches!(self.0, Repr::End)
    }

    /// Whole microseconds, or `None` for [`Timecode::END`].
    pub fn as_micros(&self) -> Option<u64> {
        match self.0 {
            Repr::Finite(us) => Some(us),
            Repr::End => None,
        }
    }

    /// Seconds as a float, or `None` for [`Timecode::END`].
    pub fn as_secs_f64(&self) -> Option<f64> {
        self.as_micros()
            .map(|us| us as f64 / MICROS_PER_SECOND as f64)
    }

    /// `self - rhs`, saturating at [`Timecode::ZERO`].
    ///
    /// Fails when either operand is [`Timecode::END`].
    pub fn saturating_sub(&self, rhs: Timecode) -> Result<Timecode> {
        match (self.0, rhs.0) {
            (Repr::Finite(a), Repr::Finite(b)) => Ok(Timecode(Repr::Finite(a.saturating_sub(b)))),
            _ => Err(Error::Range(
                "the end-of-media timecode has no numeric value".into(),
            )),
        }
    }

    /// Canonical `HH:MM:SS.ffffff` rendering.
    ///
    /// Fails for [`Timecode::END`], which must never reach an engine command
    /// line as a number.
    pub fn format(&self) -> Result<String> {
        let Repr::Finite(us) = self.0 else {
            return Err(Error::Range(
                "the end-of-media timecode has no numeric representation".into(),
            ));
        };

        let hours = us / MICROS_PER_HOUR;
        let minutes = (us % MICROS_PER_HOUR) / MICROS_PER_MINUTE;
        let seconds = (us % MICROS_PER_MINUTE) / MICROS_PER_SECOND;
        let micros = us % MICROS_PER_SECOND;

        Ok(format!("{hours:02}:{minutes:02}:{seconds:02}.{micros:06}"))
    }
}

impl Default for Timecode {
    fn default() -> Self {
        Timecode::ZERO
    }
}

impl FromStr for Timecode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        let caps = TIMECODE_RE
            .captures(text)
            .ok_or_else(|| Error::Parse(s.to_string()))?;

        let field = |i: usize| -> u64 {
            caps.get(i)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0)
        };

        let hours = field(1);
        let minutes = field(2);
        let seconds = field(3);
        let micros = caps.get(4).map_or(0, |m| {
            // Right-pad to six digits: ".5" is half a second.
            let frac = m.as_str();
            let value: u64 = frac.parse().unwrap_or(0);
            value * 10u64.pow(6 - frac.len() as u32)
        });

        Timecode::from_micros(
            hours * MICROS_PER_HOUR
                + minutes * MICROS_PER_MINUTE
                + seconds * MICROS_PER_SECOND
                + micros,
        )
    }
}

/// Renders finite values canonically and the sentinel as `end`.
impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format() {
            Ok(text) => f.write_str(&text),
            Err(_) => f.write_str("end"),
        }
    }
}
