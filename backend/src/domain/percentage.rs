//! Completion percentages bounded to `[0, 100]`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a value falls outside `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("percentage {value} must be a finite number between 0 and 100")]
pub struct PercentageError {
    /// The rejected value.
    pub value: f64,
}

/// Highest value a ratio short of complete may round to.
const MAX_PARTIAL: f64 = 99.99;

/// A completion percentage rounded to two decimal places.
///
/// # Examples
/// ```
/// use lms_backend::domain::Percentage;
///
/// let pct = Percentage::from_ratio(2, 3).expect("non-zero total");
/// assert_eq!(pct.value(), 66.67);
/// assert!(Percentage::from_ratio(0, 0).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Percentage(f64);

impl Percentage {
    /// Nothing completed.
    pub const ZERO: Self = Self(0.0);
    /// Everything completed.
    pub const FULL: Self = Self(100.0);

    /// Validate and wrap a raw value.
    pub fn try_new(value: f64) -> Result<Self, PercentageError> {
        if value.is_finite() && (0.0..=100.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(PercentageError { value })
        }
    }

    /// Compute `completed / total * 100` rounded to two decimal places.
    ///
    /// The result is 100 only when `completed == total`. Returns `None` when `total` is zero so callers choose the fallback.
    /// `completed` is clamped to `total`.
    pub fn from_ratio(completed: u64, total: u64) -> Option<Self> {
        if total == 0 {
            return None;
        }
        let completed = completed.min(total);
        if completed == total {
            return Some(Self::FULL);
        }
        let raw = completed as f64 / total as f64 * 100.0;
        // Only a full ratio may read as 100; large totals would otherwise
        // round 99.995 up.
        Some(Self(((raw * 100.0).round() / 100.0).min(MAX_PARTIAL)))
    }

    /// Underlying value in `[0, 100]`.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Whether the value is exactly 100.
    pub fn is_complete(self) -> bool {
        self.0 >= 100.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.0)
    }
}

impl TryFrom<f64> for Percentage {
    type Error = PercentageError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<Percentage> for f64 {
    fn from(value: Percentage) -> Self {
        value.0
    }
}
