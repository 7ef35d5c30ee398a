//! Grid alignment: every series is keyed on multiples of one resolution, and
//! fetch windows are widened outward onto that grid.

pub mod overlap;

use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use crate::error::AlignError;

pub use overlap::{OverlapOutcome, check_overlap};

/// Bucket width in whole seconds. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Resolution(NonZeroU64);

impl Resolution {
    pub fn new(seconds: u64) -> Result<Self, AlignError> {
        NonZeroU64::new(seconds).map(Self).ok_or(AlignError::ZeroStep)
    }

    pub fn seconds(self) -> u64 {
        self.0.get()
    }
}

impl TryFrom<u64> for Resolution {
    type Error = AlignError;

    fn try_from(seconds: u64) -> Result<Self, Self::Error> {
        Self::new(seconds)
    }
}

impl From<Resolution> for u64 {
    fn from(res: Resolution) -> Self {
        res.seconds()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.seconds())
    }
}

/// Largest multiple of `step` that is `<= t`.
pub fn align_down(t: u64, step: Resolution) -> u64 {
    let step = step.seconds();
    (t / step) * step
}

/// Smallest multiple of `step` that is `>= t`.
///
/// Overflows for `t` within one step of `u64::MAX`, far past any epoch time.
pub fn align_up(t: u64, step: Resolution) -> u64 {
    let down = align_down(t, step);
    if down == t { t } else { down + step.seconds() }
}

/// A `[start, end]` interval whose bounds both sit on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementWindow {
    start: u64,
    end: u64,
    step: Resolution,
}

impl MeasurementWindow {
    /// Widen an observed wall-clock interval onto the grid. The result always
    /// contains `[start, end]`.
    pub fn enclosing(start: u64, end: u64, step: Resolution) -> Result<Self, AlignError> {
        if start > end {
            return Err(AlignError::Inverted { start, end });
        }
        Ok(Self {
            start: align_down(start, step),
            end: align_up(end, step),
            step,
        })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn step(&self) -> Resolution {
        self.step
    }

    /// Width in seconds; always a multiple of the step.
    pub fn width(&self) -> u64 {
        self.end - self.start
    }

    pub fn contains(&self, t: u64) -> bool {
        self.start <= t && t <= self.end
    }
}

impl fmt::Display for MeasurementWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}] step {}", self.start, self.end, self.step)
    }
}
