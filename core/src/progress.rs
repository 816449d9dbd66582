//! Adherence classification over a window of daily totals.
//!
//! The classifier is a pure function: it never touches the store. Message
//! wording belongs to the presentation layer; this module stops at a
//! category plus the numbers a message would interpolate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::DailyConsumption;

/// Policy constants that set how strict the classification is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressThresholds {
    /// Minimum share of days at or under goal (percent) to count as on track.
    pub min_pct_met: i64,
    /// Average may exceed the goal by this factor and still be on track.
    pub avg_tolerance: f64,
}

impl Default for ProgressThresholds {
    fn default() -> Self {
        Self {
            min_pct_met: 80,
            avg_tolerance: 1.05,
        }
    }
}

impl ProgressThresholds {
    /// Reject values that would silently change what the categories mean.
    pub fn validate(&self) -> Result<()> {
        if !(0..=100).contains(&self.min_pct_met) {
            return Err(Error::validation(format!(
                "min_pct_met must be between 0 and 100 (got {})",
                self.min_pct_met
            )));
        }
        if !self.avg_tolerance.is_finite() || self.avg_tolerance <= 0.0 {
            return Err(Error::validation(format!(
                "avg_tolerance must be a positive number (got {})",
                self.avg_tolerance
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressCategory {
    OnTrack,
    SlightlyOver,
    NeedsAttention,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum Progress {
    OnTrack {
        #[serde(rename = "pctMet")]
        pct_met: i64,
    },
    SlightlyOver {
        avg: i64,
        goal: i64,
    },
    NeedsAttention {
        avg: i64,
        goal: i64,
        #[serde(rename = "pctOver")]
        pct_over: i64,
    },
    InsufficientData,
}

impl Progress {
    #[must_use]
    pub fn category(&self) -> ProgressCategory {
        match self {
            Self::OnTrack { .. } => ProgressCategory::OnTrack,
            Self::SlightlyOver { .. } => ProgressCategory::SlightlyOver,
            Self::NeedsAttention { .. } => ProgressCategory::NeedsAttention,
            Self::InsufficientData => ProgressCategory::InsufficientData,
        }
    }
}

/// One day's total, as fed to [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub consumed: i64,
}

impl From<&DailyConsumption> for DayTotal {
    fn from(row: &DailyConsumption) -> Self {
        Self {
            date: row.date,
            consumed: row.consumed,
        }
    }
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn classify(totals: &[DayTotal], goal: i64, thresholds: &ProgressThresholds) -> Progress {
    if totals.is_empty() {
        return Progress::InsufficientData;
    }

    let days = totals.len() as f64;
    // Widened so no window of i64 totals can overflow.
    let sum: i128 = totals.iter().map(|t| i128::from(t.consumed)).sum();
    let met = totals.iter().filter(|t| t.consumed <= goal).count();

    let avg = (sum as f64 / days).round() as i64;
    let pct_met = (100.0 * met as f64 / days).round() as i64;
    let ceiling = goal as f64 * thresholds.avg_tolerance;

    if pct_met >= thresholds.min_pct_met && avg as f64 <= ceiling {
        Progress::OnTrack { pct_met }
    } else if avg as f64 > ceiling {
        let divisor = goal.max(1);
        let pct_over = (100.0 * (avg as f64 - goal as f64) / divisor as f64).round() as i64;
        Progress::NeedsAttention {
            avg,
            goal,
            pct_over,
        }
    } else {
        Progress::SlightlyOver { avg, goal }
    }
}

/// Convenience wrapper over stored rows.
#[must_use]
pub fn classify_rows(
    rows: &[DailyConsumption],
    goal: i64,
    thresholds: &ProgressThresholds,
) -> Progress {
    let totals: Vec<DayTotal> = rows.iter().map(DayTotal::from).collect();
    classify(&totals, goal, thresholds)
}
