//! Scaling decisions returned to the host.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pid::Skip;

/// Which way the count moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    None,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::None => "none",
        })
    }
}

/// The count the host should scale to, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingDecision {
    pub count: i64,
    pub direction: Direction,
    pub reason: String,
}

impl ScalingDecision {
    /// Decision for a computed count. The reason carries the raw controller
    /// output.
    pub fn from_output(count: i64, current: i64, raw_output: f64) -> Self {
        let direction = match count.cmp(&current) {
            Ordering::Equal => Direction::None,
            Ordering::Greater => Direction::Up,
            Ordering::Less => Direction::Down,
        };
        Self {
            count,
            direction,
            reason: format!("PID output: {raw_output:.6}"),
        }
    }

    /// Keep `current`. Used when there is nothing to act on yet.
    pub fn hold(current: i64, reason: impl Into<String>) -> Self {
        Self {
            count: current,
            direction: Direction::None,
            reason: reason.into(),
        }
    }

    /// First sample for a policy: baseline recorded, no control signal yet.
    pub fn baseline(current: i64) -> Self {
        Self::hold(
            current,
            "insufficient history: first sample recorded as baseline",
        )
    }

    /// Sample could not be used; controller state is unchanged.
    pub fn skipped(current: i64, skip: Skip) -> Self {
        let reason = match skip {
            Skip::NonPositiveInterval { dt } => format!(
                "insufficient history: sample is not newer than the previous one (dt = {dt})"
            ),
            Skip::NonFiniteValue { value } => {
                format!("insufficient history: metric value {value} is not finite")
            }
            Skip::NonFiniteSignal { value } => format!(
                "insufficient history: metric value {value} overflows the controller"
            ),
        };
        Self::hold(current, reason)
    }

    /// No samples were supplied.
    pub fn no_metrics(current: i64) -> Self {
        Self::hold(current, "no metric samples available")
    }
}
