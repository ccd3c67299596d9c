//! Discrete-time PID controller.
//!
//! ```text
//! dt          = (t - t_prev) / time_divider
//! error       = target - value
//! integral   += error * dt
//! derivative  = (error - error_prev) / dt
//! output      = kp * error + ki * integral + kd * derivative
//! ```
//!
//! The first sample seen for a policy only records the baseline: there is no
//! previous timestamp to measure `dt` against. Samples with `dt <= 0`, and
//! samples whose error, integral or output would not be finite, are dropped
//! without touching the accumulators.

use chrono::{DateTime, Utc};

use crate::config::ControllerConfig;
use crate::types::MetricSample;

/// Controller state for a single policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyState {
    config: ControllerConfig,
    has_baseline: bool,
    last_timestamp: Option<DateTime<Utc>>,
    last_error: f64,
    integral: f64,
}

impl PolicyState {
    /// Fresh state with no baseline.
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            has_baseline: false,
            last_timestamp: None,
            last_error: 0.0,
            integral: 0.0,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn has_baseline(&self) -> bool {
        self.has_baseline
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    pub fn last_error(&self) -> f64 {
        self.last_error
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }
}

/// Why a sample produced no control signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Skip {
    /// Sample timestamp is not after the previous one.
    NonPositiveInterval { dt: f64 },
    /// Sample value is NaN or infinite.
    NonFiniteValue { value: f64 },
    /// Error, integral or output overflowed for this sample.
    NonFiniteSignal { value: f64 },
}

/// Result of feeding one sample to the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Advance {
    /// First usable sample for this policy; the baseline is now set.
    Baseline,
    /// Sample was not actionable. State is unchanged.
    Skipped(Skip),
    /// Raw control signal.
    Output(f64),
}

/// Feed `sample` into `state`.
///
/// State is only written on [`Advance::Baseline`] and [`Advance::Output`],
/// and every field is written together.
pub fn advance(state: &mut PolicyState, sample: &MetricSample) -> Advance {
    if !sample.value.is_finite() {
        return Advance::Skipped(Skip::NonFiniteValue {
            value: sample.value,
        });
    }

    let error = state.config.target - sample.value;
    if !error.is_finite() {
        return Advance::Skipped(Skip::NonFiniteSignal {
            value: sample.value,
        });
    }

    let last_timestamp = match (state.has_baseline, state.last_timestamp) {
        (true, Some(t)) => t,
        _ => {
            state.last_timestamp = Some(sample.timestamp);
            state.last_error = error;
            state.has_baseline = true;
            return Advance::Baseline;
        }
    };

    let dt = elapsed_units(sample.timestamp, last_timestamp, &state.config);
    if dt <= 0.0 {
        return Advance::Skipped(Skip::NonPositiveInterval { dt });
    }

    let config = &state.config;
    let integral = state.integral + error * dt;
    let derivative = (error - state.last_error) / dt;
    let output = config.kp * error + config.ki * integral + config.kd * derivative;
    if !integral.is_finite() || !output.is_finite() {
        return Advance::Skipped(Skip::NonFiniteSignal {
            value: sample.value,
        });
    }

    state.integral = integral;
    state.last_error = error;
    state.last_timestamp = Some(sample.timestamp);

    Advance::Output(output)
}

/// Elapsed time between `from` and `to`, in units of the time divider.
fn elapsed_units(to: DateTime<Utc>, from: DateTime<Utc>, config: &ControllerConfig) -> f64 {
    let elapsed = to - from;
    let divider_ns = config.time_divider.as_nanos() as f64;
    match elapsed.num_nanoseconds() {
        Some(ns) => ns as f64 / divider_ns,
        // Only reachable for gaps of roughly 292 years or more.
        None => elapsed.num_seconds() as f64 * 1e9 / divider_ns,
    }
}
