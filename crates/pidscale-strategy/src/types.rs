//! Inputs handed to the strategy by its host.
//!
//! The host fetches metrics and knows the current count; the strategy only
//! sees the values below. All types are serializable so hosts can pass them
//! over JSON.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single metric observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl MetricSample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// The strategy block of a scaling check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckStrategy {
    /// Strategy plugin name, e.g. `pid`.
    pub name: String,
    /// Per-check configuration, highest precedence layer.
    #[serde(default)]
    pub config: HashMap<String, String>,
}

/// One recurring scaling check as described by the host.
///
/// None of these fields is a stable identifier on its own; see
/// [`PolicyKey::derive`](crate::PolicyKey::derive).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalingCheck {
    /// Metric source (APM plugin) name.
    #[serde(default)]
    pub source: String,
    /// Raw query text sent to the metric source.
    #[serde(default)]
    pub query: String,
    /// Policy group the check belongs to.
    #[serde(default)]
    pub group: String,
    /// Check name.
    #[serde(default)]
    pub name: String,
    pub strategy: CheckStrategy,
}

/// A scaling check together with the metrics fetched for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingCheckEvaluation {
    pub check: ScalingCheck,
    /// Time-ordered samples, oldest first. May be empty.
    #[serde(default)]
    pub metrics: Vec<MetricSample>,
}

impl ScalingCheckEvaluation {
    /// The most recent sample, which is the only one the controller consumes.
    pub fn latest(&self) -> Option<&MetricSample> {
        self.metrics.last()
    }
}
