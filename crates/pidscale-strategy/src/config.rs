//! Strategy configuration: layered string maps resolved into a typed
//! [`ControllerConfig`].
//!
//! # Precedence
//!
//! ```text
//! built-in defaults  <  plugin-wide config (set_config)  <  per-check config
//! ```
//!
//! Each layer is a flat `key → string` map; a later layer overwrites keys
//! present in an earlier one. Resolution parses every field of the merged
//! map independently and fails on the first field that does not parse or
//! validate.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const KEY_TARGET: &str = "target";
pub const KEY_KP: &str = "proportional_factor";
pub const KEY_KI: &str = "integral_factor";
pub const KEY_KD: &str = "derivative_factor";
pub const KEY_TIME_DIVIDER_NS: &str = "time_divider_ns";
pub const KEY_OUTPUT_COEFFICIENTS: &str = "output_coefficients";
pub const KEY_OUTPUT_QUANTIFICATION: &str = "output_quantification";
pub const KEY_OUTPUT_CLAMP_MAX: &str = "output_clamp_max";
pub const KEY_OUTPUT_CLAMP_MIN: &str = "output_clamp_min";
pub const KEY_OUTPUT_DEAD_ZONE: &str = "output_dead_zone";

/// Built-in defaults, the lowest-precedence layer.
pub const DEFAULTS: [(&str, &str); 10] = [
    (KEY_TARGET, "0.0"),
    (KEY_KP, "1.0"),
    (KEY_KI, "0.0"),
    (KEY_KD, "0.0"),
    (KEY_TIME_DIVIDER_NS, "1000000000"),
    (KEY_OUTPUT_COEFFICIENTS, "0.0, 1.0"),
    (KEY_OUTPUT_QUANTIFICATION, "round"),
    (KEY_OUTPUT_CLAMP_MAX, "1000.0"),
    (KEY_OUTPUT_CLAMP_MIN, "0.0"),
    (KEY_OUTPUT_DEAD_ZONE, "0"),
];

fn default_for(key: &str) -> &'static str {
    DEFAULTS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
        .unwrap_or_default()
}

// ── Layers ─────────────────────────────────────────────────────────

/// One flat configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    values: HashMap<String, String>,
}

impl ConfigLayer {
    /// An empty layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in defaults as a layer.
    pub fn defaults() -> Self {
        DEFAULTS.iter().copied().collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Return a new layer with `over` applied on top of `self`.
    pub fn merged(&self, over: &ConfigLayer) -> ConfigLayer {
        let mut values = self.values.clone();
        values.extend(over.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        ConfigLayer { values }
    }

    /// Value for `key`, falling back to the built-in default.
    fn raw(&self, key: &'static str) -> &str {
        self.get(key).unwrap_or_else(|| default_for(key))
    }
}

impl From<HashMap<String, String>> for ConfigLayer {
    fn from(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConfigLayer {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ── Typed config ───────────────────────────────────────────────────

/// How the clamped transform output is turned into an integer count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizationMode {
    /// Toward negative infinity.
    Floor,
    /// Toward positive infinity.
    Ceil,
    /// Nearest integer, halves away from zero.
    Round,
    /// Nearest integer, halves to the even neighbour.
    RoundToEven,
}

impl QuantizationMode {
    /// Round `value` to an integral `f64` according to this mode.
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Self::Floor => value.floor(),
            Self::Ceil => value.ceil(),
            Self::Round => value.round(),
            Self::RoundToEven => value.round_ties_even(),
        }
    }
}

impl FromStr for QuantizationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "floor" => Ok(Self::Floor),
            "ceil" | "ceiling" => Ok(Self::Ceil),
            "round" => Ok(Self::Round),
            "round_to_even" => Ok(Self::RoundToEven),
            _ => Err(ConfigError::UnknownQuantization {
                key: KEY_OUTPUT_QUANTIFICATION,
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for QuantizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Round => "round",
            Self::RoundToEven => "round_to_even",
        })
    }
}

/// Fully parsed, validated controller parameters for one policy.
///
/// Immutable once resolved; a policy keeps the config it was created with.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Setpoint the controller drives the metric toward.
    pub target: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Elapsed time is divided by this to get the controller's `dt`.
    pub time_divider: Duration,
    /// Output polynomial, index = power, constant term first. Never empty.
    pub output_coefficients: Vec<f64>,
    pub quantization: QuantizationMode,
    pub count_max: f64,
    pub count_min: f64,
    pub dead_zone: i64,
}

impl ControllerConfig {
    /// Parse and validate a (merged) layer. Keys missing from the layer fall
    /// back to the built-in defaults.
    pub fn from_layer(layer: &ConfigLayer) -> Result<Self, ConfigError> {
        let target = parse_f64(layer, KEY_TARGET)?;
        let kp = parse_f64(layer, KEY_KP)?;
        let ki = parse_f64(layer, KEY_KI)?;
        let kd = parse_f64(layer, KEY_KD)?;

        let divider_ns = parse_i64(layer, KEY_TIME_DIVIDER_NS)?;
        if divider_ns <= 0 {
            return Err(ConfigError::NonPositive {
                key: KEY_TIME_DIVIDER_NS,
                value: layer.raw(KEY_TIME_DIVIDER_NS).to_string(),
            });
        }
        let time_divider = Duration::from_nanos(divider_ns.unsigned_abs());

        let output_coefficients = parse_coefficients(layer)?;

        let quantization: QuantizationMode = layer.raw(KEY_OUTPUT_QUANTIFICATION).parse()?;

        let count_max = parse_f64(layer, KEY_OUTPUT_CLAMP_MAX)?;
        let count_min = parse_f64(layer, KEY_OUTPUT_CLAMP_MIN)?;
        if count_max < count_min {
            return Err(ConfigError::Conflict {
                max_key: KEY_OUTPUT_CLAMP_MAX,
                max: layer.raw(KEY_OUTPUT_CLAMP_MAX).to_string(),
                min_key: KEY_OUTPUT_CLAMP_MIN,
                min: layer.raw(KEY_OUTPUT_CLAMP_MIN).to_string(),
            });
        }

        let dead_zone = parse_i64(layer, KEY_OUTPUT_DEAD_ZONE)?;

        Ok(Self {
            target,
            kp,
            ki,
            kd,
            time_divider,
            output_coefficients,
            quantization,
            count_max,
            count_min,
            dead_zone,
        })
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            target: 0.0,
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
            time_divider: Duration::from_secs(1),
            output_coefficients: vec![0.0, 1.0],
            quantization: QuantizationMode::Round,
            count_max: 1000.0,
            count_min: 0.0,
            dead_zone: 0,
        }
    }
}

fn parse_f64(layer: &ConfigLayer, key: &'static str) -> Result<f64, ConfigError> {
    let raw = layer.raw(key);
    let value: f64 = raw.trim().parse().map_err(|e: std::num::ParseFloatError| {
        ConfigError::Parse {
            key,
            value: raw.to_string(),
            reason: e.to_string(),
        }
    })?;
    if value.is_nan() {
        return Err(ConfigError::NotANumber {
            key,
            value: raw.to_string(),
        });
    }
    Ok(value)
}

fn parse_i64(layer: &ConfigLayer, key: &'static str) -> Result<i64, ConfigError> {
    let raw = layer.raw(key);
    raw.trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| ConfigError::Parse {
            key,
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

fn parse_coefficients(layer: &ConfigLayer) -> Result<Vec<f64>, ConfigError> {
    let raw = layer.raw(KEY_OUTPUT_COEFFICIENTS);
    if raw.trim().is_empty() {
        return Err(ConfigError::EmptyCoefficients {
            key: KEY_OUTPUT_COEFFICIENTS,
            value: raw.to_string(),
        });
    }

    raw.split(',')
        .map(|part| {
            let value: f64 = part.trim().parse().map_err(|e: std::num::ParseFloatError| {
                ConfigError::Parse {
                    key: KEY_OUTPUT_COEFFICIENTS,
                    value: raw.to_string(),
                    reason: format!("{:?}: {e}", part.trim()),
                }
            })?;
            if value.is_nan() {
                return Err(ConfigError::NotANumber {
                    key: KEY_OUTPUT_COEFFICIENTS,
                    value: raw.to_string(),
                });
            }
            Ok(value)
        })
        .collect()
}

// ── Resolver ───────────────────────────────────────────────────────

/// Holds the plugin-wide layer and resolves per-check configs on top of it.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    /// Defaults with the plugin-wide layer already applied.
    base: ConfigLayer,
}

impl ConfigResolver {
    /// A resolver with only the built-in defaults.
    pub fn new() -> Self {
        Self {
            base: ConfigLayer::defaults(),
        }
    }

    /// Replace the plugin-wide layer. Previous plugin-wide values are
    /// discarded, not merged.
    pub fn set_plugin_config(&mut self, plugin: ConfigLayer) {
        self.base = ConfigLayer::defaults().merged(&plugin);
    }

    /// Merge `per_check` over the base layers and parse the result.
    pub fn resolve(&self, per_check: &ConfigLayer) -> Result<ControllerConfig, ConfigError> {
        ControllerConfig::from_layer(&self.base.merged(per_check))
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}
