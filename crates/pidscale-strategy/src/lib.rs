//! pidscale-strategy — PID-driven target counts for autoscaled pools.
//!
//! Converts a stream of metric samples into the resource count a pool
//! should run, keeping controller state per policy across calls. Fetching
//! metrics and applying counts are the host's job.
//!
//! # Pipeline
//!
//! ```text
//! evaluation ─► PolicyKey::derive ─► PolicyRegistry::get_or_create
//!                                          │ (ConfigResolver on first sight)
//!                                          ▼
//!                                    pid::advance ─► transform::map ─► ScalingDecision
//! ```
//!
//! The first sample for a policy only records a baseline, and samples that
//! are not newer than the previous one are ignored; both yield a decision
//! that keeps the current count.

pub mod config;
pub mod decision;
pub mod error;
pub mod identity;
pub mod pid;
pub mod registry;
pub mod strategy;
pub mod transform;
pub mod types;

pub use config::{ConfigLayer, ConfigResolver, ControllerConfig, QuantizationMode};
pub use decision::{Direction, ScalingDecision};
pub use error::{ConfigError, StrategyError, StrategyResult};
pub use identity::PolicyKey;
pub use pid::{Advance, PolicyState, Skip};
pub use registry::PolicyRegistry;
pub use strategy::{PLUGIN_NAME, PidStrategy, PluginInfo, PluginType, Strategy};
pub use types::{CheckStrategy, MetricSample, ScalingCheck, ScalingCheckEvaluation};
