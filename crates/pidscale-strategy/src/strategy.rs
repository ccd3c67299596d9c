//! PID strategy plugin.
//!
//! Each call derives the policy key from the scaling check, fetches (or
//! lazily creates) that policy's controller state, feeds it the most recent
//! metric sample and turns the controller output into a scaling decision.
//! Fetching metrics and applying the decision are left to the host.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::config::{ConfigLayer, ConfigResolver};
use crate::decision::ScalingDecision;
use crate::error::StrategyResult;
use crate::identity::PolicyKey;
use crate::pid::{self, Advance, PolicyState};
use crate::registry::{PolicyRegistry, lock_state};
use crate::transform;
use crate::types::ScalingCheckEvaluation;

/// Name the strategy registers under.
pub const PLUGIN_NAME: &str = "strategy-pid";

/// Kind of plugin, as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    Strategy,
}

/// Static plugin metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub plugin_type: PluginType,
}

/// Interface a host uses to drive a scaling strategy.
pub trait Strategy: Send + Sync {
    fn plugin_info(&self) -> PluginInfo;

    /// Set the plugin-wide config layer. Called once at startup.
    fn set_config(&mut self, config: ConfigLayer);

    /// Decide the count for one evaluation of a scaling check.
    fn run(&self, eval: &ScalingCheckEvaluation, count: i64) -> StrategyResult<ScalingDecision>;
}

/// The PID strategy.
#[derive(Default)]
pub struct PidStrategy {
    resolver: ConfigResolver,
    registry: PolicyRegistry,
}

impl PidStrategy {
    /// Create a strategy with only the built-in defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of policies with controller state.
    pub fn policy_count(&self) -> usize {
        self.registry.len()
    }

    /// Copy of a policy's controller state.
    pub fn policy_snapshot(&self, key: &PolicyKey) -> Option<PolicyState> {
        self.registry.snapshot(key)
    }
}

impl Strategy for PidStrategy {
    fn plugin_info(&self) -> PluginInfo {
        PluginInfo {
            name: PLUGIN_NAME.to_string(),
            plugin_type: PluginType::Strategy,
        }
    }

    fn set_config(&mut self, config: ConfigLayer) {
        debug!(keys = config.len(), "set plugin config");
        self.resolver.set_plugin_config(config);
    }

    fn run(&self, eval: &ScalingCheckEvaluation, count: i64) -> StrategyResult<ScalingDecision> {
        let key = PolicyKey::derive(&eval.check);
        debug!(%key, count, "run called");

        let Some(sample) = eval.latest() else {
            warn!(%key, "run called with no data");
            return Ok(ScalingDecision::no_metrics(count));
        };

        let policy = self.registry.get_or_create(&key, || {
            let per_check = ConfigLayer::from(eval.check.strategy.config.clone());
            self.resolver.resolve(&per_check)
        })?;
        let mut state = lock_state(&policy);

        let raw_output = match pid::advance(&mut state, sample) {
            Advance::Baseline => {
                info!(%key, "first sample for policy, recording baseline");
                return Ok(ScalingDecision::baseline(count));
            }
            Advance::Skipped(skip) => {
                warn!(%key, ?skip, metric_time = %sample.timestamp, "sample not actionable, holding count");
                return Ok(ScalingDecision::skipped(count, skip));
            }
            Advance::Output(raw) => raw,
        };

        let new_count = transform::map(raw_output, state.config(), count)?;
        drop(state);

        let decision = ScalingDecision::from_output(new_count, count, raw_output);
        trace!(
            %key,
            metric_time = %sample.timestamp,
            metric_value = sample.value,
            current_count = count,
            raw_output,
            new_count,
            direction = %decision.direction,
            "calculated scaling strategy result"
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Direction;
    use crate::error::StrategyError;
    use crate::types::{CheckStrategy, MetricSample, ScalingCheck};
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn test_check(name: &str, config: &[(&str, &str)]) -> ScalingCheck {
        ScalingCheck {
            source: "gitlab-ci".to_string(),
            query: "pending_jobs".to_string(),
            group: "runners".to_string(),
            name: name.to_string(),
            strategy: CheckStrategy {
                name: "pid".to_string(),
                config: config
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<HashMap<_, _>>(),
            },
        }
    }

    fn scenario_check() -> ScalingCheck {
        test_check(
            "pending",
            &[
                ("target", "50"),
                ("proportional_factor", "0.5"),
                ("integral_factor", "0"),
                ("derivative_factor", "0"),
                ("time_divider_ns", "1000000000"),
                ("output_coefficients", "0,1"),
                ("output_clamp_max", "20"),
                ("output_clamp_min", "1"),
                ("output_dead_zone", "0"),
                ("output_quantification", "round"),
            ],
        )
    }

    fn eval(check: &ScalingCheck, samples: &[(i64, f64)]) -> ScalingCheckEvaluation {
        ScalingCheckEvaluation {
            check: check.clone(),
            metrics: samples
                .iter()
                .map(|&(secs, value)| MetricSample::new(t(secs), value))
                .collect(),
        }
    }

    #[test]
    fn plugin_info_names_strategy() {
        let info = PidStrategy::new().plugin_info();
        assert_eq!(info.name, "strategy-pid");
        assert_eq!(info.plugin_type, PluginType::Strategy);
    }

    #[test]
    fn only_latest_sample_is_used() {
        let strategy = PidStrategy::new();
        let check = scenario_check();

        strategy.run(&eval(&check, &[(0, 80.0)]), 10).unwrap();
        // Older samples in the batch are ignored; only (10, 70) counts.
        let decision = strategy
            .run(&eval(&check, &[(2, 0.0), (5, 1000.0), (10, 70.0)]), 10)
            .unwrap();
        assert_eq!(decision.count, 1);
    }

    #[test]
    fn no_metrics_holds_and_creates_nothing() {
        let strategy = PidStrategy::new();
        let decision = strategy.run(&eval(&scenario_check(), &[]), 4).unwrap();

        assert_eq!(decision.count, 4);
        assert_eq!(decision.direction, Direction::None);
        assert_eq!(strategy.policy_count(), 0);
    }

    #[test]
    fn config_error_creates_no_state() {
        let strategy = PidStrategy::new();
        let check = test_check("broken", &[("output_clamp_max", "1"), ("output_clamp_min", "2")]);

        let err = strategy.run(&eval(&check, &[(0, 1.0)]), 1).unwrap_err();
        assert!(matches!(err, StrategyError::Config(_)));
        assert_eq!(strategy.policy_count(), 0);
    }

    #[test]
    fn config_error_does_not_affect_other_policies() {
        let strategy = PidStrategy::new();
        let good = scenario_check();
        let bad = test_check("broken", &[("target", "abc")]);

        strategy.run(&eval(&good, &[(0, 80.0)]), 10).unwrap();
        assert!(strategy.run(&eval(&bad, &[(0, 80.0)]), 10).is_err());
        let decision = strategy.run(&eval(&good, &[(10, 70.0)]), 10).unwrap();
        assert_eq!(decision.count, 1);
    }

    #[test]
    fn plugin_config_applies_under_check_config() {
        let mut strategy = PidStrategy::new();
        strategy.set_config(
            [("target", "50"), ("proportional_factor", "0.5"), ("output_clamp_max", "20")]
                .into_iter()
                .collect(),
        );
        let check = test_check("layered", &[("output_clamp_min", "1")]);

        strategy.run(&eval(&check, &[(0, 80.0)]), 10).unwrap();
        let decision = strategy.run(&eval(&check, &[(10, 70.0)]), 10).unwrap();
        assert_eq!(decision.count, 1);
    }

    #[test]
    fn config_is_fixed_at_policy_creation() {
        let strategy = PidStrategy::new();
        let check = scenario_check();
        strategy.run(&eval(&check, &[(0, 80.0)]), 10).unwrap();

        let mut changed = check.clone();
        changed
            .strategy
            .config
            .insert("output_clamp_min".to_string(), "5".to_string());
        let decision = strategy.run(&eval(&changed, &[(10, 70.0)]), 10).unwrap();
        assert_eq!(decision.count, 1);
    }

    #[test]
    fn stale_sample_holds_and_preserves_state() {
        let strategy = PidStrategy::new();
        let check = scenario_check();
        let key = PolicyKey::derive(&check);

        strategy.run(&eval(&check, &[(0, 80.0)]), 10).unwrap();
        strategy.run(&eval(&check, &[(10, 70.0)]), 10).unwrap();
        let before = strategy.policy_snapshot(&key).unwrap();

        let decision = strategy.run(&eval(&check, &[(10, 10.0)]), 1).unwrap();
        assert_eq!(decision.count, 1);
        assert_eq!(decision.direction, Direction::None);
        assert!(decision.reason.contains("insufficient history"));
        assert_eq!(strategy.policy_snapshot(&key).unwrap(), before);
    }

    #[test]
    fn overflowing_sample_does_not_break_policy() {
        let strategy = PidStrategy::new();
        let check = test_check("overflow", &[("target", "-1e308")]);
        let key = PolicyKey::derive(&check);

        for (secs, value) in [(0, 0.0), (10, 1e308), (20, 0.0), (30, 0.0)] {
            let decision = strategy.run(&eval(&check, &[(secs, value)]), 3).unwrap();
            assert_eq!(decision.count, 3);
            assert_eq!(decision.direction, Direction::None);
        }

        let state = strategy.policy_snapshot(&key).unwrap();
        assert!(state.integral().is_finite());
        assert!(state.last_error().is_finite());
    }

    #[test]
    fn decisions_are_deterministic() {
        let samples = [(0, 80.0), (15, 60.0), (30, 40.0), (45, 55.0), (60, 30.0)];
        let check = test_check(
            "det",
            &[
                ("target", "50"),
                ("proportional_factor", "0.3"),
                ("integral_factor", "0.01"),
                ("derivative_factor", "0.2"),
                ("output_coefficients", "5, 1"),
                ("output_dead_zone", "1"),
            ],
        );

        let run_all = || {
            let strategy = PidStrategy::new();
            let mut count = 5;
            let mut out = Vec::new();
            for sample in samples {
                let decision = strategy.run(&eval(&check, &[sample]), count).unwrap();
                count = decision.count;
                out.push(decision);
            }
            out
        };

        assert_eq!(run_all(), run_all());
    }
}
