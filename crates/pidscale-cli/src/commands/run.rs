//! `pidscale run` — feed JSON-lines evaluations through one strategy.
//!
//! Each input line is a scaling check evaluation plus the current count:
//!
//! ```json
//! {"check": {"source": "gitlab-ci", "query": "...", "group": "runners",
//!            "name": "pending", "strategy": {"name": "pid", "config": {}}},
//!  "metrics": [{"timestamp": "2024-05-01T12:00:00Z", "value": 80.0}],
//!  "count": 10}
//! ```
//!
//! Every line produces one JSON decision on the output. Policy state lives
//! for the whole run, so later lines see the history of earlier ones.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::{error, info};

use pidscale_strategy::{PidStrategy, ScalingCheckEvaluation, Strategy, StrategyError};

use crate::config::PluginConfigFile;

/// One input line.
#[derive(Debug, Deserialize)]
struct EvaluationLine {
    #[serde(flatten)]
    evaluation: ScalingCheckEvaluation,
    count: i64,
}

/// Totals for a processed input.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub decisions: usize,
    pub rejected: usize,
}

pub fn run(config: Option<&Path>, input: Option<&Path>) -> Result<()> {
    let mut strategy = PidStrategy::new();
    if let Some(path) = config {
        let layer = PluginConfigFile::from_file(path)?.to_layer()?;
        strategy.set_config(layer);
    }

    let reader: Box<dyn BufRead> = match input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening input {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = process(&strategy, reader, &mut out)?;
    info!(decisions = summary.decisions, rejected = summary.rejected, "run complete");
    Ok(())
}

/// Run every line of `reader` through `strategy`, writing decisions to `out`.
///
/// Config errors are reported and skipped, since they only concern the
/// policy on that line. Malformed input and internal errors abort.
pub fn process<S, R, W>(strategy: &S, reader: R, out: &mut W) -> Result<RunSummary>
where
    S: Strategy,
    R: BufRead,
    W: Write,
{
    let mut summary = RunSummary::default();

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("reading line {line_no}"))?;
        if line.trim().is_empty() {
            continue;
        }

        let parsed: EvaluationLine = serde_json::from_str(&line)
            .with_context(|| format!("parsing evaluation on line {line_no}"))?;

        match strategy.run(&parsed.evaluation, parsed.count) {
            Ok(decision) => {
                serde_json::to_writer(&mut *out, &decision)?;
                writeln!(out)?;
                summary.decisions += 1;
            }
            Err(StrategyError::Config(e)) => {
                error!(line = line_no, key = e.key(), value = e.value(), error = %e, "rejected evaluation");
                summary.rejected += 1;
            }
            Err(e @ StrategyError::InternalInvariant(_)) => {
                bail!("line {line_no}: {e}");
            }
        }
    }

    out.flush()?;
    Ok(summary)
}
