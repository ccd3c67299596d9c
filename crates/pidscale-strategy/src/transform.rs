//! Output transform: raw control signal → integer resource count.
//!
//! ```text
//! t = Σ coeff[p] * raw^p            polynomial remap, constant term first
//! t = clamp(t, count_min, count_max)
//! q = quantize(t)                   floor | ceil | round | round_to_even
//! |q - current| <= |dead_zone|  →  current
//! ```

use crate::config::ControllerConfig;
use crate::error::{StrategyError, StrategyResult};

/// Map a raw controller output to the count to request.
pub fn map(raw: f64, config: &ControllerConfig, current: i64) -> StrategyResult<i64> {
    let remapped = polynomial(raw, &config.output_coefficients);
    if remapped.is_nan() {
        return Err(StrategyError::InternalInvariant(format!(
            "output polynomial produced NaN for raw output {raw}"
        )));
    }

    let clamped = clamp(remapped, config.count_min, config.count_max);
    // Saturating: clamped values beyond i64 land on i64::MIN/MAX.
    let quantized = config.quantization.apply(clamped) as i64;

    Ok(apply_dead_zone(quantized, current, config.dead_zone))
}

/// Evaluate the output polynomial at `x`. `coefficients[p]` multiplies `x^p`.
pub fn polynomial(x: f64, coefficients: &[f64]) -> f64 {
    coefficients
        .iter()
        .enumerate()
        .map(|(p, k)| k * x.powi(p as i32))
        .sum()
}

/// Clamp to `[min, max]`. Unlike `f64::clamp` this never panics; callers
/// guarantee `min <= max`.
fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.min(max).max(min)
}

/// Keep `current` when `quantized` is within `|dead_zone|` of it.
pub fn apply_dead_zone(quantized: i64, current: i64, dead_zone: i64) -> i64 {
    let distance = (i128::from(quantized) - i128::from(current)).unsigned_abs();
    if distance <= u128::from(dead_zone.unsigned_abs()) {
        current
    } else {
        quantized
    }
}
