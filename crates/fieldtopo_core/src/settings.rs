//! Range checks shared by the settings structs.
//!
//! Every tunable parameter is a plain field on a serde struct with a
//! `Default` and a `validate()`; the host's property system supplies values
//! and this module enforces the same min/max bounds the UI advertises.

use anyhow::{bail, Result};

/// Fails unless `min <= value <= max` and `value` is finite.
pub fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if !value.is_finite() {
        bail!("{name} must be finite, got {value}.");
    }
    if value < min || value > max {
        bail!("{name} must be within [{min}, {max}], got {value}.");
    }
    Ok(())
}

/// Integer variant of [`check_range`].
pub fn check_count(name: &str, value: usize, min: usize, max: usize) -> Result<()> {
    if value < min || value > max {
        bail!("{name} must be within [{min}, {max}], got {value}.");
    }
    Ok(())
}

/// Fails unless `value` is finite and strictly positive.
pub fn check_positive(name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        bail!("{name} must be positive, got {value}.");
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
    let err = result.expect_err("expected error");
    let message = format!("{err}");
    assert!(
        message.contains(needle),
        "expected error to contain \"{needle}\", got \"{message}\""
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_range_accepts_bounds_inclusive() {
        assert!(check_range("tolerance", 1e-5, 1e-5, 1.0).is_ok());
        assert!(check_range("tolerance", 1.0, 1e-5, 1.0).is_ok());
    }

    #[test]
    fn check_range_rejects_out_of_range_and_nan() {
        assert_err_contains(check_range("tolerance", 0.0, 1e-5, 1.0), "tolerance must be within");
        assert_err_contains(check_range("step", f64::NAN, 0.0, 1.0), "step must be finite");
        assert_err_contains(check_count("max_steps", 20_000, 0, 10_000), "max_steps");
        assert_err_contains(check_positive("sigma", -1.0), "sigma must be positive");
    }
}
