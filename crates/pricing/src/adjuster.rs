use common::{Error, Result, RuleSpec};

/// Next price for a product, stepped by `change` and kept inside
/// `[min, max]`.
///
/// Branches are evaluated in order and the first match wins — later
/// branches re-check the same clamp conditions, so ties must resolve
/// top-down. A non-decreasing trend is the only path that raises the
/// price; every other branch steps down or clamps.
pub fn next_price(
    current: f64,
    change: f64,
    min: f64,
    max: f64,
    trend_prev: f64,
    trend_curr: f64,
) -> f64 {
    if trend_prev <= trend_curr && max >= current + change {
        current + change
    } else if max < current - change {
        max
    } else if min <= current - change {
        current - change
    } else {
        min
    }
}

/// Rule-activation invariants. Violations are rejected here, at activation
/// time — never during recalculation.
pub fn validate(spec: &RuleSpec) -> Result<()> {
    if spec.min_price > spec.max_price {
        return Err(Error::InvalidRuleConfig(format!(
            "min_price {} exceeds max_price {}",
            spec.min_price, spec.max_price
        )));
    }
    if spec.change_amount <= 0.0 || spec.change_amount.is_nan() {
        return Err(Error::InvalidRuleConfig(format!(
            "change_amount must be positive, got {}",
            spec.change_amount
        )));
    }
    if spec.period_days == 0 {
        return Err(Error::InvalidRuleConfig(
            "period_days must be positive".into(),
        ));
    }
    Ok(())
}
