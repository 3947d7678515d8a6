//! Material offset calculator: pure arithmetic over plan and actual weights.
//!
//! No side effects, no I/O. Invalid inputs (zero unit rate, zero plan weight)
//! yield `None` fields rather than errors; callers must check validity before
//! trusting derived figures.

use serde::{Deserialize, Serialize};

use crate::units::div_round_away;

/// Deviation classification for a completed waybill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OffsetResult {
    /// No deviation limits configured, or no valid deviation rate.
    #[default]
    Default,
    Normal,
    OverPositiveDeviation,
    OverNegativeDeviation,
}

/// Optional lower/upper deviation-rate bounds, percent at scale 10^4.
/// Either bound may be absent independently; only configured bounds are
/// checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OffsetLimits {
    pub lower_e4: Option<i64>,
    pub upper_e4: Option<i64>,
}

/// Immutable derived value object; computed on demand, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetCalculation {
    /// round(plan_quantity × unit_rate, 2) in centi-units.
    pub plan_weight_centi: Option<i64>,
    /// round(actual_weight / unit_rate, 4) at scale 10^4.
    pub actual_quantity_e4: Option<i64>,
    /// actual − plan, centi-units.
    pub difference_centi: Option<i64>,
    /// round(difference × 100 / plan, 4) percent at scale 10^4.
    pub deviation_rate_e4: Option<i64>,
    pub result: OffsetResult,
}

/// `round(plan_quantity × unit_rate, 2, away-from-zero)`; `None` when the
/// unit rate is zero or either input absent.
pub fn plan_weight(plan_quantity_e4: Option<i64>, unit_rate_e4: Option<i64>) -> Option<i64> {
    let qty = plan_quantity_e4?;
    let rate = unit_rate_e4?;
    if rate == 0 {
        return None;
    }
    // qty(e4) × rate(e4) is at scale 10^8; reduce to centi (10^2).
    div_round_away(i128::from(qty) * i128::from(rate), 1_000_000)
}

/// `round(actual_weight / unit_rate, 4, away-from-zero)`; `None` for a zero
/// rate.
pub fn actual_quantity(actual_centi: i64, unit_rate_e4: i64) -> Option<i64> {
    if unit_rate_e4 == 0 {
        return None;
    }
    // (a/10^2) / (r/10^4) at scale 10^4 = a × 10^6 / r.
    div_round_away(i128::from(actual_centi) * 1_000_000, i128::from(unit_rate_e4))
}

/// `round(difference × 100 / plan_weight, 4, away-from-zero)` percent;
/// `None` for a zero plan weight.
pub fn deviation_rate(difference_centi: i64, plan_weight_centi: i64) -> Option<i64> {
    if plan_weight_centi == 0 {
        return None;
    }
    // (d/p) × 100 at scale 10^4 = d × 10^6 / p.
    div_round_away(
        i128::from(difference_centi) * 1_000_000,
        i128::from(plan_weight_centi),
    )
}

/// Classify a deviation rate against the configured bounds.
pub fn determine_result(deviation_rate_e4: Option<i64>, limits: OffsetLimits) -> OffsetResult {
    let Some(rate) = deviation_rate_e4 else {
        return OffsetResult::Default;
    };
    if limits.lower_e4.is_none() && limits.upper_e4.is_none() {
        return OffsetResult::Default;
    }
    if let Some(lower) = limits.lower_e4
        && rate < lower
    {
        return OffsetResult::OverNegativeDeviation;
    }
    if let Some(upper) = limits.upper_e4
        && rate > upper
    {
        return OffsetResult::OverPositiveDeviation;
    }
    OffsetResult::Normal
}

/// Full calculation from plan data and an actual weight.
pub fn calculate(
    plan_quantity_e4: Option<i64>,
    unit_rate_e4: Option<i64>,
    actual_centi: i64,
    limits: OffsetLimits,
) -> OffsetCalculation {
    let plan = plan_weight(plan_quantity_e4, unit_rate_e4);
    let actual_qty = unit_rate_e4.and_then(|r| actual_quantity(actual_centi, r));
    let difference = plan.map(|p| actual_centi - p);
    let rate = match (difference, plan) {
        (Some(d), Some(p)) => deviation_rate(d, p),
        _ => None,
    };
    OffsetCalculation {
        plan_weight_centi: plan,
        actual_quantity_e4: actual_qty,
        difference_centi: difference,
        deviation_rate_e4: rate,
        result: determine_result(rate, limits),
    }
}
