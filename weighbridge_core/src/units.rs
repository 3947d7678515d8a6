//! Fixed-point weight and rate arithmetic.
//!
//! Weights are `i64` centi-units (1 = 0.01 of the configured weight unit),
//! matching the two implied decimal places of the wire protocol. Quantities,
//! unit rates, and percentage rates are `i64` at scale 10^4 (four decimal
//! places). All rounding is half-away-from-zero on `i128` intermediates, the
//! rounding mode audited weight reporting expects; no floating point touches
//! an audited figure.

/// Scale factor for centi-unit weights.
pub const CENTI: i64 = 100;
/// Scale factor for quantities, unit rates, and percentage rates.
pub const E4: i64 = 10_000;

/// Integer division rounding half away from zero. Returns `None` when
/// `den == 0` or the quotient falls outside `i64`.
#[inline]
pub fn div_round_away(num: i128, den: i128) -> Option<i64> {
    if den == 0 {
        return None;
    }
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    let half = den / 2;
    let q = if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    };
    i64::try_from(q).ok()
}

/// Quantize a floating-point weight to centi-units, rounding half away from
/// zero and clamping to `i64`. Non-finite values map to 0. Used only at the
/// configuration boundary; runtime arithmetic stays in integers.
#[inline]
pub fn quantize_centi(x: f64) -> i64 {
    quantize_scaled(x, CENTI)
}

/// Quantize a floating-point quantity/rate to scale 10^4.
#[inline]
pub fn quantize_e4(x: f64) -> i64 {
    quantize_scaled(x, E4)
}

#[inline]
fn quantize_scaled(x: f64, scale: i64) -> i64 {
    if !x.is_finite() {
        return 0;
    }
    let scaled = (x * scale as f64).abs().round();
    let mag = if scaled >= i64::MAX as f64 {
        i64::MAX
    } else {
        scaled as i64
    };
    if x.is_sign_negative() { -mag } else { mag }
}

/// Render a centi-weight as a decimal string ("185.00").
pub fn format_centi(centi: i64) -> String {
    let sign = if centi < 0 { "-" } else { "" };
    let mag = centi.unsigned_abs();
    format!("{sign}{}.{:02}", mag / 100, mag % 100)
}

/// Render an e4 rate as a decimal string ("2.5000").
pub fn format_e4(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let mag = value.unsigned_abs();
    format!("{sign}{}.{:04}", mag / 10_000, mag % 10_000)
}
