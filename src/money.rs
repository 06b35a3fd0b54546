//! Monetary helpers for cuadre amounts.
//!
//! All amounts in the system are PEN (soles) carried as `f64` and rounded
//! half-up to 2 decimal places at the moment they are derived.  Aggregation
//! treats any non-finite value (NaN / infinity) as data corruption, never as
//! zero — see `totals::checked_sum`.

/// Round a derived amount to 2 decimal places (cents of a sol).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Whether a user-entered amount can be accepted on a line item:
/// finite and strictly positive.
pub fn is_payable(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Format an amount for messages and logs, e.g. `S/ 775.00`.
pub fn format_pen(value: f64) -> String {
    format!("S/ {value:.2}")
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2_half_up() {
        assert_eq!(round2(20.005), 20.01);
        assert_eq!(round2(20.004), 20.0);
        assert_eq!(round2(775.0), 775.0);
    }

    #[test]
    fn test_round2_meter_scenario() {
        // (150.00 - 100.00) * 15.50 = 775.00
        assert_eq!(round2((150.00 - 100.00) * 15.50), 775.00);
    }

    #[test]
    fn test_is_payable_rejects_zero_negative_and_nan() {
        assert!(is_payable(0.01));
        assert!(!is_payable(0.0));
        assert!(!is_payable(-5.0));
        assert!(!is_payable(f64::NAN));
        assert!(!is_payable(f64::INFINITY));
    }

    #[test]
    fn test_format_pen() {
        assert_eq!(format_pen(450.0), "S/ 450.00");
        assert_eq!(format_pen(-12.345), "S/ -12.35");
    }
}
