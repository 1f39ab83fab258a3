//! Tax computation.

use common::Money;

/// Computes tax on a taxable amount at a flat rate.
///
/// Returns zero if either input is non-positive. Otherwise rounds
/// `taxable * rate` half away from zero to whole cents. Tax applies to the
/// post-discount subtotal; the rate comes from configuration, never from
/// the request.
pub fn compute(taxable: Money, rate: f64) -> Money {
    if !taxable.is_positive() || rate <= 0.0 {
        return Money::zero();
    }
    Money::from_cents((taxable.cents() as f64 * rate).round() as i64)
}
