//! Derived monetary totals.
//!
//! Totals are always computed from current product prices and the applied
//! promo at the moment of evaluation. Carts never persist amounts; orders
//! snapshot the totals computed here at checkout.

use common::Money;
use domain::{AppliedPromo, tax};
use serde::Serialize;

/// Tax configuration for total computation.
#[derive(Debug, Clone, Copy)]
pub struct PricingConfig {
    /// Tax rate applied to the post-discount subtotal.
    pub tax_rate: f64,
    /// When false, tax is always zero regardless of rate.
    pub tax_enabled: bool,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tax_rate: 0.08,
            tax_enabled: true,
        }
    }
}

/// The derived money breakdown for a cart or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

impl PricingConfig {
    /// Computes discount, tax, and total for `subtotal` under `promo`.
    ///
    /// Tax is charged on the post-discount subtotal.
    pub fn price(&self, subtotal: Money, promo: Option<&AppliedPromo>) -> Totals {
        let discount = promo.map_or(Money::zero(), |p| p.discount(subtotal));
        let taxable = subtotal - discount;
        let tax = if self.tax_enabled {
            tax::compute(taxable, self.tax_rate)
        } else {
            Money::zero()
        };
        Totals {
            subtotal,
            discount,
            tax,
            total: taxable + tax,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_without_promo() {
        let pricing = PricingConfig::default();
        let totals = pricing.price(Money::from_cents(10_000), None);
        assert_eq!(totals.discount, Money::zero());
        assert_eq!(totals.tax, Money::from_cents(800));
        assert_eq!(totals.total, Money::from_cents(10_800));
    }

    #[test]
    fn tax_applies_after_discount() {
        let pricing = PricingConfig::default();
        let promo = AppliedPromo {
            code: "SAVE10".to_string(),
            percentage: 10.0,
        };
        let totals = pricing.price(Money::from_cents(10_000), Some(&promo));
        assert_eq!(totals.discount, Money::from_cents(1_000));
        // 8% of $90.00
        assert_eq!(totals.tax, Money::from_cents(720));
        assert_eq!(totals.total, Money::from_cents(9_720));
    }

    #[test]
    fn disabled_tax_is_zero() {
        let pricing = PricingConfig {
            tax_rate: 0.08,
            tax_enabled: false,
        };
        let totals = pricing.price(Money::from_cents(10_000), None);
        assert_eq!(totals.tax, Money::zero());
        assert_eq!(totals.total, Money::from_cents(10_000));
    }
}
