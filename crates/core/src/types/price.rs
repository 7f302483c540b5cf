//! Money arithmetic using decimal amounts.
//!
//! Catalog prices are stored in the currency's standard unit (rupees, not
//! paise). Discounted prices are always rounded to two decimal places with
//! midpoint-away-from-zero, and that rounded value is what carts display and
//! what orders freeze. Payment gateways want integer minor units; use
//! [`Price::to_minor_units`] at that boundary only.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors from price arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    /// Amount is negative where only non-negative amounts make sense.
    #[error("amount cannot be negative")]
    Negative,
    /// Amount does not fit in the gateway's integer representation.
    #[error("amount is too large")]
    Overflow,
}

/// Apply a percentage discount to an amount.
///
/// `percentage` is expected in `[0, 100]`; values outside are clamped so a
/// bad catalog row can never produce a negative or inflated price.
///
/// ```
/// use amyfairy_core::apply_discount;
/// use rust_decimal::Decimal;
///
/// let price = Decimal::new(99900, 2); // 999.00
/// let pct = Decimal::new(15, 0);
/// assert_eq!(apply_discount(price, pct), Decimal::new(84915, 2)); // 849.15
/// ```
#[must_use]
pub fn apply_discount(amount: Decimal, percentage: Decimal) -> Decimal {
    let pct = percentage.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    let factor = Decimal::ONE - pct / Decimal::ONE_HUNDRED;
    (amount * factor).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., rupees, not paise).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Convert to integer minor units (paise, cents) for a payment gateway.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for negative amounts and
    /// [`PriceError::Overflow`] if the value does not fit in an `i64`.
    pub fn to_minor_units(&self) -> Result<i64, PriceError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(PriceError::Negative);
        }
        (self.amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or(PriceError::Overflow)
    }

    /// Format for display (e.g., "₹849.15").
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}{:.2}", self.currency_code.symbol(), self.amount)
    }
}

/// ISO 4217 currency codes accepted by the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// Three-letter ISO code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }

    /// Display symbol.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::INR),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_apply_discount_rounds_half_away_from_zero() {
        // 10.01 * 0.95 = 9.5095 -> 9.51
        assert_eq!(apply_discount(dec("10.01"), dec("5")), dec("9.51"));
        // 0.25 * 0.9 = 0.225 -> 0.23
        assert_eq!(apply_discount(dec("0.25"), dec("10")), dec("0.23"));
    }

    #[test]
    fn test_apply_discount_bounds() {
        assert_eq!(apply_discount(dec("500"), dec("0")), dec("500"));
        assert_eq!(apply_discount(dec("500"), dec("100")), dec("0"));
        assert_eq!(apply_discount(dec("500"), dec("140")), dec("0"));
        assert_eq!(apply_discount(dec("500"), dec("-10")), dec("500"));
    }

    #[test]
    fn test_minor_units() {
        let price = Price::new(dec("849.15"), CurrencyCode::INR);
        assert_eq!(price.to_minor_units().unwrap(), 84915);

        let negative = Price::new(dec("-1"), CurrencyCode::INR);
        assert_eq!(negative.to_minor_units(), Err(PriceError::Negative));
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::new(dec("12.5"), CurrencyCode::INR).display(), "₹12.50");
        assert_eq!(Price::new(dec("3"), CurrencyCode::USD).display(), "$3.00");
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("inr".parse::<CurrencyCode>().unwrap(), CurrencyCode::INR);
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }
}
