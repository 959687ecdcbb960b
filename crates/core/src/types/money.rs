//! Money helpers using decimal arithmetic.
//!
//! Amounts are stored as `NUMERIC(12,2)` and handled as [`Decimal`] in the
//! store's single currency. Nothing here converts between currencies.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// ISO 4217 currency codes the store can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// Display symbol placed before the amount.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// The ISO 4217 code, e.g. `EUR`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

/// Round to cents, half away from zero.
#[must_use]
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount for display, e.g. `$1,234.50` or `-$3.00`.
#[must_use]
pub fn format_money(amount: Decimal, currency: CurrencyCode) -> String {
    let rounded = round_cents(amount);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}{}{grouped}.{cents}", currency.symbol())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_format_groups_thousands() {
        assert_eq!(format_money(dec("1234.5"), CurrencyCode::USD), "$1,234.50");
        assert_eq!(
            format_money(dec("1234567.891"), CurrencyCode::USD),
            "$1,234,567.89"
        );
        assert_eq!(format_money(dec("999"), CurrencyCode::GBP), "£999.00");
    }

    #[test]
    fn test_format_zero_and_negative() {
        assert_eq!(format_money(Decimal::ZERO, CurrencyCode::EUR), "€0.00");
        assert_eq!(format_money(dec("-3"), CurrencyCode::USD), "-$3.00");
        assert_eq!(format_money(dec("-0.001"), CurrencyCode::USD), "$0.00");
    }

    #[test]
    fn test_round_cents_half_away_from_zero() {
        assert_eq!(round_cents(dec("2.345")), dec("2.35"));
        assert_eq!(round_cents(dec("2.344")), dec("2.34"));
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!("usd".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert!("JPY".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn test_code_round_trips_through_parse() {
        for code in [CurrencyCode::USD, CurrencyCode::EUR, CurrencyCode::GBP, CurrencyCode::CAD, CurrencyCode::AUD] {
            assert_eq!(code.to_string().parse::<CurrencyCode>().unwrap(), code);
        }
        assert_eq!(CurrencyCode::GBP.as_str(), "GBP");
    }
}
