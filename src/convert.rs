//! Currency conversion arithmetic
//!
//! All conversion goes through the euro leg of the rate table. The
//! intermediate euro amount is never pre-rounded; only the display
//! amounts are rounded, so a two-stage HUF conversion does not compound
//! rounding error.

use crate::types::{ConvertedPrice, ParsedPrice, RateTable, SourceCurrency, TargetAmount, TargetCurrency};

/// Converts a parsed price into all target currencies.
///
/// Target order is fixed: EUR, RSD, RUB, with RUB emphasized.
pub fn convert(price: &ParsedPrice, table: &RateTable) -> ConvertedPrice {
    let eur = match price.currency {
        SourceCurrency::Huf => price.amount * table.huf_to_eur,
        SourceCurrency::Eur => price.amount,
    };

    let targets = vec![
        TargetAmount {
            currency: TargetCurrency::Eur,
            amount: round2(eur),
            emphasized: false,
        },
        TargetAmount {
            currency: TargetCurrency::Rsd,
            amount: round2(eur * table.eur_to_rsd),
            emphasized: false,
        },
        TargetAmount {
            currency: TargetCurrency::Rub,
            amount: round2(eur * table.eur_to_rub),
            emphasized: true,
        },
    ];

    ConvertedPrice {
        source_amount: price.amount,
        source_currency: price.currency,
        targets,
    }
}

/// Rounds to exactly two decimal places for display
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn converts_forint_through_unrounded_euro_leg() {
        let table = RateTable::new(0.002_383_928_571_428_571_4, 117.0, 100.0, 1).unwrap();
        let price = parser::parse("10 000 Ft").unwrap();

        let converted = convert(&price, &table);

        assert_eq!(converted.source_amount, 10_000.0);
        assert_eq!(converted.source_currency, SourceCurrency::Huf);
        assert_eq!(converted.targets.len(), 3);

        assert_eq!(converted.targets[0].currency, TargetCurrency::Eur);
        assert!(close(converted.targets[0].amount, 23.84));

        // RSD multiplies from the unrounded euro amount, not from 23.84.
        assert_eq!(converted.targets[1].currency, TargetCurrency::Rsd);
        assert!(close(converted.targets[1].amount, 2789.20));

        assert_eq!(converted.targets[2].currency, TargetCurrency::Rub);
        assert!(close(converted.targets[2].amount, 2383.93));
        assert!(converted.targets[2].emphasized);
    }

    #[test]
    fn converts_euro_source_directly() {
        let table = RateTable::new(0.0024, 117.0, 100.0, 1).unwrap();
        let price = parser::parse("12,50 €").unwrap();

        let converted = convert(&price, &table);

        assert!(close(converted.targets[0].amount, 12.5));
        assert!(close(converted.targets[1].amount, 1462.5));
        assert!(close(converted.targets[2].amount, 1250.0));
    }

    #[test]
    fn only_last_target_is_emphasized() {
        let table = RateTable::defaults(1);
        let price = ParsedPrice {
            amount: 1.0,
            currency: SourceCurrency::Eur,
        };

        let converted = convert(&price, &table);
        let flags: Vec<bool> = converted.targets.iter().map(|t| t.emphasized).collect();
        assert_eq!(flags, vec![false, false, true]);
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert!(close(round2(23.839285), 23.84));
        assert!(close(round2(2789.1964), 2789.20));
        assert!(close(round2(0.0), 0.0));
    }
}
