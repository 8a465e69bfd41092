//! Price text grammar
//!
//! Extracts an amount and source currency from loosely formatted display
//! text. Absence of a price is expected and common, so a mismatch is
//! `None`, never an error.

use crate::types::{ParsedPrice, SourceCurrency};
use once_cell::sync::Lazy;
use regex::Regex;

// Forint amounts are integers whose digit groups may be separated by spaces.
static HUF_PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([\d\s]+)\s*Ft").unwrap());

// Euro amounts use a comma as the decimal separator.
static EUR_PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([\d,\s]+)\s*€").unwrap());

/// Parses a price out of display text.
///
/// The forint form is tried first; a string containing both forms parses
/// as HUF. Empty or non-numeric captures yield `None`.
pub fn parse(text: &str) -> Option<ParsedPrice> {
    parse_huf(text).or_else(|| parse_eur(text))
}

fn parse_huf(text: &str) -> Option<ParsedPrice> {
    let caps = HUF_PRICE.captures(text)?;
    let digits: String = caps[1].chars().filter(|c| !c.is_whitespace()).collect();
    let amount: u64 = digits.parse().ok()?;
    Some(ParsedPrice {
        amount: amount as f64,
        currency: SourceCurrency::Huf,
    })
}

fn parse_eur(text: &str) -> Option<ParsedPrice> {
    let caps = EUR_PRICE.captures(text)?;
    let normalized: String = caps[1]
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    let amount: f64 = normalized.parse().ok()?;
    Some(ParsedPrice {
        amount,
        currency: SourceCurrency::Eur,
    })
}
