//! Types for the price annotator

use crate::constants::{DEFAULT_EUR_RSD, DEFAULT_EUR_RUB, DEFAULT_HUF_EUR};
use crate::error::RateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Currencies the parser recognizes in page text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceCurrency {
    /// Hungarian forint, marked "Ft", integer amounts
    Huf,
    /// Euro, marked "€", comma-decimal amounts
    Eur,
}

impl SourceCurrency {
    /// Get the ISO currency code
    pub fn code(&self) -> &'static str {
        match self {
            SourceCurrency::Huf => "HUF",
            SourceCurrency::Eur => "EUR",
        }
    }

    /// Get the text marker this currency carries in page text
    pub fn marker(&self) -> &'static str {
        match self {
            SourceCurrency::Huf => "Ft",
            SourceCurrency::Eur => "€",
        }
    }
}

/// Currencies shown in the tooltip, in fixed display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetCurrency {
    /// Euro
    Eur,
    /// Serbian dinar
    Rsd,
    /// Russian rouble
    Rub,
}

impl TargetCurrency {
    /// Get the ISO currency code
    pub fn code(&self) -> &'static str {
        match self {
            TargetCurrency::Eur => "EUR",
            TargetCurrency::Rsd => "RSD",
            TargetCurrency::Rub => "RUB",
        }
    }

    /// Get the symbol shown next to the amount in the tooltip
    pub fn symbol(&self) -> &'static str {
        match self {
            TargetCurrency::Eur => "€",
            TargetCurrency::Rsd => "RSD",
            TargetCurrency::Rub => "₽",
        }
    }

    /// All targets in display order; the last one is emphasized
    pub fn all() -> &'static [TargetCurrency] {
        &[TargetCurrency::Eur, TargetCurrency::Rsd, TargetCurrency::Rub]
    }
}

/// USD-relative factors for the four currencies the feed must provide
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotRates {
    pub huf: f64,
    pub eur: f64,
    pub rsd: f64,
    pub rub: f64,
}

/// Immutable snapshot of the conversion factors in use
///
/// The three factors are derived once from a USD-pivot rate map and exposed
/// as named quantities so manual configuration can override them
/// individually. A table is never mutated: replacing rates installs a new
/// table under a bumped epoch, and every decoration records the epoch it
/// was computed under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    /// Factor from one forint to euros
    pub huf_to_eur: f64,
    /// Factor from one euro to dinars
    pub eur_to_rsd: f64,
    /// Factor from one euro to roubles
    pub eur_to_rub: f64,
    /// Version of this table; decorations computed under an older epoch
    /// are stale
    pub epoch: u64,
}

impl RateTable {
    /// Builds a table from the three derived factors, rejecting any factor
    /// that is non-positive, NaN or infinite
    pub fn new(
        huf_to_eur: f64,
        eur_to_rsd: f64,
        eur_to_rub: f64,
        epoch: u64,
    ) -> Result<Self, RateError> {
        validate_factor("HUF/EUR", huf_to_eur)?;
        validate_factor("EUR/RSD", eur_to_rsd)?;
        validate_factor("EUR/RUB", eur_to_rub)?;
        Ok(Self {
            huf_to_eur,
            eur_to_rsd,
            eur_to_rub,
            epoch,
        })
    }

    /// Derives the table from USD-pivot rates: X -> Y is rate(USD->Y) / rate(USD->X)
    pub fn from_pivot(rates: &PivotRates, epoch: u64) -> Result<Self, RateError> {
        Self::new(
            rates.eur / rates.huf,
            rates.rsd / rates.eur,
            rates.rub / rates.eur,
            epoch,
        )
    }

    /// The compiled-in default table
    pub fn defaults(epoch: u64) -> Self {
        Self {
            huf_to_eur: DEFAULT_HUF_EUR,
            eur_to_rsd: DEFAULT_EUR_RSD,
            eur_to_rub: DEFAULT_EUR_RUB,
            epoch,
        }
    }
}

fn validate_factor(pair: &'static str, value: f64) -> Result<(), RateError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(RateError::invalid_rate(pair, value))
    }
}

/// A price extracted from page text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedPrice {
    /// Non-negative amount in the source currency
    pub amount: f64,
    /// Currency the page displayed the amount in
    pub currency: SourceCurrency,
}

/// One converted amount shown in the tooltip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetAmount {
    pub currency: TargetCurrency,
    /// Display amount, rounded to two decimals
    pub amount: f64,
    /// Whether this row is visually emphasized
    pub emphasized: bool,
}

/// A parsed price together with its converted target amounts
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedPrice {
    pub source_amount: f64,
    pub source_currency: SourceCurrency,
    /// Fixed display order: EUR, RSD, RUB (emphasized)
    pub targets: Vec<TargetAmount>,
}

/// Cross-component notification, discriminated by its `action` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    /// Discard cached rates, reload from the persistent store, invalidate
    /// the current epoch and rescan
    UpdateRates,
}

/// Rate lifecycle events for observers of the store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateEvent {
    /// A new rate table was installed
    RatesUpdated {
        id: Uuid,
        epoch: u64,
        huf_to_eur: f64,
        eur_to_rsd: f64,
        eur_to_rub: f64,
        timestamp: DateTime<Utc>,
    },

    /// A scheduled refresh failed; the previous table stays in effect
    RefreshFailed {
        id: Uuid,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl RateEvent {
    /// Creates a RatesUpdated event for a freshly installed table
    pub fn rates_updated(table: &RateTable) -> Self {
        Self::RatesUpdated {
            id: Uuid::new_v4(),
            epoch: table.epoch,
            huf_to_eur: table.huf_to_eur,
            eur_to_rsd: table.eur_to_rsd,
            eur_to_rub: table.eur_to_rub,
            timestamp: Utc::now(),
        }
    }

    /// Creates a RefreshFailed event
    pub fn refresh_failed(message: impl Into<String>) -> Self {
        Self::RefreshFailed {
            id: Uuid::new_v4(),
            error_message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Get the event ID
    pub fn id(&self) -> Uuid {
        match self {
            RateEvent::RatesUpdated { id, .. } => *id,
            RateEvent::RefreshFailed { id, .. } => *id,
        }
    }
}

impl std::fmt::Display for RateEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateEvent::RatesUpdated { epoch, .. } => {
                write!(f, "Rates updated (epoch {})", epoch)
            }
            RateEvent::RefreshFailed { error_message, .. } => {
                write!(f, "Rate refresh failed: {}", error_message)
            }
        }
    }
}
