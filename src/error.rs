//! Error types for the price annotator

use thiserror::Error;

/// Errors that can occur when fetching rates from the remote feed
#[derive(Debug, Error)]
pub enum FeedError {
    /// Network request failed
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body could not be decoded into a rate payload
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A required currency is absent from the rate payload
    #[error("Currency {0} not found in rate payload")]
    MissingCurrency(&'static str),

    /// Feed returned a non-success status
    #[error("Feed API error: {0}")]
    ApiError(String),
}

/// Errors that can occur when building or replacing a rate table
#[derive(Debug, Error)]
pub enum RateError {
    /// A conversion factor is non-positive, NaN or infinite
    #[error("Invalid rate factor for {pair}: {value}")]
    InvalidRate { pair: &'static str, value: f64 },

    /// A user-supplied conversion formula failed validation
    #[error("Invalid formula {formula:?}: {reason}")]
    InvalidFormula { formula: String, reason: String },

    /// The remote fetch behind a refresh failed
    #[error(transparent)]
    Feed(#[from] FeedError),
}

impl RateError {
    /// Creates an InvalidRate error
    pub fn invalid_rate(pair: &'static str, value: f64) -> Self {
        Self::InvalidRate { pair, value }
    }

    /// Creates an InvalidFormula error
    pub fn invalid_formula(formula: &str, reason: impl Into<String>) -> Self {
        Self::InvalidFormula {
            formula: formula.to_string(),
            reason: reason.into(),
        }
    }
}
