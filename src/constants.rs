//! Constants for the price annotator
//!
//! All configuration for the annotator is centralized here.
//! No runtime configuration (config.yml) is used - the system operates
//! transparently with these compile-time constants.

/// Minimum time between automatic rate refreshes (in hours)
pub const UPDATE_INTERVAL_HOURS: i64 = 12;

/// HTTP request timeout when fetching rates (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// How long a mutation batch is allowed to settle before a rescan (in milliseconds)
pub const MUTATION_SETTLE_MS: u64 = 50;

/// Open Exchange Rates "latest" endpoint (USD-pivot rates)
pub const OPEN_EXCHANGE_RATES_URL: &str = "https://openexchangerates.org/api/latest.json";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "price-annotator-sdk/0.1.0";

/// Default HUF -> EUR factor, used until a cached or fetched value is available
pub const DEFAULT_HUF_EUR: f64 = 0.002_383_928_571_428_571_4;

/// Default EUR -> RSD factor
pub const DEFAULT_EUR_RSD: f64 = 117.0;

/// Default EUR -> RUB factor
pub const DEFAULT_EUR_RUB: f64 = 100.0;

/// Default manual formula for the HUF -> EUR rate
pub const DEFAULT_HUFEUR_FORMULA: &str = "/392*0.917";

/// Default manual formula for the EUR -> RSD rate
pub const DEFAULT_EURRSD_FORMULA: &str = "*117.5";

/// Persistent store key: cached HUF -> EUR factor (stringified float)
pub const KEY_RATE_HUFEUR: &str = "rate_hufeur";

/// Persistent store key: cached EUR -> RSD factor
pub const KEY_RATE_EURRSD: &str = "rate_eurrsd";

/// Persistent store key: cached EUR -> RUB factor
pub const KEY_RATE_EURRUB: &str = "rate_eurrub";

/// Persistent store key: manual HUF -> EUR formula string
pub const KEY_FORMULA_HUFEUR: &str = "hufeur";

/// Persistent store key: manual EUR -> RSD formula string
pub const KEY_FORMULA_EURRSD: &str = "eurrsd";

/// Persistent store key: automatic refresh flag ("true" / "false")
pub const KEY_AUTO_RATES: &str = "autoRates";

/// Persistent store key: last successful refresh (ISO-8601 string)
pub const KEY_LAST_RATE_UPDATE: &str = "lastRateUpdate";

/// Selectors matched against price-bearing elements by default
pub const DEFAULT_PRICE_SELECTORS: &[&str] = &[
    "h4.product-price",
    "h4.cart-total",
    "div.cart-product-price",
];

/// Class of the container element wrapped around a decorated price
pub const WRAPPER_CLASS: &str = "price-converter-wrapper";

/// Class of the tooltip element attached under a wrapper
pub const TOOLTIP_CLASS: &str = "price-tooltip";

/// Class of a single tooltip row
pub const TOOLTIP_ROW_CLASS: &str = "tooltip-row";

/// Extra class on the emphasized tooltip row
pub const TOOLTIP_HIGHLIGHT_CLASS: &str = "highlight";
