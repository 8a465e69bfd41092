//! # Price Annotator SDK
//!
//! Continuously scans a live, mutating document tree for price-bearing
//! elements, converts each detected price into a fixed set of target
//! currencies using periodically refreshed exchange rates, and decorates
//! the tree with a tooltip showing the converted values.
//!
//! ## Usage
//!
//! ```no_run
//! use price_annotator_sdk::{
//!     Document, MemoryStore, OpenExchangeRatesFeed, PriceAnnotator, SelectorSet,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut document = Document::new();
//! let root = document.root();
//! let price = document.create_element("h4", &["product-price"]);
//! document.append_child(root, price);
//! document.set_text(price, "10 000 Ft");
//!
//! let feed = Arc::new(OpenExchangeRatesFeed::new("your-app-id")?);
//! let mut service = PriceAnnotator::new(
//!     Arc::new(MemoryStore::new()),
//!     feed,
//!     document,
//!     SelectorSet::default_price_selectors(),
//! );
//!
//! // Load settings, refresh rates when due, decorate the current tree.
//! service.initialize().await;
//!
//! // Keep decorations current as the tree mutates.
//! service.start_watcher();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! RateStore (load / refresh_if_due / save_manual)
//!     ↓ Arc<RateTable> snapshot (epoch-versioned)
//! Annotator::scan (parse → convert → decorate, at most once per epoch)
//!     ↓ writes wrapper + tooltip into
//! Document (arena element tree, emits Mutation events)
//!     ↓ mutation stream
//! ChangeWatcher (debounced batches → rescan; quiesces via the epoch check)
//! ```
//!
//! ## Error Handling
//!
//! Absence of a price in an element's text is not an error; the parser
//! returns `None` and the element stays unmarked. Fetch and storage
//! failures are absorbed at the [`store::RateStore`] boundary: annotation
//! always runs with the best-available table. Only manual-formula
//! validation errors ([`RateError::InvalidFormula`]) are surfaced to the
//! caller.

pub mod annotator;
pub mod constants;
pub mod convert;
pub mod dom;
pub mod engine;
pub mod error;
pub mod feed;
pub mod formula;
pub mod parser;
pub mod storage;
pub mod store;
pub mod types;
pub mod watcher;

// Re-export commonly used types
pub use annotator::{AnnotationRecord, Annotator};
pub use dom::{Document, Mutation, NodeId, Selector, SelectorSet};
pub use engine::PriceAnnotator;
pub use error::{FeedError, RateError};
pub use feed::{OpenExchangeRatesFeed, RateFeed};
pub use storage::{KeyValueStore, MemoryStore};
pub use store::RateStore;
pub use types::{
    ConvertedPrice, Message, ParsedPrice, PivotRates, RateEvent, RateTable, SourceCurrency,
    TargetAmount, TargetCurrency,
};
pub use watcher::{ChangeWatcher, ControlSignal};
