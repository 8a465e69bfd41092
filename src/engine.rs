//! Price annotation service
//!
//! Ties the rate store, the annotator and the change watcher together
//! over one document. Mirrors the hosting page's lifecycle: settings are
//! read once at initialization, rates refresh on the 12-hour schedule,
//! and the watcher keeps decorations current as the tree mutates.

use crate::annotator::Annotator;
use crate::dom::{Document, Mutation, SelectorSet};
use crate::error::RateError;
use crate::feed::RateFeed;
use crate::storage::KeyValueStore;
use crate::store::RateStore;
use crate::types::Message;
use crate::watcher::{ChangeWatcher, ControlSignal};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Price annotation service over one document
///
/// # Example
/// ```no_run
/// use price_annotator_sdk::{
///     Document, MemoryStore, OpenExchangeRatesFeed, PriceAnnotator, SelectorSet,
/// };
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let document = Document::new();
/// let feed = Arc::new(OpenExchangeRatesFeed::new("your-app-id")?);
/// let mut service = PriceAnnotator::new(
///     Arc::new(MemoryStore::new()),
///     feed,
///     document,
///     SelectorSet::default_price_selectors(),
/// );
/// service.initialize().await;
/// service.start_watcher();
/// # Ok(())
/// # }
/// ```
pub struct PriceAnnotator {
    store: Arc<RateStore>,
    document: Arc<Mutex<Document>>,
    annotator: Arc<Mutex<Annotator>>,
    selectors: SelectorSet,
    control: mpsc::UnboundedSender<ControlSignal>,
    control_rx: Option<mpsc::UnboundedReceiver<ControlSignal>>,
    mutations: Option<mpsc::UnboundedReceiver<Mutation>>,
}

impl PriceAnnotator {
    /// Creates the service and attaches the mutation observer to the
    /// document
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        feed: Arc<dyn RateFeed>,
        mut document: Document,
        selectors: SelectorSet,
    ) -> Self {
        let mutations = document.observe();
        let (control, control_rx) = mpsc::unbounded_channel();

        Self {
            store: Arc::new(RateStore::new(kv, feed)),
            document: Arc::new(Mutex::new(document)),
            annotator: Arc::new(Mutex::new(Annotator::new())),
            selectors,
            control,
            control_rx: Some(control_rx),
            mutations: Some(mutations),
        }
    }

    /// Loads settings, refreshes rates when due, and performs the initial
    /// full scan
    ///
    /// # Returns
    /// The number of elements decorated by the initial scan
    pub async fn initialize(&self) -> usize {
        self.store.load().await;
        let table = self.store.refresh_if_due().await;

        let mut doc = self.document.lock().await;
        let mut annotator = self.annotator.lock().await;
        let decorated = annotator.scan(&mut doc, &self.selectors, &table);
        tracing::info!(decorated, epoch = table.epoch, "Initial scan complete");
        decorated
    }

    /// Starts the change watcher on a background task.
    ///
    /// Returns `None` when the watcher is already running.
    pub fn start_watcher(&mut self) -> Option<JoinHandle<()>> {
        let mutations = self.mutations.take()?;
        let control_rx = self.control_rx.take()?;

        let watcher = ChangeWatcher::new(
            self.document.clone(),
            self.annotator.clone(),
            self.store.clone(),
            self.selectors.clone(),
            mutations,
            control_rx,
        );
        Some(tokio::spawn(watcher.run()))
    }

    /// Handles a cross-component notification
    pub async fn handle_message(&self, message: Message) {
        match message {
            Message::UpdateRates => {
                self.store.reload().await;
                let _ = self.control.send(ControlSignal::RatesChanged);
            }
        }
    }

    /// Forces an immediate full scan without an epoch change
    pub fn rescan_now(&self) {
        let _ = self.control.send(ControlSignal::RescanNow);
    }

    /// Validates and saves manual rate formulas, then rebuilds every
    /// decoration under the new epoch
    pub async fn save_manual_rates(
        &self,
        hufeur_formula: &str,
        eurrsd_formula: &str,
    ) -> Result<(), RateError> {
        self.store.save_manual(hufeur_formula, eurrsd_formula).await?;
        let _ = self.control.send(ControlSignal::RatesChanged);
        Ok(())
    }

    /// The rate store, for subscribing to rate events
    pub fn store(&self) -> &Arc<RateStore> {
        &self.store
    }

    /// The shared document handle
    pub fn document(&self) -> Arc<Mutex<Document>> {
        self.document.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{
        KEY_AUTO_RATES, KEY_RATE_EURRSD, KEY_RATE_HUFEUR, MUTATION_SETTLE_MS, TOOLTIP_CLASS,
    };
    use crate::dom::NodeId;
    use crate::error::FeedError;
    use crate::feed::mock::MockFeed;
    use crate::storage::MemoryStore;
    use crate::types::PivotRates;
    use std::time::Duration;
    use tokio::time::sleep;

    fn count_by_class(doc: &Document, class: &str) -> usize {
        fn walk(doc: &Document, id: NodeId, class: &str, count: &mut usize) {
            if doc.has_class(id, class) {
                *count += 1;
            }
            for &child in doc.children(id) {
                walk(doc, child, class, count);
            }
        }
        let mut count = 0;
        walk(doc, doc.root(), class, &mut count);
        count
    }

    fn seeded_document() -> Document {
        let mut doc = Document::new();
        let root = doc.root();
        let el = doc.create_element("h4", &["product-price"]);
        doc.append_child(root, el);
        doc.set_text(el, "10 000 Ft");
        doc
    }

    async fn wait_for_settle() {
        sleep(Duration::from_millis(MUTATION_SETTLE_MS * 5)).await;
    }

    #[tokio::test]
    async fn initialize_decorates_the_seeded_document() {
        let service = PriceAnnotator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MockFeed::new()),
            seeded_document(),
            SelectorSet::default_price_selectors(),
        );

        assert_eq!(service.initialize().await, 1);
        let doc = service.document();
        let doc = doc.lock().await;
        assert_eq!(count_by_class(&doc, TOOLTIP_CLASS), 1);
    }

    #[tokio::test]
    async fn initialize_fetches_when_auto_mode_is_due() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(KEY_AUTO_RATES, "true").await;
        let feed = Arc::new(MockFeed::new());
        feed.push_success(PivotRates {
            huf: 356.5,
            eur: 0.85,
            rsd: 99.45,
            rub: 85.0,
        });

        let service = PriceAnnotator::new(
            kv,
            feed.clone(),
            seeded_document(),
            SelectorSet::default_price_selectors(),
        );
        service.initialize().await;

        assert_eq!(feed.call_count(), 1);
    }

    #[tokio::test]
    async fn initialize_survives_a_failing_feed() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(KEY_AUTO_RATES, "true").await;
        let feed = Arc::new(MockFeed::new());
        feed.push_failure(FeedError::MissingCurrency("HUF"));

        let service = PriceAnnotator::new(
            kv,
            feed,
            seeded_document(),
            SelectorSet::default_price_selectors(),
        );

        // Annotation still runs with the best-available table.
        assert_eq!(service.initialize().await, 1);
    }

    #[tokio::test]
    async fn update_rates_message_reloads_and_rebuilds() {
        let kv = Arc::new(MemoryStore::new());
        let mut service = PriceAnnotator::new(
            kv.clone(),
            Arc::new(MockFeed::new()),
            seeded_document(),
            SelectorSet::default_price_selectors(),
        );
        service.initialize().await;
        let handle = service.start_watcher().unwrap();
        let epoch_before = service.store().current().await.epoch;

        // Another component saved new factors and sent the notification.
        kv.set(KEY_RATE_HUFEUR, "0.0025").await;
        kv.set(KEY_RATE_EURRSD, "118.0").await;
        let message: Message = serde_json::from_str(r#"{"action":"updateRates"}"#).unwrap();
        service.handle_message(message).await;
        wait_for_settle().await;

        let table = service.store().current().await;
        assert!(table.epoch > epoch_before);
        assert_eq!(table.huf_to_eur, 0.0025);
        assert_eq!(table.eur_to_rsd, 118.0);

        let doc = service.document();
        let doc = doc.lock().await;
        assert_eq!(count_by_class(&doc, TOOLTIP_CLASS), 1);

        handle.abort();
    }

    #[tokio::test]
    async fn watcher_decorates_elements_added_after_startup() {
        let mut service = PriceAnnotator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MockFeed::new()),
            Document::new(),
            SelectorSet::default_price_selectors(),
        );
        service.initialize().await;
        let handle = service.start_watcher().unwrap();

        let document = service.document();
        {
            let mut doc = document.lock().await;
            let root = doc.root();
            let el = doc.create_element("div", &["cart-product-price"]);
            doc.append_child(root, el);
            doc.set_text(el, "2 499 Ft");
        }
        wait_for_settle().await;

        let doc = document.lock().await;
        assert_eq!(count_by_class(&doc, TOOLTIP_CLASS), 1);
        drop(doc);

        handle.abort();
    }

    #[tokio::test]
    async fn start_watcher_only_runs_once() {
        let mut service = PriceAnnotator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MockFeed::new()),
            Document::new(),
            SelectorSet::default_price_selectors(),
        );
        let handle = service.start_watcher().unwrap();
        assert!(service.start_watcher().is_none());
        handle.abort();
    }

    #[tokio::test]
    async fn save_manual_rates_surfaces_validation_errors() {
        let service = PriceAnnotator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MockFeed::new()),
            Document::new(),
            SelectorSet::default_price_selectors(),
        );

        let result = service.save_manual_rates("*not a number", "*117.5").await;
        assert!(matches!(result, Err(RateError::InvalidFormula { .. })));
    }
}
