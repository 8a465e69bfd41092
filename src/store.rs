//! Rate table lifecycle
//!
//! Loads cached factors, decides staleness, fetches replacements and
//! persists them, falling back to the held table on any failure. The
//! current table is an immutable snapshot behind an `Arc`: installing new
//! rates swaps the reference, never mutates in place, so a scan in
//! progress always sees a consistent table.

use crate::constants::{
    DEFAULT_EUR_RSD, DEFAULT_EUR_RUB, DEFAULT_HUF_EUR, KEY_AUTO_RATES, KEY_FORMULA_EURRSD,
    KEY_FORMULA_HUFEUR, KEY_LAST_RATE_UPDATE, KEY_RATE_EURRSD, KEY_RATE_EURRUB, KEY_RATE_HUFEUR,
    UPDATE_INTERVAL_HOURS,
};
use crate::error::RateError;
use crate::feed::RateFeed;
use crate::formula;
use crate::storage::KeyValueStore;
use crate::types::{RateEvent, RateTable};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Manages the lifecycle of the current [`RateTable`]
pub struct RateStore {
    kv: Arc<dyn KeyValueStore>,
    feed: Arc<dyn RateFeed>,
    current: RwLock<Arc<RateTable>>,
    next_epoch: AtomicU64,
    events: broadcast::Sender<RateEvent>,
}

impl RateStore {
    /// Creates a store holding the compiled-in default table
    pub fn new(kv: Arc<dyn KeyValueStore>, feed: Arc<dyn RateFeed>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            kv,
            feed,
            current: RwLock::new(Arc::new(RateTable::defaults(0))),
            next_epoch: AtomicU64::new(1),
            events,
        }
    }

    /// The current table snapshot
    pub async fn current(&self) -> Arc<RateTable> {
        self.current.read().await.clone()
    }

    /// Subscribes to rate lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<RateEvent> {
        self.events.subscribe()
    }

    /// Loads cached factors from the persistent store, falling back to the
    /// compiled-in default for each factor that is absent or unusable
    pub async fn load(&self) -> Arc<RateTable> {
        let huf_to_eur = self.read_factor(KEY_RATE_HUFEUR, DEFAULT_HUF_EUR).await;
        let eur_to_rsd = self.read_factor(KEY_RATE_EURRSD, DEFAULT_EUR_RSD).await;
        let eur_to_rub = self.read_factor(KEY_RATE_EURRUB, DEFAULT_EUR_RUB).await;

        match self.install(huf_to_eur, eur_to_rsd, eur_to_rub).await {
            Ok(table) => {
                tracing::info!(
                    huf_to_eur,
                    eur_to_rsd,
                    eur_to_rub,
                    epoch = table.epoch,
                    "Rates loaded"
                );
                table
            }
            // read_factor only yields validated or default factors, but a
            // rejected table must never replace the held one.
            Err(e) => {
                tracing::warn!(error = %e, "Rejected loaded rates, keeping current table");
                self.current().await
            }
        }
    }

    /// Discards the in-memory table and re-reads factors from the
    /// persistent store under a new epoch
    pub async fn reload(&self) -> Arc<RateTable> {
        tracing::info!("Reloading rates from persistent store");
        self.load().await
    }

    /// Whether the automatic refresh flag is set in the persistent store
    pub async fn auto_rates_enabled(&self) -> bool {
        matches!(self.kv.get(KEY_AUTO_RATES).await.as_deref(), Some("true"))
    }

    /// Whether a refresh is due given the stored last-update timestamp.
    /// An absent or malformed timestamp counts as always due.
    pub fn refresh_due(last_update: Option<&str>) -> bool {
        match last_update.and_then(|s| DateTime::parse_from_rfc3339(s).ok()) {
            Some(ts) => {
                let elapsed = Utc::now().signed_duration_since(ts.with_timezone(&Utc));
                elapsed.num_hours() >= UPDATE_INTERVAL_HOURS
            }
            None => true,
        }
    }

    /// Reads the stored settings and refreshes when auto mode is on and
    /// the refresh interval has elapsed
    pub async fn refresh_if_due(&self) -> Arc<RateTable> {
        let auto_enabled = self.auto_rates_enabled().await;
        let last_update = self.kv.get(KEY_LAST_RATE_UPDATE).await;
        self.refresh_if_due_with(auto_enabled, last_update.as_deref())
            .await
    }

    /// Refreshes from the feed when due; any failure keeps the previous
    /// table and epoch unchanged and is never propagated to the caller
    pub async fn refresh_if_due_with(
        &self,
        auto_enabled: bool,
        last_update: Option<&str>,
    ) -> Arc<RateTable> {
        if !auto_enabled || !Self::refresh_due(last_update) {
            return self.current().await;
        }

        tracing::info!(feed = self.feed.feed_name(), "Refreshing rates from feed");
        match self.try_refresh().await {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to refresh rates, keeping cached values");
                let _ = self.events.send(RateEvent::refresh_failed(e.to_string()));
                self.current().await
            }
        }
    }

    /// Validates, evaluates and persists user-supplied rate formulas,
    /// disabling auto mode. Validation errors are surfaced to the caller
    /// before anything is persisted or applied.
    pub async fn save_manual(
        &self,
        hufeur_formula: &str,
        eurrsd_formula: &str,
    ) -> Result<Arc<RateTable>, RateError> {
        let huf_to_eur = formula::evaluate(hufeur_formula)?;
        let eur_to_rsd = formula::evaluate(eurrsd_formula)?;
        let eur_to_rub = self.current().await.eur_to_rub;

        let table = self.install(huf_to_eur, eur_to_rsd, eur_to_rub).await?;

        self.kv.set(KEY_FORMULA_HUFEUR, hufeur_formula).await;
        self.kv.set(KEY_FORMULA_EURRSD, eurrsd_formula).await;
        self.kv
            .set(KEY_RATE_HUFEUR, &table.huf_to_eur.to_string())
            .await;
        self.kv
            .set(KEY_RATE_EURRSD, &table.eur_to_rsd.to_string())
            .await;
        self.kv.set(KEY_AUTO_RATES, "false").await;

        tracing::info!(
            huf_to_eur = table.huf_to_eur,
            eur_to_rsd = table.eur_to_rsd,
            epoch = table.epoch,
            "Manual rates saved"
        );
        Ok(table)
    }

    async fn try_refresh(&self) -> Result<Arc<RateTable>, RateError> {
        let pivot = self.feed.fetch_pivot_rates().await?;
        let epoch = self.next_epoch.fetch_add(1, Ordering::SeqCst);
        let table = Arc::new(RateTable::from_pivot(&pivot, epoch)?);

        self.kv
            .set(KEY_RATE_HUFEUR, &table.huf_to_eur.to_string())
            .await;
        self.kv
            .set(KEY_RATE_EURRSD, &table.eur_to_rsd.to_string())
            .await;
        self.kv
            .set(KEY_RATE_EURRUB, &table.eur_to_rub.to_string())
            .await;
        self.kv
            .set(KEY_LAST_RATE_UPDATE, &Utc::now().to_rfc3339())
            .await;

        *self.current.write().await = table.clone();
        let _ = self.events.send(RateEvent::rates_updated(&table));

        tracing::info!(
            huf_to_eur = table.huf_to_eur,
            eur_to_rsd = table.eur_to_rsd,
            eur_to_rub = table.eur_to_rub,
            epoch = table.epoch,
            "Rates updated from feed"
        );
        Ok(table)
    }

    async fn install(
        &self,
        huf_to_eur: f64,
        eur_to_rsd: f64,
        eur_to_rub: f64,
    ) -> Result<Arc<RateTable>, RateError> {
        let epoch = self.next_epoch.fetch_add(1, Ordering::SeqCst);
        let table = Arc::new(RateTable::new(huf_to_eur, eur_to_rsd, eur_to_rub, epoch)?);
        *self.current.write().await = table.clone();
        let _ = self.events.send(RateEvent::rates_updated(&table));
        Ok(table)
    }

    async fn read_factor(&self, key: &str, default: f64) -> f64 {
        match self
            .kv
            .get(key)
            .await
            .and_then(|value| value.parse::<f64>().ok())
        {
            Some(value) if value.is_finite() && value > 0.0 => value,
            _ => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;
    use crate::feed::mock::MockFeed;
    use crate::storage::MemoryStore;
    use crate::types::PivotRates;
    use chrono::Duration;

    fn pivot() -> PivotRates {
        PivotRates {
            huf: 356.5,
            eur: 0.85,
            rsd: 99.45,
            rub: 85.0,
        }
    }

    fn store_with(kv: Arc<MemoryStore>, feed: Arc<MockFeed>) -> RateStore {
        RateStore::new(kv, feed)
    }

    #[test]
    fn absent_or_malformed_timestamp_is_always_due() {
        assert!(RateStore::refresh_due(None));
        assert!(RateStore::refresh_due(Some("not a timestamp")));
    }

    #[test]
    fn refresh_due_honors_the_interval() {
        let recent = (Utc::now() - Duration::hours(1)).to_rfc3339();
        assert!(!RateStore::refresh_due(Some(&recent)));

        let stale = (Utc::now() - Duration::hours(13)).to_rfc3339();
        assert!(RateStore::refresh_due(Some(&stale)));

        let boundary = (Utc::now() - Duration::hours(12) - Duration::minutes(1)).to_rfc3339();
        assert!(RateStore::refresh_due(Some(&boundary)));
    }

    #[tokio::test]
    async fn load_uses_cached_factors_with_per_factor_fallback() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(KEY_RATE_HUFEUR, "0.0025").await;
        kv.set(KEY_RATE_EURRSD, "garbage").await;
        let store = store_with(kv, Arc::new(MockFeed::new()));

        let table = store.load().await;
        assert_eq!(table.huf_to_eur, 0.0025);
        assert_eq!(table.eur_to_rsd, DEFAULT_EUR_RSD);
        assert_eq!(table.eur_to_rub, DEFAULT_EUR_RUB);
    }

    #[tokio::test]
    async fn load_rejects_non_positive_cached_factor() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(KEY_RATE_HUFEUR, "-0.5").await;
        let store = store_with(kv, Arc::new(MockFeed::new()));

        let table = store.load().await;
        assert_eq!(table.huf_to_eur, DEFAULT_HUF_EUR);
    }

    #[tokio::test]
    async fn auto_mode_off_never_fetches() {
        let feed = Arc::new(MockFeed::new());
        feed.push_success(pivot());
        let store = store_with(Arc::new(MemoryStore::new()), feed.clone());

        let before = store.current().await;
        let after = store.refresh_if_due_with(false, None).await;

        assert_eq!(feed.call_count(), 0);
        assert_eq!(after.epoch, before.epoch);
    }

    #[tokio::test]
    async fn fresh_timestamp_skips_the_fetch() {
        let feed = Arc::new(MockFeed::new());
        feed.push_success(pivot());
        let store = store_with(Arc::new(MemoryStore::new()), feed.clone());

        let recent = (Utc::now() - Duration::hours(2)).to_rfc3339();
        store.refresh_if_due_with(true, Some(&recent)).await;

        assert_eq!(feed.call_count(), 0);
    }

    #[tokio::test]
    async fn due_refresh_installs_and_persists_the_new_table() {
        let kv = Arc::new(MemoryStore::new());
        let feed = Arc::new(MockFeed::new());
        feed.push_success(pivot());
        let store = store_with(kv.clone(), feed.clone());

        let table = store.refresh_if_due_with(true, None).await;

        assert_eq!(feed.call_count(), 1);
        assert!((table.huf_to_eur - 0.85 / 356.5).abs() < 1e-12);
        assert!(table.epoch > 0);
        assert!(kv.get(KEY_RATE_HUFEUR).await.is_some());
        assert!(kv.get(KEY_RATE_EURRSD).await.is_some());
        assert!(kv.get(KEY_RATE_EURRUB).await.is_some());
        let last = kv.get(KEY_LAST_RATE_UPDATE).await.unwrap();
        assert!(DateTime::parse_from_rfc3339(&last).is_ok());
    }

    #[tokio::test]
    async fn fetch_failure_keeps_table_and_epoch_unchanged() {
        let kv = Arc::new(MemoryStore::new());
        let feed = Arc::new(MockFeed::new());
        feed.push_failure(FeedError::MissingCurrency("RSD"));
        let store = store_with(kv.clone(), feed.clone());

        let before = store.current().await;
        let after = store.refresh_if_due_with(true, None).await;

        assert_eq!(feed.call_count(), 1);
        assert_eq!(after.epoch, before.epoch);
        assert_eq!(after.huf_to_eur, before.huf_to_eur);
        assert_eq!(kv.get(KEY_LAST_RATE_UPDATE).await, None);
    }

    #[tokio::test]
    async fn refresh_failure_is_reported_as_an_event() {
        let feed = Arc::new(MockFeed::new());
        feed.push_failure(FeedError::InvalidResponse("bad body".to_string()));
        let store = store_with(Arc::new(MemoryStore::new()), feed);

        let mut events = store.subscribe();
        store.refresh_if_due_with(true, None).await;

        let event = events.recv().await.unwrap();
        assert!(matches!(event, RateEvent::RefreshFailed { .. }));
    }

    #[tokio::test]
    async fn save_manual_persists_formulas_and_bumps_the_epoch() {
        let kv = Arc::new(MemoryStore::new());
        let store = store_with(kv.clone(), Arc::new(MockFeed::new()));
        let before = store.current().await;

        let table = store.save_manual("/392*0.917", "*117.5").await.unwrap();

        assert!(table.epoch > before.epoch);
        assert!((table.huf_to_eur - 0.917 / 392.0).abs() < 1e-12);
        assert_eq!(table.eur_to_rsd, 117.5);
        assert_eq!(
            kv.get(KEY_FORMULA_HUFEUR).await.as_deref(),
            Some("/392*0.917")
        );
        assert_eq!(kv.get(KEY_FORMULA_EURRSD).await.as_deref(), Some("*117.5"));
        assert_eq!(kv.get(KEY_AUTO_RATES).await.as_deref(), Some("false"));
    }

    #[tokio::test]
    async fn save_manual_rejects_invalid_formula_without_persisting() {
        let kv = Arc::new(MemoryStore::new());
        let store = store_with(kv.clone(), Arc::new(MockFeed::new()));
        let before = store.current().await;

        let result = store.save_manual("*abc", "*117.5").await;

        assert!(matches!(result, Err(RateError::InvalidFormula { .. })));
        assert_eq!(store.current().await.epoch, before.epoch);
        assert_eq!(kv.get(KEY_FORMULA_HUFEUR).await, None);
        assert_eq!(kv.get(KEY_RATE_HUFEUR).await, None);
    }

    #[tokio::test]
    async fn reload_bumps_the_epoch() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(KEY_RATE_HUFEUR, "0.0025").await;
        let store = store_with(kv, Arc::new(MockFeed::new()));

        let first = store.load().await;
        let second = store.reload().await;
        assert!(second.epoch > first.epoch);
    }
}
