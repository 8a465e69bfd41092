//! Mutation-driven rescans
//!
//! Drains the document's mutation stream, lets each batch settle, then
//! re-invokes the annotator on the whole root. The annotator's own writes
//! re-enter the stream, but the epoch check makes the follow-up scan a
//! no-op, so the stream quiesces after one extra round-trip. Control
//! signals force a rescan outside the mutation path.

use crate::annotator::Annotator;
use crate::constants::MUTATION_SETTLE_MS;
use crate::dom::{Document, Mutation, SelectorSet};
use crate::store::RateStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;

/// Out-of-band triggers for the watcher loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// The rate table changed: strip every decoration and rescan under
    /// the new epoch
    RatesChanged,
    /// Rescan immediately without an epoch change
    RescanNow,
}

/// Watches a document for changes and keeps its decorations current
pub struct ChangeWatcher {
    document: Arc<Mutex<Document>>,
    annotator: Arc<Mutex<Annotator>>,
    store: Arc<RateStore>,
    selectors: SelectorSet,
    mutations: mpsc::UnboundedReceiver<Mutation>,
    control: mpsc::UnboundedReceiver<ControlSignal>,
}

impl ChangeWatcher {
    /// Creates a watcher over a document's mutation stream
    pub fn new(
        document: Arc<Mutex<Document>>,
        annotator: Arc<Mutex<Annotator>>,
        store: Arc<RateStore>,
        selectors: SelectorSet,
        mutations: mpsc::UnboundedReceiver<Mutation>,
        control: mpsc::UnboundedReceiver<ControlSignal>,
    ) -> Self {
        Self {
            document,
            annotator,
            store,
            selectors,
            mutations,
            control,
        }
    }

    /// Runs until both the mutation and control channels close.
    ///
    /// There is no explicit cancellation; the watcher is scoped to the
    /// lifetime of the document that feeds it.
    pub async fn run(mut self) {
        tracing::info!(settle_ms = MUTATION_SETTLE_MS, "Starting change watcher");

        loop {
            tokio::select! {
                mutation = self.mutations.recv() => {
                    match mutation {
                        Some(_) => {
                            self.settle().await;
                            self.scan().await;
                        }
                        None => break,
                    }
                }
                signal = self.control.recv() => {
                    match signal {
                        Some(ControlSignal::RatesChanged) => {
                            self.rescan_all().await;
                        }
                        Some(ControlSignal::RescanNow) => {
                            self.scan().await;
                        }
                        None => break,
                    }
                }
            }
        }

        tracing::debug!("Change watcher stopped");
    }

    /// Lets the current mutation batch settle, then drains it
    async fn settle(&mut self) {
        sleep(Duration::from_millis(MUTATION_SETTLE_MS)).await;
        while self.mutations.try_recv().is_ok() {}
    }

    async fn scan(&self) -> usize {
        let table = self.store.current().await;
        let mut doc = self.document.lock().await;
        let mut annotator = self.annotator.lock().await;
        annotator.scan(&mut doc, &self.selectors, &table)
    }

    async fn rescan_all(&self) {
        let table = self.store.current().await;
        let mut doc = self.document.lock().await;
        let mut annotator = self.annotator.lock().await;
        let redecorated = annotator.rescan_after_rate_change(&mut doc, &self.selectors, &table);
        tracing::debug!(redecorated, epoch = table.epoch, "Rescanned after rate change");
    }
}
