//! Thread-safe in-memory item store.
//!
//! Every operation takes the single [`StoreLock`] for the whole read or
//! mutation, including the iteration done by `list` and `search`. The same
//! lock is handed to the [`BlockSimulator`](crate::BlockSimulator), so a
//! simulated block stalls real store traffic.
//!
//! Items are kept in insertion order: a sequence number per item, an ordered
//! map from sequence to item and a hash index from id to sequence.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::model::{BulkFailure, BulkOutcome, Item, ItemPatch, NewItem, SearchFilter};

/// The id → item mapping guarded by [`StoreLock`].
#[derive(Debug, Default)]
pub struct Inventory {
    positions: HashMap<String, u64>,
    items: BTreeMap<u64, Item>,
    next_seq: u64,
}

impl Inventory {
    fn insert(&mut self, item: Item) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.positions.insert(item.id.clone(), seq);
        self.items.insert(seq, item);
    }

    fn get(&self, id: &str) -> Option<&Item> {
        self.positions.get(id).and_then(|seq| self.items.get(seq))
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Item> {
        let seq = self.positions.get(id)?;
        self.items.get_mut(seq)
    }

    fn remove(&mut self, id: &str) -> Option<Item> {
        let seq = self.positions.remove(id)?;
        self.items.remove(&seq)
    }

    fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = uuid::Uuid::new_v4().to_string();
            if !self.positions.contains_key(&id) {
                return id;
            }
        }
    }
}

#[derive(Debug, Default)]
struct LockCounters {
    waiting: AtomicUsize,
    items: AtomicUsize,
}

/// The one exclusive lock shared by the store and the block simulator.
///
/// Cloning is cheap and yields a handle to the same lock. Waiters are served
/// in FIFO order.
#[derive(Debug, Clone, Default)]
pub struct StoreLock {
    inner: Arc<Mutex<Inventory>>,
    counters: Arc<LockCounters>,
}

impl StoreLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire for a store operation, counting the caller as waiting while it
    /// queues behind another holder.
    async fn acquire(&self) -> MutexGuard<'_, Inventory> {
        if let Ok(guard) = self.inner.try_lock() {
            return guard;
        }
        let _waiting = WaitingCaller::enter(&self.counters.waiting);
        self.inner.lock().await
    }

    /// Acquire a guard that can outlive the caller; used by the block task.
    pub(crate) async fn acquire_owned(&self) -> OwnedMutexGuard<Inventory> {
        Arc::clone(&self.inner).lock_owned().await
    }

    /// Whether the lock is free right now. Never waits.
    pub fn is_available(&self) -> bool {
        self.inner.try_lock().is_ok()
    }

    /// Number of store callers currently queued behind the lock holder.
    pub fn waiting_callers(&self) -> usize {
        self.counters.waiting.load(Ordering::Relaxed)
    }

    fn publish_len(&self, len: usize) {
        self.counters.items.store(len, Ordering::Relaxed);
        metrics::gauge!("itemlab_items").set(len as f64);
    }
}

struct WaitingCaller<'a>(&'a AtomicUsize);

impl<'a> WaitingCaller<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for WaitingCaller<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Point-in-time store statistics, gathered without taking the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub items_count: usize,
    pub waiting_callers: usize,
    pub lock_available: bool,
}

/// CRUD, search and bulk operations over the shared [`Inventory`].
#[derive(Debug, Clone)]
pub struct ItemStore {
    lock: StoreLock,
    config: Arc<StoreConfig>,
}

impl ItemStore {
    pub fn new(lock: StoreLock, config: StoreConfig) -> Self {
        Self {
            lock,
            config: Arc::new(config),
        }
    }

    /// A store with its own fresh lock and default limits.
    pub fn in_memory() -> Self {
        Self::new(StoreLock::new(), StoreConfig::default())
    }

    /// Handle to the lock this store serializes on.
    pub fn lock(&self) -> &StoreLock {
        &self.lock
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    #[tracing::instrument(skip_all, fields(name = %item.name))]
    pub async fn create(&self, item: NewItem) -> StoreResult<Item> {
        let result = self.create_inner(item).await;
        record_op("create", &result);
        result
    }

    async fn create_inner(&self, item: NewItem) -> StoreResult<Item> {
        item.validate()?;
        let mut inventory = self.lock.acquire().await;
        let stored = item.into_item(inventory.fresh_id(), Utc::now());
        inventory.insert(stored.clone());
        self.lock.publish_len(inventory.len());
        tracing::info!(id = %stored.id, "item created");
        Ok(stored)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: &str) -> StoreResult<Item> {
        let result = {
            let inventory = self.lock.acquire().await;
            inventory
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(id.to_string()))
        };
        record_op("get", &result);
        result
    }

    /// Up to `limit` items in insertion order, starting at `skip`.
    ///
    /// `limit` defaults to the configured page size and is clamped to the
    /// configured maximum.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, skip: usize, limit: Option<usize>) -> Vec<Item> {
        let limit = limit
            .unwrap_or(self.config.default_page_size)
            .min(self.config.max_page_size);
        let page: Vec<Item> = {
            let inventory = self.lock.acquire().await;
            inventory.iter().skip(skip).take(limit).cloned().collect()
        };
        metrics::counter!("itemlab_store_operations_total", "op" => "list", "outcome" => "ok")
            .increment(1);
        tracing::debug!(returned = page.len(), "listed items");
        page
    }

    #[tracing::instrument(skip(self, patch))]
    pub async fn update(&self, id: &str, patch: ItemPatch) -> StoreResult<Item> {
        let result = self.update_inner(id, patch).await;
        record_op("update", &result);
        result
    }

    async fn update_inner(&self, id: &str, patch: ItemPatch) -> StoreResult<Item> {
        patch.validate()?;
        let mut inventory = self.lock.acquire().await;
        let item = inventory
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        patch.apply(item, Utc::now());
        tracing::info!(id, "item updated");
        Ok(item.clone())
    }

    /// Remove an item, returning what was removed.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> StoreResult<Item> {
        let result = {
            let mut inventory = self.lock.acquire().await;
            let removed = inventory.remove(id);
            self.lock.publish_len(inventory.len());
            removed.ok_or_else(|| StoreError::NotFound(id.to_string()))
        };
        record_op("delete", &result);
        if result.is_ok() {
            tracing::info!(id, "item deleted");
        }
        result
    }

    /// Linear scan applying every predicate of `filter`; matches come back in
    /// insertion order. No match is an empty vector, not an error.
    #[tracing::instrument(skip(self))]
    pub async fn search(&self, filter: &SearchFilter) -> StoreResult<Vec<Item>> {
        let result = match filter.validate() {
            Ok(()) => {
                let inventory = self.lock.acquire().await;
                Ok(inventory
                    .iter()
                    .filter(|item| filter.matches(item))
                    .cloned()
                    .collect::<Vec<_>>())
            }
            Err(err) => Err(err),
        };
        record_op("search", &result);
        if let Ok(matches) = &result {
            tracing::debug!(matches = matches.len(), "search finished");
        }
        result
    }

    /// Create every item or none: the batch is validated up front and
    /// inserted under a single lock acquisition.
    #[tracing::instrument(skip_all, fields(batch = items.len()))]
    pub async fn bulk_create(&self, items: Vec<NewItem>) -> StoreResult<Vec<Item>> {
        let result = self.bulk_create_inner(items).await;
        record_op("bulk_create", &result);
        result
    }

    async fn bulk_create_inner(&self, items: Vec<NewItem>) -> StoreResult<Vec<Item>> {
        self.check_batch_size(items.len())?;
        for (idx, item) in items.iter().enumerate() {
            item.validate().map_err(|err| at_index(idx, err))?;
        }

        let mut inventory = self.lock.acquire().await;
        let now = Utc::now();
        let mut created = Vec::with_capacity(items.len());
        for item in items {
            let stored = item.into_item(inventory.fresh_id(), now);
            inventory.insert(stored.clone());
            created.push(stored);
        }
        self.lock.publish_len(inventory.len());
        tracing::info!(created = created.len(), "bulk create finished");
        Ok(created)
    }

    /// Apply each patch to its id. Invalid patches fail the whole batch before
    /// anything is applied; missing ids are reported in `failed` without
    /// aborting the rest.
    #[tracing::instrument(skip_all, fields(batch = updates.len()))]
    pub async fn bulk_update(
        &self,
        updates: Vec<(String, ItemPatch)>,
    ) -> StoreResult<BulkOutcome<Item>> {
        let result = self.bulk_update_inner(updates).await;
        record_op("bulk_update", &result);
        result
    }

    /// Apply one patch to many ids with the same semantics as
    /// [`bulk_update`](Self::bulk_update).
    pub async fn bulk_update_uniform(
        &self,
        ids: Vec<String>,
        patch: ItemPatch,
    ) -> StoreResult<BulkOutcome<Item>> {
        let updates = ids.into_iter().map(|id| (id, patch.clone())).collect();
        self.bulk_update(updates).await
    }

    async fn bulk_update_inner(
        &self,
        updates: Vec<(String, ItemPatch)>,
    ) -> StoreResult<BulkOutcome<Item>> {
        self.check_batch_size(updates.len())?;
        for (idx, (_, patch)) in updates.iter().enumerate() {
            patch.validate().map_err(|err| at_index(idx, err))?;
        }

        let mut inventory = self.lock.acquire().await;
        let now = Utc::now();
        let mut outcome = BulkOutcome::new();
        for (id, patch) in updates {
            match inventory.get_mut(&id) {
                Some(item) => {
                    patch.apply(item, now);
                    outcome.succeeded.push(item.clone());
                }
                None => outcome.failed.push(not_found(id)),
            }
        }
        tracing::info!(
            updated = outcome.succeeded.len(),
            not_found = outcome.failed.len(),
            "bulk update finished"
        );
        Ok(outcome)
    }

    /// Remove each id; missing ids are reported in `failed`.
    #[tracing::instrument(skip_all, fields(batch = ids.len()))]
    pub async fn bulk_delete(&self, ids: Vec<String>) -> StoreResult<BulkOutcome<Item>> {
        let result = self.bulk_delete_inner(ids).await;
        record_op("bulk_delete", &result);
        result
    }

    async fn bulk_delete_inner(&self, ids: Vec<String>) -> StoreResult<BulkOutcome<Item>> {
        self.check_batch_size(ids.len())?;

        let mut inventory = self.lock.acquire().await;
        let mut outcome = BulkOutcome::new();
        for id in ids {
            match inventory.remove(&id) {
                Some(item) => outcome.succeeded.push(item),
                None => outcome.failed.push(not_found(id)),
            }
        }
        self.lock.publish_len(inventory.len());
        tracing::info!(
            deleted = outcome.succeeded.len(),
            not_found = outcome.failed.len(),
            "bulk delete finished"
        );
        Ok(outcome)
    }

    /// Item count as of the last mutation. Never waits for the lock.
    pub fn len(&self) -> usize {
        self.lock.counters.items.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            items_count: self.len(),
            waiting_callers: self.lock.waiting_callers(),
            lock_available: self.lock.is_available(),
        }
    }

    fn check_batch_size(&self, len: usize) -> StoreResult<()> {
        let max = self.config.max_bulk_items;
        if len == 0 || len > max {
            return Err(StoreError::validation(format!(
                "batch must contain between 1 and {max} entries, got {len}"
            )));
        }
        Ok(())
    }
}

fn at_index(idx: usize, err: StoreError) -> StoreError {
    match err {
        StoreError::Validation(msg) => StoreError::Validation(format!("entry {idx}: {msg}")),
        other => other,
    }
}

fn not_found(id: String) -> BulkFailure {
    BulkFailure {
        reason: format!("item with id {id} not found"),
        id,
    }
}

fn record_op<T>(op: &'static str, result: &StoreResult<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(err) => err.code(),
    };
    metrics::counter!("itemlab_store_operations_total", "op" => op, "outcome" => outcome)
        .increment(1);
}
