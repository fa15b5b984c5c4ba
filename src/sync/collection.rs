//! The synchronization collection.
//!
//! Consistency rules:
//! - creates are applied locally only after the store confirms them;
//! - updates and deletes are applied locally first, and a failure triggers a
//!   full refetch before the error is returned (if that refetch also fails,
//!   the previous local copy is restored);
//! - every change event from the store triggers a full refetch;
//! - a fetch response older than one already applied is discarded.

use super::Entity;
use crate::error::{StoreError, SyncError, SyncResult};
use crate::store::{OrderBy, RemoteStore, Subscription};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Observable state of a collection.
#[derive(Debug, Clone)]
pub struct SyncState<E> {
    /// Newest first by creation time.
    pub items: Vec<E>,
    /// True while a full fetch is in flight.
    pub loading: bool,
    /// Last fetch failure, cleared by the next successful fetch.
    pub error: Option<SyncError>,
}

impl<E> Default for SyncState<E> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

#[derive(Default)]
struct FetchCounter {
    issued: u64,
    applied: u64,
    in_flight: usize,
}

struct Listener {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// In-memory mirror of one remote table.
pub struct Collection<E: Entity> {
    store: Arc<dyn RemoteStore>,
    state: watch::Sender<SyncState<E>>,
    fetches: Mutex<FetchCounter>,
    listener: Mutex<Option<Listener>>,
}

impl<E: Entity> Collection<E> {
    /// Create an unmounted collection: empty, with no change subscription.
    pub fn new(store: Arc<dyn RemoteStore>) -> Arc<Self> {
        let (state, _) = watch::channel(SyncState::default());
        Arc::new(Self {
            store,
            state,
            fetches: Mutex::new(FetchCounter::default()),
            listener: Mutex::new(None),
        })
    }

    /// Create a collection, subscribe to its table's changes, and fetch it.
    ///
    /// Never fails: fetch and subscription failures are recorded in `error`.
    pub async fn mount(store: Arc<dyn RemoteStore>) -> Arc<Self> {
        let collection = Self::new(store);

        // Subscribe before fetching so no change slips between the two.
        let subscribed = collection.store.subscribe(E::TABLE).await;
        let subscribe_error = match subscribed {
            Ok(subscription) => {
                collection.spawn_listener(subscription);
                None
            }
            Err(err) => {
                error!(table = E::TABLE, error = %err, "Change subscription failed");
                Some(SyncError::from_store(
                    &err,
                    &format!("Failed to subscribe to {} changes", E::TABLE),
                ))
            }
        };

        let _ = collection.fetch_all().await;

        if let Some(err) = subscribe_error {
            collection.state.send_modify(|s| s.error = Some(err));
        }
        collection
    }

    fn spawn_listener(self: &Arc<Self>, mut subscription: Subscription) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let (stop, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            info!(table = E::TABLE, "Subscribed to changes");
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    event = subscription.next() => {
                        let Some(event) = event else {
                            warn!(table = E::TABLE, "Change feed ended");
                            break;
                        };
                        // One refetch covers every change already queued.
                        let mut coalesced = 0usize;
                        while subscription.try_next().is_some() {
                            coalesced += 1;
                        }
                        debug!(
                            table = E::TABLE,
                            kind = ?event.kind,
                            id = ?event.id,
                            coalesced,
                            "Change received; refetching"
                        );
                        let Some(collection) = weak.upgrade() else { break };
                        if let Err(err) = collection.fetch_all().await {
                            warn!(table = E::TABLE, error = %err, "Refetch after change failed");
                        }
                    }
                }
            }
            subscription.unsubscribe();
            info!(table = E::TABLE, "Unsubscribed from changes");
        });

        let previous = self
            .listener
            .lock()
            .unwrap()
            .replace(Listener { stop, handle });
        if let Some(previous) = previous {
            let _ = previous.stop.send(());
        }
    }

    /// Stop listening for changes and release the subscription.
    pub async fn unmount(&self) {
        let listener = self.listener.lock().unwrap().take();
        if let Some(listener) = listener {
            let _ = listener.stop.send(());
            if let Err(err) = listener.handle.await {
                warn!(table = E::TABLE, error = %err, "Change listener ended abnormally");
            }
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.listener
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|l| !l.handle.is_finished())
    }

    // ---------------------------------------------------------------------
    // State access
    // ---------------------------------------------------------------------

    /// Copy of the current state.
    pub fn snapshot(&self) -> SyncState<E> {
        self.state.borrow().clone()
    }

    pub fn items(&self) -> Vec<E> {
        self.state.borrow().items.clone()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn error(&self) -> Option<SyncError> {
        self.state.borrow().error.clone()
    }

    pub fn get(&self, id: &str) -> Option<E> {
        self.state
            .borrow()
            .items
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    /// Receiver that is marked changed on every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<SyncState<E>> {
        self.state.subscribe()
    }

    // ---------------------------------------------------------------------
    // Operations
    // ---------------------------------------------------------------------

    /// Replace the local mirror with the store's current rows, newest first.
    pub async fn fetch_all(&self) -> SyncResult<()> {
        let seq = {
            let mut fetches = self.fetches.lock().unwrap();
            fetches.issued += 1;
            fetches.in_flight += 1;
            fetches.issued
        };
        self.state.send_modify(|s| s.loading = true);

        let result = self
            .store
            .select(E::TABLE, &OrderBy::desc("created_at"))
            .await;

        let (apply, still_loading) = {
            let mut fetches = self.fetches.lock().unwrap();
            fetches.in_flight -= 1;
            let apply = seq > fetches.applied;
            if apply {
                fetches.applied = seq;
            }
            (apply, fetches.in_flight > 0)
        };

        match result {
            Ok(rows) => {
                let items: Vec<E> = rows
                    .iter()
                    .filter_map(|row| match E::from_row(row) {
                        Ok(item) => Some(item),
                        Err(err) => {
                            warn!(table = E::TABLE, error = %err, "Skipping malformed row");
                            None
                        }
                    })
                    .collect();
                debug!(table = E::TABLE, count = items.len(), stale = !apply, "Fetched rows");
                self.state.send_modify(|s| {
                    if apply {
                        s.items = items;
                        s.error = None;
                    }
                    s.loading = still_loading;
                });
                Ok(())
            }
            Err(err) => {
                error!(table = E::TABLE, error = %err, "Fetch failed");
                let sync_err = SyncError::from_store(&err, &format!("Failed to fetch {}", E::TABLE));
                self.state.send_modify(|s| {
                    if apply {
                        s.error = Some(sync_err.clone());
                    }
                    s.loading = still_loading;
                });
                Err(sync_err)
            }
        }
    }

    /// Same as [`fetch_all`](Self::fetch_all).
    pub async fn refetch(&self) -> SyncResult<()> {
        self.fetch_all().await
    }

    /// Insert a new row; the confirmed record is prepended locally.
    pub async fn create(&self, fields: E::New) -> SyncResult<E> {
        E::validate_new(&fields)?;
        let row = E::insert_row(&fields);
        debug!(table = E::TABLE, columns = ?row.keys().collect::<Vec<_>>(), "Creating {}", E::NOUN);

        let stored = self
            .store
            .insert(E::TABLE, row)
            .await
            .map_err(|err| {
                error!(table = E::TABLE, error = %err, "Insert failed");
                write_error::<E>(&err, "add")
            })?;

        let entity = E::from_row(&stored)?;
        self.state.send_modify(|s| {
            // A change-triggered refetch may already have brought the row in.
            s.items.retain(|item| item.id() != entity.id());
            s.items.insert(0, entity.clone());
        });
        info!(table = E::TABLE, id = entity.id(), "Created {}", E::NOUN);
        Ok(entity)
    }

    /// Apply a patch locally, then remotely; resynchronize on failure.
    pub async fn update(&self, id: &str, patch: E::Patch) -> SyncResult<E> {
        E::validate_patch(&patch)?;
        let payload = E::patch_row(&patch);
        if payload.is_empty() {
            return Err(SyncError::invalid_value("patch", "No fields to update"));
        }

        let mut previous: Option<E> = None;
        self.state.send_modify(|s| {
            if let Some(item) = s.items.iter_mut().find(|item| item.id() == id) {
                previous = Some(item.clone());
                item.apply_patch(&patch);
            }
        });

        debug!(table = E::TABLE, id, columns = ?payload.keys().collect::<Vec<_>>(), "Updating {}", E::NOUN);
        let outcome = match self.store.update(E::TABLE, id, payload).await {
            Ok(row) => E::from_row(&row),
            Err(err) => {
                error!(table = E::TABLE, id, error = %err, "Update failed");
                Err(write_error::<E>(&err, "update"))
            }
        };

        match outcome {
            Ok(confirmed) => {
                self.state.send_modify(|s| {
                    if let Some(item) = s.items.iter_mut().find(|item| item.id() == id) {
                        *item = confirmed.clone();
                    }
                });
                info!(table = E::TABLE, id, "Updated {}", E::NOUN);
                Ok(confirmed)
            }
            Err(err) => {
                self.resync(|items| {
                    if let Some(previous) = previous {
                        if let Some(item) = items.iter_mut().find(|item| item.id() == id) {
                            *item = previous;
                        }
                    }
                })
                .await;
                Err(err)
            }
        }
    }

    /// Remove a row locally, then remotely; resynchronize on failure.
    pub async fn delete(&self, id: &str) -> SyncResult<()> {
        let mut removed: Option<(usize, E)> = None;
        self.state.send_modify(|s| {
            if let Some(pos) = s.items.iter().position(|item| item.id() == id) {
                removed = Some((pos, s.items.remove(pos)));
            }
        });

        debug!(table = E::TABLE, id, "Deleting {}", E::NOUN);
        match self.store.delete(E::TABLE, id).await {
            Ok(()) => {
                info!(table = E::TABLE, id, "Deleted {}", E::NOUN);
                Ok(())
            }
            Err(err) => {
                error!(table = E::TABLE, id, error = %err, "Delete failed");
                self.resync(|items| {
                    if let Some((pos, item)) = removed {
                        if !items.iter().any(|i| i.id() == item.id()) {
                            items.insert(pos.min(items.len()), item);
                        }
                    }
                })
                .await;
                Err(write_error::<E>(&err, "delete"))
            }
        }
    }

    /// Discard optimistic changes by refetching; restore locally if that fails too.
    async fn resync(&self, restore: impl FnOnce(&mut Vec<E>)) {
        warn!(table = E::TABLE, "Rolling back optimistic change");
        if let Err(err) = self.fetch_all().await {
            warn!(table = E::TABLE, error = %err, "Resync failed; restoring previous local copy");
            self.state.send_modify(|s| restore(&mut s.items));
        }
    }
}

impl<E: Entity> Drop for Collection<E> {
    fn drop(&mut self) {
        let listener = self.listener.get_mut().ok().and_then(Option::take);
        if let Some(listener) = listener {
            let _ = listener.stop.send(());
        }
    }
}

fn write_error<E: Entity>(err: &StoreError, verb: &str) -> SyncError {
    if err.is_missing_column() {
        SyncError::schema_mismatch(E::TABLE, err)
    } else {
        SyncError::from_store(err, &format!("Failed to {} {}", verb, E::NOUN))
    }
}
