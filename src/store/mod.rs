//! Remote store abstraction.
//!
//! A [`RemoteStore`] is the authoritative home of every table the sync layer
//! mirrors. It offers ordered selects, row-level writes keyed by `id`, and a
//! per-table change subscription delivering events from every client.

pub mod memory;
pub mod realtime;
pub mod rest;

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};

pub use memory::MemoryStore;
pub use realtime::RealtimeListener;
pub use rest::RestStore;

/// A loosely typed row as exchanged with the store.
pub type Row = Map<String, Value>;

/// Ordering clause for selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }

    /// Query-string form, e.g. `created_at.desc`.
    pub fn to_query(&self) -> String {
        format!(
            "{}.{}",
            self.column,
            if self.ascending { "asc" } else { "desc" }
        )
    }
}

/// Kind of row change reported on a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

/// A change to one row of one table, made by any client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub id: Option<String>,
}

/// Live change feed for one table.
///
/// Events arrive until [`unsubscribe`](Subscription::unsubscribe) is called or
/// the handle is dropped; either releases the underlying connection.
#[derive(Debug)]
pub struct Subscription {
    table: String,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    teardown: Option<oneshot::Sender<()>>,
}

impl Subscription {
    /// Build a subscription from an event feed and the producer's teardown signal.
    pub fn new(
        table: impl Into<String>,
        events: mpsc::UnboundedReceiver<ChangeEvent>,
        teardown: oneshot::Sender<()>,
    ) -> Self {
        Self {
            table: table.into(),
            events,
            teardown: Some(teardown),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Wait for the next change. `None` once the producer has gone away.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Take an already delivered change without waiting.
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        self.events.try_recv().ok()
    }

    /// Release the subscription.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(tx) = self.teardown.take() {
            let _ = tx.send(());
            self.events.close();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// Row-level access to the hosted backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch every row of `table` in the given order.
    async fn select(&self, table: &str, order: &OrderBy) -> Result<Vec<Row>, StoreError>;

    /// Insert one row; returns it with generated columns filled in.
    async fn insert(&self, table: &str, row: Row) -> Result<Row, StoreError>;

    /// Patch the row with the given id; returns the updated row.
    async fn update(&self, table: &str, id: &str, patch: Row) -> Result<Row, StoreError>;

    /// Delete the row with the given id.
    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError>;

    /// Subscribe to inserts, updates and deletes on `table` from any client.
    async fn subscribe(&self, table: &str) -> Result<Subscription, StoreError>;
}
