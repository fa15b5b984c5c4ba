//! In-process remote store.
//!
//! Behaves like the hosted backend from a client's point of view: the store
//! assigns ids and timestamps, rejects columns outside a table's declared
//! schema, and broadcasts every change to all subscribers, whichever client
//! made it. Several collections sharing one `MemoryStore` behave like several
//! browser tabs against the same project.
//!
//! Failures can be queued per operation to exercise rollback paths, and every
//! request is recorded so outgoing payloads can be inspected.

use super::{ChangeEvent, ChangeKind, OrderBy, RemoteStore, Row, Subscription};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

/// Store operation, used to target injected failures and label recorded requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
    Subscribe,
}

/// A request as received by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub operation: Operation,
    pub table: String,
    pub id: Option<String>,
    pub payload: Option<Row>,
}

#[derive(Default)]
struct Tables {
    rows: HashMap<String, Vec<Row>>,
    columns: HashMap<String, HashSet<String>>,
    failures: VecDeque<(Operation, StoreError)>,
    requests: Vec<RecordedRequest>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Tables {
    fn take_failure(&mut self, operation: Operation) -> Option<StoreError> {
        let pos = self.failures.iter().position(|(op, _)| *op == operation)?;
        self.failures.remove(pos).map(|(_, err)| err)
    }

    fn record(&mut self, operation: Operation, table: &str, id: Option<&str>, payload: Option<&Row>) {
        self.requests.push(RecordedRequest {
            operation,
            table: table.to_string(),
            id: id.map(str::to_string),
            payload: payload.cloned(),
        });
    }

    fn check_columns(&self, table: &str, row: &Row) -> Result<(), StoreError> {
        let Some(allowed) = self.columns.get(table) else {
            return Ok(());
        };
        match row.keys().find(|key| !allowed.contains(key.as_str())) {
            Some(unknown) => Err(StoreError::Rejected {
                message: format!(
                    "column \"{}\" of relation \"{}\" does not exist",
                    unknown, table
                ),
                code: Some("42703".to_string()),
                details: None,
            }),
            None => Ok(()),
        }
    }

    /// Strictly increasing timestamps so creation order is total.
    fn next_timestamp(&mut self) -> String {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, false)
    }
}

/// In-memory [`RemoteStore`] with change broadcasting.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    changes: broadcast::Sender<ChangeEvent>,
    active: Arc<Mutex<HashMap<String, usize>>>,
}

impl MemoryStore {
    /// Create an empty store with no schema restrictions.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            tables: Mutex::new(Tables::default()),
            changes,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Restrict `table` to the given columns; writes naming other columns are rejected.
    pub fn with_columns(self, table: &str, columns: &[&str]) -> Self {
        self.tables.lock().unwrap().columns.insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    /// Make the next `operation` call fail with `err`.
    pub fn fail_next(&self, operation: Operation, err: StoreError) {
        self.tables
            .lock()
            .unwrap()
            .failures
            .push_back((operation, err));
    }

    /// Rows currently stored in `table`, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .unwrap()
            .rows
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.tables.lock().unwrap().requests.clone()
    }

    /// Requests of one operation kind.
    pub fn requests_for(&self, operation: Operation) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.operation == operation)
            .collect()
    }

    /// Number of open subscriptions on `table`.
    pub fn active_subscriptions(&self, table: &str) -> usize {
        self.active
            .lock()
            .unwrap()
            .get(table)
            .copied()
            .unwrap_or(0)
    }

    fn publish(&self, table: &str, kind: ChangeKind, id: &str) {
        // No receivers is fine: nobody is listening.
        let _ = self.changes.send(ChangeEvent {
            table: table.to_string(),
            kind,
            id: Some(id.to_string()),
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn row_id(row: &Row) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

/// Order values the way a database would: numbers and strings by value, nulls last.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select(&self, table: &str, order: &OrderBy) -> Result<Vec<Row>, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        tables.record(Operation::Select, table, None, None);
        if let Some(err) = tables.take_failure(Operation::Select) {
            return Err(err);
        }

        let mut rows = tables.rows.get(table).cloned().unwrap_or_default();
        // Newest insert first among equal keys.
        rows.reverse();
        rows.sort_by(|a, b| {
            let ord = compare_values(a.get(&order.column), b.get(&order.column));
            if order.ascending {
                ord
            } else {
                // Nulls stay last in both directions.
                match (a.get(&order.column), b.get(&order.column)) {
                    (None | Some(Value::Null), _) | (_, None | Some(Value::Null)) => ord,
                    _ => ord.reverse(),
                }
            }
        });
        debug!(table, count = rows.len(), "memory store select");
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row, StoreError> {
        let stored = {
            let mut tables = self.tables.lock().unwrap();
            tables.record(Operation::Insert, table, None, Some(&row));
            if let Some(err) = tables.take_failure(Operation::Insert) {
                return Err(err);
            }
            tables.check_columns(table, &row)?;

            if row_id(&row).is_none() {
                row.insert(
                    "id".to_string(),
                    Value::String(uuid::Uuid::new_v4().to_string()),
                );
            }
            let id = row_id(&row).unwrap_or_default().to_string();
            let existing = tables.rows.get(table).map_or(false, |rows| {
                rows.iter().any(|r| row_id(r) == Some(id.as_str()))
            });
            if existing {
                return Err(StoreError::Rejected {
                    message: format!(
                        "duplicate key value violates unique constraint \"{}_pkey\"",
                        table
                    ),
                    code: Some("23505".to_string()),
                    details: Some(format!("Key (id)=({}) already exists.", id)),
                });
            }

            let ts = tables.next_timestamp();
            row.insert("created_at".to_string(), Value::String(ts.clone()));
            row.insert("updated_at".to_string(), Value::String(ts));
            tables
                .rows
                .entry(table.to_string())
                .or_default()
                .push(row.clone());
            row
        };

        if let Some(id) = row_id(&stored) {
            self.publish(table, ChangeKind::Insert, id);
        }
        Ok(stored)
    }

    async fn update(&self, table: &str, id: &str, patch: Row) -> Result<Row, StoreError> {
        let updated = {
            let mut tables = self.tables.lock().unwrap();
            tables.record(Operation::Update, table, Some(id), Some(&patch));
            if let Some(err) = tables.take_failure(Operation::Update) {
                return Err(err);
            }
            tables.check_columns(table, &patch)?;

            let ts = tables.next_timestamp();
            let row = tables
                .rows
                .get_mut(table)
                .and_then(|rows| rows.iter_mut().find(|r| row_id(r) == Some(id)))
                .ok_or_else(|| StoreError::NotFound {
                    table: table.to_string(),
                    id: id.to_string(),
                })?;
            for (key, value) in patch {
                // Identifiers are immutable.
                if key != "id" {
                    row.insert(key, value);
                }
            }
            row.insert("updated_at".to_string(), Value::String(ts));
            row.clone()
        };

        self.publish(table, ChangeKind::Update, id);
        Ok(updated)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError> {
        let removed = {
            let mut tables = self.tables.lock().unwrap();
            tables.record(Operation::Delete, table, Some(id), None);
            if let Some(err) = tables.take_failure(Operation::Delete) {
                return Err(err);
            }
            match tables.rows.get_mut(table) {
                Some(rows) => {
                    let before = rows.len();
                    rows.retain(|r| row_id(r) != Some(id));
                    rows.len() != before
                }
                None => false,
            }
        };

        if removed {
            self.publish(table, ChangeKind::Delete, id);
        }
        Ok(())
    }

    async fn subscribe(&self, table: &str) -> Result<Subscription, StoreError> {
        {
            let mut tables = self.tables.lock().unwrap();
            tables.record(Operation::Subscribe, table, None, None);
            if let Some(err) = tables.take_failure(Operation::Subscribe) {
                return Err(err);
            }
        }

        let mut source = self.changes.subscribe();
        let (tx, events) = mpsc::unbounded_channel();
        let (teardown_tx, mut teardown_rx) = oneshot::channel::<()>();
        let active = Arc::clone(&self.active);
        let table_name = table.to_string();

        *active.lock().unwrap().entry(table_name.clone()).or_insert(0) += 1;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut teardown_rx => break,
                    msg = source.recv() => match msg {
                        Ok(event) if event.table == table_name => {
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(table = %table_name, skipped, "Subscriber lagged; requesting full refresh");
                            let resync = ChangeEvent {
                                table: table_name.clone(),
                                kind: ChangeKind::Update,
                                id: None,
                            };
                            if tx.send(resync).is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }

            let mut active = active.lock().unwrap();
            if let Some(count) = active.get_mut(&table_name) {
                *count = count.saturating_sub(1);
            }
            debug!(table = %table_name, "memory store subscription closed");
        });

        Ok(Subscription::new(table, events, teardown_tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().expect("object literal")
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamps() {
        let store = MemoryStore::new();
        let inserted = store
            .insert("projects", row(json!({"name": "Launch"})))
            .await
            .unwrap();

        assert!(row_id(&inserted).is_some());
        assert!(inserted.get("created_at").and_then(Value::as_str).is_some());
        assert_eq!(store.rows("projects").len(), 1);
    }

    #[tokio::test]
    async fn test_select_orders_newest_first() {
        let store = MemoryStore::new();
        for name in ["a", "b", "c"] {
            store
                .insert("projects", row(json!({ "name": name })))
                .await
                .unwrap();
        }

        let rows = store
            .select("projects", &OrderBy::desc("created_at"))
            .await
            .unwrap();
        let names: Vec<&str> = rows
            .iter()
            .map(|r| r.get("name").and_then(Value::as_str).unwrap())
            .collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_unknown_column_rejected() {
        let store = MemoryStore::new().with_columns("projects", &["id", "name"]);
        let err = store
            .insert("projects", row(json!({"name": "x", "due_date": "2025-01-01"})))
            .await
            .unwrap_err();
        assert!(err.is_missing_column());
        assert!(store.rows("projects").is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update("tasks", "nope", row(json!({"title": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_injected_failure_consumed_once() {
        let store = MemoryStore::new();
        store.fail_next(Operation::Select, StoreError::Transport("offline".into()));

        assert!(store.select("tasks", &OrderBy::desc("created_at")).await.is_err());
        assert!(store.select("tasks", &OrderBy::desc("created_at")).await.is_ok());
    }

    #[tokio::test]
    async fn test_subscription_filters_by_table() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("tasks").await.unwrap();

        store
            .insert("projects", row(json!({"name": "ignored"})))
            .await
            .unwrap();
        let task = store
            .insert("tasks", row(json!({"title": "seen"})))
            .await
            .unwrap();

        let event = sub.next().await.unwrap();
        assert_eq!(event.table, "tasks");
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.id.as_deref(), row_id(&task));
    }
}
