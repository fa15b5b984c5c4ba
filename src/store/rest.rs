//! HTTP remote store speaking the backend's REST dialect.
//!
//! Tables live under `{url}/rest/v1/{table}`. Rows are filtered with
//! `id=eq.{id}`, ordered with `order={column}.{asc|desc}`, and writes ask for
//! the affected rows back with `Prefer: return=representation`.

use super::{RealtimeListener, OrderBy, RemoteStore, Row, Subscription};
use crate::config::StoreConfig;
use crate::error::StoreError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Error body returned by the REST endpoint.
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

/// [`RemoteStore`] backed by the hosted REST API and realtime websocket.
pub struct RestStore {
    client: Client,
    base_url: String,
    realtime: Option<RealtimeListener>,
}

impl RestStore {
    /// Build a client from store settings.
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        if config.url.trim().is_empty() {
            return Err(StoreError::Transport("store url is not configured".into()));
        }
        let headers = default_headers(config)?;
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let realtime = config.realtime.then(|| {
            RealtimeListener::new(
                &config.url,
                &config.anon_key,
                &config.schema,
                config.access_token.clone(),
            )
        });

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            realtime,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn by_id(&self, builder: RequestBuilder, id: &str) -> RequestBuilder {
        builder.query(&[("id", format!("eq.{}", id))])
    }
}

fn header(name: &'static str, value: &str) -> Result<(HeaderName, HeaderValue), StoreError> {
    let value = HeaderValue::from_str(value)
        .map_err(|e| StoreError::Transport(format!("invalid {} header: {}", name, e)))?;
    Ok((HeaderName::from_static(name), value))
}

fn default_headers(config: &StoreConfig) -> Result<HeaderMap, StoreError> {
    let bearer = config
        .access_token
        .as_deref()
        .unwrap_or(config.anon_key.as_str());

    let mut headers = HeaderMap::new();
    for (name, value) in [
        header("apikey", &config.anon_key)?,
        header("authorization", &format!("Bearer {}", bearer))?,
    ] {
        headers.insert(name, value);
    }
    if config.schema != "public" {
        headers.insert(
            HeaderName::from_static("accept-profile"),
            header("accept-profile", &config.schema)?.1,
        );
        headers.insert(
            HeaderName::from_static("content-profile"),
            header("content-profile", &config.schema)?.1,
        );
    }
    Ok(headers)
}

fn transport(err: reqwest::Error) -> StoreError {
    if err.is_decode() {
        StoreError::Decode(err.to_string())
    } else {
        StoreError::Transport(err.to_string())
    }
}

/// Pass successful responses through; turn error bodies into [`StoreError::Rejected`].
async fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.map_err(transport)?;
    let rejected = match serde_json::from_str::<ApiError>(&body) {
        Ok(api) => StoreError::Rejected {
            message: if api.message.is_empty() {
                status.to_string()
            } else {
                api.message
            },
            code: api.code,
            details: api.details.or(api.hint),
        },
        Err(_) => StoreError::Rejected {
            message: if body.trim().is_empty() {
                status.to_string()
            } else {
                body
            },
            code: Some(status.as_u16().to_string()),
            details: None,
        },
    };
    Err(rejected)
}

fn first_row(table: &str, id: Option<&str>, rows: Vec<Row>) -> Result<Row, StoreError> {
    rows.into_iter().next().ok_or_else(|| match id {
        Some(id) => StoreError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        },
        None => StoreError::Decode(format!("{} insert returned no row", table)),
    })
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn select(&self, table: &str, order: &OrderBy) -> Result<Vec<Row>, StoreError> {
        debug!(table, order = %order.to_query(), "GET rows");
        let response = self
            .client
            .get(self.table_url(table))
            .query(&[("select", "*".to_string()), ("order", order.to_query())])
            .send()
            .await
            .map_err(transport)?;
        check(response).await?.json().await.map_err(transport)
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, StoreError> {
        debug!(table, columns = ?row.keys().collect::<Vec<_>>(), "POST row");
        let response = self
            .client
            .post(self.table_url(table))
            .header("prefer", "return=representation")
            .json(&[row])
            .send()
            .await
            .map_err(transport)?;
        let rows: Vec<Row> = check(response).await?.json().await.map_err(transport)?;
        first_row(table, None, rows)
    }

    async fn update(&self, table: &str, id: &str, patch: Row) -> Result<Row, StoreError> {
        debug!(table, id, columns = ?patch.keys().collect::<Vec<_>>(), "PATCH row");
        let request = self
            .client
            .patch(self.table_url(table))
            .header("prefer", "return=representation")
            .json(&patch);
        let response = self.by_id(request, id).send().await.map_err(transport)?;
        let rows: Vec<Row> = check(response).await?.json().await.map_err(transport)?;
        first_row(table, Some(id), rows)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError> {
        debug!(table, id, "DELETE row");
        let request = self.client.delete(self.table_url(table));
        let response = self.by_id(request, id).send().await.map_err(transport)?;
        check(response).await?;
        Ok(())
    }

    async fn subscribe(&self, table: &str) -> Result<Subscription, StoreError> {
        if let Some(ref realtime) = self.realtime {
            return Ok(realtime.subscribe(table));
        }

        info!(table, "Realtime disabled; subscription will stay idle");
        let (tx, events) = mpsc::unbounded_channel();
        let (teardown_tx, teardown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = teardown_rx.await;
            drop(tx);
        });
        Ok(Subscription::new(table, events, teardown_tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StoreConfig {
        StoreConfig {
            url: "https://abc.example.co/".to_string(),
            anon_key: "anon".to_string(),
            ..StoreConfig::default()
        }
    }

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let store = RestStore::from_config(&config()).unwrap();
        assert_eq!(
            store.table_url("projects"),
            "https://abc.example.co/rest/v1/projects"
        );
    }

    #[test]
    fn test_missing_url_rejected() {
        let err = RestStore::from_config(&StoreConfig::default()).err().unwrap();
        assert!(matches!(err, StoreError::Transport(_)));
    }

    #[test]
    fn test_default_headers_prefer_access_token() {
        let mut cfg = config();
        cfg.access_token = Some("user-jwt".to_string());
        cfg.schema = "tenant".to_string();
        let headers = default_headers(&cfg).unwrap();
        assert_eq!(headers["apikey"], "anon");
        assert_eq!(headers["authorization"], "Bearer user-jwt");
        assert_eq!(headers["accept-profile"], "tenant");

        let headers = default_headers(&config()).unwrap();
        assert_eq!(headers["authorization"], "Bearer anon");
        assert!(headers.get("accept-profile").is_none());
    }

    #[test]
    fn test_first_row_empty_update_is_not_found() {
        let err = first_row("tasks", Some("t1"), Vec::new()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
