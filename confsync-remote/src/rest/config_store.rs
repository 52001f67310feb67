//! Settings table over HTTP.
//!
//! Reads and upserts go through the PostgREST table API. The change feed is
//! a background task that polls for rows changed since the last one seen
//! and hands each to the subscriber in change order.
//!
//! `updated_at` is stamped by whichever client wrote the row, so it cannot
//! order the feed. The table carries a `changed_at` column that the
//! database sets on every insert and update (column default plus an update
//! trigger); the feed follows that column instead.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use confsync_types::{ConfigEntry, Subscription};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::RestConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::store::{ChangeCallback, RemoteConfigStore};

const ROW_COLUMNS: &str = "key,value,updated_at";
const FEED_COLUMNS: &str = "key,value,updated_at,changed_at";

/// A row as seen by the change feed.
#[derive(Debug, Deserialize)]
struct FeedRow {
    key: String,
    value: Value,
    updated_at: DateTime<Utc>,
    changed_at: DateTime<Utc>,
}

impl FeedRow {
    fn into_entry(self) -> ConfigEntry {
        ConfigEntry::with_timestamp(self.key, self.value, self.updated_at)
    }
}

/// Feed position: the newest `changed_at` delivered and the keys already
/// delivered at exactly that instant. Polls ask for `gte` the position, so
/// rows sharing the instant are not lost.
struct FeedCursor {
    at: DateTime<Utc>,
    delivered: HashSet<String>,
}

impl FeedCursor {
    fn after(newest: Option<&FeedRow>) -> Self {
        match newest {
            Some(row) => Self {
                at: row.changed_at,
                delivered: HashSet::from([row.key.clone()]),
            },
            None => Self {
                at: DateTime::UNIX_EPOCH,
                delivered: HashSet::new(),
            },
        }
    }

    fn param(&self) -> String {
        format!("gte.{}", self.at.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    /// Advances past `row`; returns false if it was already delivered.
    fn advance(&mut self, row: &FeedRow) -> bool {
        if row.changed_at < self.at {
            return false;
        }
        if row.changed_at > self.at {
            self.at = row.changed_at;
            self.delivered.clear();
        }
        self.delivered.insert(row.key.clone())
    }
}

/// PostgREST-backed settings store.
pub struct RestConfigStore {
    config: RestConfig,
    client: Client,
}

impl RestConfigStore {
    /// Creates a new store for the given backend.
    pub fn new(config: RestConfig) -> RemoteResult<Self> {
        let client = config
            .build_client()
            .map_err(|e| RemoteError::InvalidConfig(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    fn table_request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        query: &[(&str, String)],
        what: &str,
    ) -> RemoteResult<Vec<T>> {
        fetch_rows(&self.client, &self.config, query, what).await
    }
}

async fn fetch_rows<T: DeserializeOwned>(
    client: &Client,
    config: &RestConfig,
    query: &[(&str, String)],
    what: &str,
) -> RemoteResult<Vec<T>> {
    let response = client
        .get(config.rest_url(&config.table))
        .header("apikey", &config.api_key)
        .bearer_auth(&config.api_key)
        .query(query)
        .send()
        .await
        .map_err(|e| transport_error(what, e))?;

    let response = check_status(response, what).await?;
    response
        .json::<Vec<T>>()
        .await
        .map_err(|e| RemoteError::Protocol(format!("failed to parse {what} response: {e}")))
}

/// Maps a `reqwest` transport failure onto the connectivity taxonomy.
pub(crate) fn transport_error(what: &str, e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout
    } else {
        RemoteError::Unavailable(format!("{what} failed: {e}"))
    }
}

/// Passes successful responses through; 5xx become `Unavailable`, other
/// failures become `Rejected`.
pub(crate) async fn check_status(response: Response, what: &str) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(RemoteError::Unavailable(format!("{what} failed ({status}): {body}")))
    } else {
        Err(RemoteError::Rejected {
            status: status.as_u16(),
            message: body,
        })
    }
}

#[async_trait]
impl RemoteConfigStore for RestConfigStore {
    fn backend_name(&self) -> &'static str {
        "rest"
    }

    async fn probe(&self) -> RemoteResult<()> {
        let response = self
            .table_request(self.client.get(self.config.rest_url(&self.config.table)))
            .query(&[("select", "key"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| transport_error("probe", e))?;
        check_status(response, "probe").await?;
        Ok(())
    }

    async fn read(&self, key: &str) -> RemoteResult<Option<ConfigEntry>> {
        debug!("Reading remote key: {}", key);
        let rows: Vec<ConfigEntry> = self
            .fetch_rows(
                &[
                    ("key", format!("eq.{key}")),
                    ("select", ROW_COLUMNS.to_string()),
                ],
                "read",
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert(&self, entry: &ConfigEntry) -> RemoteResult<ConfigEntry> {
        debug!("Upserting remote key: {}", entry.key);
        let response = self
            .table_request(self.client.post(self.config.rest_url(&self.config.table)))
            .query(&[("on_conflict", "key")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&[entry])
            .send()
            .await
            .map_err(|e| transport_error("upsert", e))?;

        let response = check_status(response, "upsert").await?;
        let rows: Vec<ConfigEntry> = response
            .json()
            .await
            .map_err(|e| RemoteError::Protocol(format!("failed to parse upsert response: {e}")))?;

        // Some deployments answer 201 with an empty body; the write still landed.
        Ok(rows.into_iter().next().unwrap_or_else(|| entry.clone()))
    }

    async fn subscribe(&self, on_change: ChangeCallback) -> RemoteResult<Subscription> {
        // Start after the most recently changed row; only later changes are delivered.
        let newest: Vec<FeedRow> = self
            .fetch_rows(
                &[
                    ("select", FEED_COLUMNS.to_string()),
                    ("order", "changed_at.desc".to_string()),
                    ("limit", "1".to_string()),
                ],
                "subscribe",
            )
            .await?;
        let mut cursor = FeedCursor::after(newest.first());

        let client = self.client.clone();
        let config = self.config.clone();
        let interval = config.poll_interval();

        let handle = tokio::spawn(async move {
            let mut failing = false;
            loop {
                tokio::time::sleep(interval).await;
                let query = [
                    ("select", FEED_COLUMNS.to_string()),
                    ("changed_at", cursor.param()),
                    ("order", "changed_at.asc".to_string()),
                ];
                match fetch_rows::<FeedRow>(&client, &config, &query, "change feed").await {
                    Ok(rows) => {
                        if failing {
                            info!("Change feed recovered");
                            failing = false;
                        }
                        for row in rows {
                            if cursor.advance(&row) {
                                on_change(row.into_entry());
                            }
                        }
                    }
                    Err(e) => {
                        if !failing {
                            warn!("Change feed poll failed: {}", e);
                            failing = true;
                        }
                    }
                }
            }
        });

        info!("Opened change feed on table '{}'", self.config.table);
        Ok(Subscription::new(move || handle.abort()))
    }
}
