//! Remote record store over a PostgREST-style HTTP API (e.g. a Supabase table).

use super::{LogRecord, RecordStore, StoreError, UserLogSet};
use std::time::Duration;
use tracing::debug;

pub struct RestRecordStore {
    client: reqwest::blocking::Client,
    table_url: String,
    user_column: String,
    select: String,
    api_key: String,
}

impl RestRecordStore {
    pub fn new(
        endpoint: &str,
        table: &str,
        user_column: &str,
        api_key: String,
        fields: &[String],
        timeout_secs: u64,
    ) -> Result<Self, StoreError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            table_url: table_url(endpoint, table),
            user_column: user_column.to_string(),
            select: fields.join(","),
            api_key,
        })
    }

    pub fn table_url(&self) -> &str {
        &self.table_url
    }

    pub fn select(&self) -> &str {
        &self.select
    }
}

fn table_url(endpoint: &str, table: &str) -> String {
    format!("{}/rest/v1/{}", endpoint.trim_end_matches('/'), table)
}

/// Parse a PostgREST response body (a JSON array of row objects).
pub(crate) fn parse_rows(body: &str) -> Result<Vec<LogRecord>, StoreError> {
    Ok(serde_json::from_str(body)?)
}

impl RecordStore for RestRecordStore {
    fn fetch(&self, user_id: &str) -> Result<Option<UserLogSet>, StoreError> {
        let filter = format!("eq.{}", user_id);
        let res = self
            .client
            .get(&self.table_url)
            .query(&[("select", self.select.as_str()), (self.user_column.as_str(), filter.as_str())])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().unwrap_or_default();
            return Err(StoreError::Backend(format!("{} {}", status, text)));
        }
        let rows = parse_rows(&res.text()?)?;
        debug!(rows = rows.len(), "record store rows received");
        // PostgREST cannot tell "no such user" from "user without rows".
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(UserLogSet::new(user_id, rows)))
    }
}
