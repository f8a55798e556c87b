//! HTTP remote store speaking PostgREST conventions.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use super::{RemoteStore, Session, Table};
use crate::sync::SyncError;

/// Remote store backed by a PostgREST endpoint under `{base_url}/rest/v1`.
#[derive(Clone)]
pub struct RestRemoteStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestRemoteStore {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.name())
    }

    fn authorize(&self, request: RequestBuilder, session: &Session) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
    }

    async fn send(request: RequestBuilder) -> Result<Response, SyncError> {
        let resp = request
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(SyncError::Backend { status, message });
        }

        Ok(resp)
    }
}

/// PostgREST equality filter value.
fn eq(value: &str) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn select(&self, session: &Session, table: Table) -> Result<Vec<Value>, SyncError> {
        let request = self
            .client
            .get(self.table_url(table))
            .query(&[("user_id", eq(&session.user_id)), ("select", "*".to_string())]);

        Self::send(self.authorize(request, session))
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Parse(e.to_string()))
    }

    async fn upsert(
        &self,
        session: &Session,
        table: Table,
        rows: Vec<Value>,
    ) -> Result<(), SyncError> {
        let request = self
            .client
            .post(self.table_url(table))
            .query(&[("on_conflict", table.conflict_target())])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&rows);

        Self::send(self.authorize(request, session)).await?;
        Ok(())
    }

    async fn delete(
        &self,
        session: &Session,
        table: Table,
        filter: &[(&str, String)],
    ) -> Result<(), SyncError> {
        let query: Vec<(&str, String)> = filter
            .iter()
            .map(|(col, value)| (*col, eq(value)))
            .collect();
        let request = self.client.delete(self.table_url(table)).query(&query);

        Self::send(self.authorize(request, session)).await?;
        Ok(())
    }
}
