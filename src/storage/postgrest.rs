use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use super::query::{Query, RecordStore, Row, Table};
use crate::access::Capability;
use crate::backend::{BackendError, SupabaseClient};

/// Record store over Supabase's PostgREST endpoint (`/rest/v1`).
/// Row ownership is enforced server-side by row-level security.
pub struct PostgrestRecords {
    client: Arc<SupabaseClient>,
}

impl PostgrestRecords {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }

    fn path(table: Table) -> String {
        format!("/rest/v1/{}", table.name())
    }
}

fn filter_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// PostgREST query-string parameters for a query.
pub(crate) fn query_params(query: &Query, with_select: bool) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if with_select {
        params.push(("select".to_string(), "*".to_string()));
    }
    for (column, value) in &query.filters {
        let op = if value.is_null() { "is" } else { "eq" };
        params.push((column.clone(), format!("{op}.{}", filter_value(value))));
    }
    if let Some(order) = &query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{direction}", order.column)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

async fn rows_from(resp: reqwest::Response) -> Result<Vec<Row>, BackendError> {
    if !resp.status().is_success() {
        return Err(SupabaseClient::error_from(resp).await);
    }
    Ok(resp.json().await?)
}

#[async_trait]
impl RecordStore for PostgrestRecords {
    async fn select(
        &self,
        cap: &Capability,
        table: Table,
        query: &Query,
    ) -> Result<Vec<Row>, BackendError> {
        let resp = self
            .client
            .request(Method::GET, &Self::path(table), Some(cap.access_token()))
            .query(&query_params(query, true))
            .send()
            .await?;

        rows_from(resp).await
    }

    async fn insert(&self, cap: &Capability, table: Table, row: Row) -> Result<Row, BackendError> {
        let resp = self
            .client
            .request(Method::POST, &Self::path(table), Some(cap.access_token()))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;

        rows_from(resp)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::no_rows(table.name()))
    }

    async fn update(
        &self,
        cap: &Capability,
        table: Table,
        query: &Query,
        patch: Row,
    ) -> Result<Vec<Row>, BackendError> {
        let resp = self
            .client
            .request(Method::PATCH, &Self::path(table), Some(cap.access_token()))
            .query(&query_params(query, false))
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;

        rows_from(resp).await
    }

    async fn delete(
        &self,
        cap: &Capability,
        table: Table,
        query: &Query,
    ) -> Result<u64, BackendError> {
        let resp = self
            .client
            .request(Method::DELETE, &Self::path(table), Some(cap.access_token()))
            .query(&query_params(query, false))
            .header("Prefer", "return=representation")
            .send()
            .await?;

        Ok(rows_from(resp).await?.len() as u64)
    }
}
