//! Typed, owner-scoped access to the four record tables.
//!
//! Every query adds `user_id = owner` and every insert stamps the owner, on
//! top of whatever the backend itself enforces.

pub mod jobs;
pub mod messages;
pub mod resumes;
pub mod templates;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::access::Capability;
use crate::backend::BackendError;
use crate::storage::{Query, RecordStore, Row, Table};

pub(crate) fn to_row<T: Serialize>(value: &T) -> Result<Row, BackendError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::Transport(format!(
            "expected an object row, got {other}"
        ))),
    }
}

pub(crate) fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, BackendError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

pub(crate) fn from_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, BackendError> {
    rows.into_iter().map(from_row).collect()
}

pub(crate) fn owned(cap: &Capability) -> Query {
    Query::new().eq("user_id", cap.owner_id())
}

pub(crate) fn now_value() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339())
}

/// Insert `fields` with the owner stamped in.
pub(crate) async fn insert_owned<T, F>(
    store: &dyn RecordStore,
    cap: &Capability,
    table: Table,
    fields: &F,
) -> Result<T, BackendError>
where
    T: DeserializeOwned,
    F: Serialize,
{
    let mut row = to_row(fields)?;
    row.insert(
        "user_id".to_string(),
        Value::String(cap.owner_id().to_string()),
    );
    from_row(store.insert(cap, table, row).await?)
}

/// Update one owned row by id and return it, `.single()` style.
pub(crate) async fn update_owned<T: DeserializeOwned>(
    store: &dyn RecordStore,
    cap: &Capability,
    table: Table,
    id: &str,
    patch: Row,
) -> Result<T, BackendError> {
    let rows = store
        .update(cap, table, &owned(cap).eq("id", id), patch)
        .await?;
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::no_rows(table.name()))?;
    from_row(row)
}

pub(crate) async fn get_owned<T: DeserializeOwned>(
    store: &dyn RecordStore,
    cap: &Capability,
    table: Table,
    id: &str,
) -> Result<Option<T>, BackendError> {
    store
        .select(cap, table, &owned(cap).eq("id", id).limit(1))
        .await?
        .into_iter()
        .next()
        .map(from_row)
        .transpose()
}

pub(crate) async fn list_owned<T: DeserializeOwned>(
    store: &dyn RecordStore,
    cap: &Capability,
    table: Table,
) -> Result<Vec<T>, BackendError> {
    let rows = store
        .select(cap, table, &owned(cap).order_desc("created_at"))
        .await?;
    from_rows(rows)
}

/// Returns whether a row was removed.
pub(crate) async fn delete_owned(
    store: &dyn RecordStore,
    cap: &Capability,
    table: Table,
    id: &str,
) -> Result<bool, BackendError> {
    let removed = store.delete(cap, table, &owned(cap).eq("id", id)).await?;
    Ok(removed > 0)
}
