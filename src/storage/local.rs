use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use super::db::Database;
use super::query::{Order, Query, RecordStore, Row, Table};
use crate::access::Capability;
use crate::backend::{codes, BackendError};

/// Record store over the embedded database.
///
/// Enforces what the hosted store enforces through its policies and
/// constraints: rows are only visible to their owner, inserts must carry the
/// caller's id, and constraint violations answer with Postgres error codes.
pub struct LocalRecords {
    db: Database,
}

impl LocalRecords {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn visible(&self, cap: &Capability, table: Table) -> Result<Vec<Row>, BackendError> {
        Ok(self
            .db
            .scan_rows(table)?
            .into_iter()
            .filter(|row| owner_of(row) == Some(cap.owner_id()))
            .collect())
    }

    fn check_references(
        &self,
        cap: &Capability,
        table: Table,
        row: &Row,
    ) -> Result<(), BackendError> {
        if table != Table::GeneratedMessages {
            return Ok(());
        }
        let Some(Value::String(resume_id)) = row.get("resume_id") else {
            return Ok(());
        };

        let exists = self
            .db
            .get_row(Table::Resumes, resume_id)?
            .map(|r| owner_of(&r) == Some(cap.owner_id()))
            .unwrap_or(false);
        if !exists {
            return Err(BackendError::api(
                409,
                Some(codes::FOREIGN_KEY_VIOLATION),
                format!(
                    "insert or update on table \"{}\" violates foreign key constraint \"{}_resume_id_fkey\"",
                    table.name(),
                    table.name()
                ),
            ));
        }
        Ok(())
    }
}

fn owner_of(row: &Row) -> Option<&str> {
    row.get("user_id").and_then(Value::as_str)
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn invalid_uuid(value: &Value) -> BackendError {
    let shown = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    BackendError::api(
        400,
        Some(codes::INVALID_TEXT_REPRESENTATION),
        format!("invalid input syntax for type uuid: \"{shown}\""),
    )
}

fn check_uuid(value: &Value) -> Result<(), BackendError> {
    match value {
        Value::Null => Ok(()),
        Value::String(s) if uuid::Uuid::parse_str(s).is_ok() => Ok(()),
        other => Err(invalid_uuid(other)),
    }
}

fn check_filters(table: Table, query: &Query) -> Result<(), BackendError> {
    for (column, value) in &query.filters {
        if table.uuid_columns().contains(&column.as_str()) {
            check_uuid(value)?;
        }
    }
    Ok(())
}

fn check_row_types(table: Table, row: &Row) -> Result<(), BackendError> {
    for column in table.uuid_columns() {
        if let Some(value) = row.get(*column) {
            check_uuid(value)?;
        }
    }
    Ok(())
}

fn rls_violation(table: Table) -> BackendError {
    BackendError::api(
        403,
        Some(codes::INSUFFICIENT_PRIVILEGE),
        format!(
            "new row violates row-level security policy for table \"{}\"",
            table.name()
        ),
    )
}

/// Orders JSON values the way their column types would: timestamps
/// chronologically, numbers numerically, everything else as text. Nulls last.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn sort_rows(rows: &mut [Row], order: &Order) {
    rows.sort_by(|a, b| {
        // Ids are time-ordered (v7), so they break ties in insertion order.
        let ordering = compare_values(a.get(&order.column), b.get(&order.column))
            .then_with(|| compare_values(a.get("id"), b.get("id")));
        if order.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    });
}

fn row_id(row: &Row) -> Option<String> {
    row.get("id").and_then(Value::as_str).map(str::to_string)
}

#[async_trait]
impl RecordStore for LocalRecords {
    async fn select(
        &self,
        cap: &Capability,
        table: Table,
        query: &Query,
    ) -> Result<Vec<Row>, BackendError> {
        check_filters(table, query)?;

        let mut rows: Vec<Row> = self
            .visible(cap, table)?
            .into_iter()
            .filter(|row| query.matches(row))
            .collect();

        if let Some(order) = &query.order {
            sort_rows(&mut rows, order);
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(
        &self,
        cap: &Capability,
        table: Table,
        mut row: Row,
    ) -> Result<Row, BackendError> {
        if let Some(owner) = owner_of(&row) {
            if !cap.owns(owner) {
                return Err(rls_violation(table));
            }
        }

        let id = match row_id(&row) {
            Some(id) => id,
            None => {
                let id = uuid::Uuid::now_v7().to_string();
                row.insert("id".to_string(), Value::String(id.clone()));
                id
            }
        };
        check_row_types(table, &row)?;

        for column in table.required_columns() {
            if matches!(row.get(*column), None | Some(Value::Null)) {
                return Err(BackendError::api(
                    400,
                    Some(codes::NOT_NULL_VIOLATION),
                    format!(
                        "null value in column \"{column}\" of relation \"{}\" violates not-null constraint",
                        table.name()
                    ),
                ));
            }
        }

        let now = now_timestamp();
        for column in table.timestamp_columns() {
            if matches!(row.get(*column), None | Some(Value::Null)) {
                row.insert(column.to_string(), Value::String(now.clone()));
            }
        }

        self.check_references(cap, table, &row)?;

        if !self.db.insert_row(table, &id, &row)? {
            return Err(BackendError::api(
                409,
                Some(codes::UNIQUE_VIOLATION),
                format!(
                    "duplicate key value violates unique constraint \"{}_pkey\"",
                    table.name()
                ),
            ));
        }

        Ok(row)
    }

    async fn update(
        &self,
        cap: &Capability,
        table: Table,
        query: &Query,
        mut patch: Row,
    ) -> Result<Vec<Row>, BackendError> {
        check_filters(table, query)?;
        patch.remove("id");
        check_row_types(table, &patch)?;

        if let Some(owner) = owner_of(&patch) {
            if !cap.owns(owner) {
                return Err(rls_violation(table));
            }
        }
        self.check_references(cap, table, &patch)?;

        let mut updated = Vec::new();
        for mut row in self.visible(cap, table)? {
            if !query.matches(&row) {
                continue;
            }
            let Some(id) = row_id(&row) else {
                continue;
            };
            for (column, value) in &patch {
                row.insert(column.clone(), value.clone());
            }
            updated.push((id, row));
        }

        self.db.replace_rows(table, &updated)?;
        Ok(updated.into_iter().map(|(_, row)| row).collect())
    }

    async fn delete(
        &self,
        cap: &Capability,
        table: Table,
        query: &Query,
    ) -> Result<u64, BackendError> {
        check_filters(table, query)?;

        let ids: Vec<String> = self
            .visible(cap, table)?
            .iter()
            .filter(|row| query.matches(row))
            .filter_map(row_id)
            .collect();

        Ok(self.db.remove_rows(table, &ids)?)
    }
}
