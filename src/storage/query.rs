use async_trait::async_trait;
use serde_json::Value;

use crate::access::Capability;
use crate::backend::BackendError;

/// A row as exchanged with the record store.
pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Resumes,
    GeneratedMessages,
    PromptTemplates,
    Jobs,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::Resumes,
        Table::GeneratedMessages,
        Table::PromptTemplates,
        Table::Jobs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Resumes => "resumes",
            Table::GeneratedMessages => "generated_messages",
            Table::PromptTemplates => "prompt_templates",
            Table::Jobs => "jobs",
        }
    }

    /// Columns the backend fills with `now()` when an insert omits them.
    pub fn timestamp_columns(&self) -> &'static [&'static str] {
        match self {
            Table::GeneratedMessages => &["created_at"],
            _ => &["created_at", "updated_at"],
        }
    }

    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            Table::Resumes => &["user_id", "filename", "file_type"],
            Table::GeneratedMessages => &["user_id", "recipient_name", "message"],
            Table::PromptTemplates => &["user_id", "name"],
            Table::Jobs => &["user_id", "title"],
        }
    }

    /// Columns holding UUIDs; malformed values are rejected like a uuid column would.
    pub fn uuid_columns(&self) -> &'static [&'static str] {
        match self {
            Table::GeneratedMessages => &["id", "user_id", "resume_id"],
            _ => &["id", "user_id"],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Equality filters, ordering and limit: the subset of PostgREST the app uses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending: false,
        });
        self
    }

    pub fn order_asc(mut self, column: &str) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending: true,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.filters
            .iter()
            .all(|(column, value)| row.get(column) == Some(value))
    }
}

/// Hosted relational store. Every call runs as the capability's owner; rows
/// belonging to anybody else are invisible to it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn select(
        &self,
        cap: &Capability,
        table: Table,
        query: &Query,
    ) -> Result<Vec<Row>, BackendError>;
    /// Returns the stored row, including backend-filled columns.
    async fn insert(&self, cap: &Capability, table: Table, row: Row) -> Result<Row, BackendError>;
    /// Applies `patch` to every row matching `query`'s filters; returns the updated rows.
    async fn update(
        &self,
        cap: &Capability,
        table: Table,
        query: &Query,
        patch: Row,
    ) -> Result<Vec<Row>, BackendError>;
    /// Returns the number of rows removed.
    async fn delete(&self, cap: &Capability, table: Table, query: &Query)
        -> Result<u64, BackendError>;
}
