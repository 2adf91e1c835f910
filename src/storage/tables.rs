use redb::TableDefinition;

use super::query::Table;

/// Resume rows: id -> row (msgpack)
pub const RESUMES: TableDefinition<&str, &[u8]> = TableDefinition::new("resumes");

/// Outreach message rows: id -> row (msgpack)
pub const GENERATED_MESSAGES: TableDefinition<&str, &[u8]> =
    TableDefinition::new("generated_messages");

/// Message template rows: id -> row (msgpack)
pub const PROMPT_TEMPLATES: TableDefinition<&str, &[u8]> =
    TableDefinition::new("prompt_templates");

/// Tracked job rows: id -> row (msgpack)
pub const JOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("jobs");

/// Local accounts: lowercased email -> Account (msgpack)
pub const AUTH_ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("auth_accounts");

/// Persisted session slot: "current" -> Session (msgpack)
pub const AUTH_STATE: TableDefinition<&str, &[u8]> = TableDefinition::new("auth_state");

pub(crate) fn definition(table: Table) -> TableDefinition<'static, &'static str, &'static [u8]> {
    match table {
        Table::Resumes => RESUMES,
        Table::GeneratedMessages => GENERATED_MESSAGES,
        Table::PromptTemplates => PROMPT_TEMPLATES,
        Table::Jobs => JOBS,
    }
}
