mod accounts;
pub mod db;
mod local;
pub mod models;
mod postgrest;
pub mod query;
mod rows;
mod tables;

pub use db::{Database, DatabaseError};
pub use local::LocalRecords;
pub use postgrest::PostgrestRecords;
pub use query::{Order, Query, RecordStore, Row, Table};
pub use tables::*;
