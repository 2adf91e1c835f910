use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::query::{Row, Table};
use super::tables::definition;

impl Database {
    // ========================================================================
    // Row operations
    // ========================================================================

    /// Insert a row under `id`. Returns false, writing nothing, if the id is taken.
    pub fn insert_row(&self, table: Table, id: &str, row: &Row) -> Result<bool, DatabaseError> {
        debug_assert!(!id.is_empty(), "row id must not be empty");

        let write_txn = self.begin_write()?;
        let inserted = {
            let mut t = write_txn.open_table(definition(table))?;
            if t.get(id)?.is_some() {
                false
            } else {
                let data = rmp_serde::to_vec_named(row)?;
                t.insert(id, data.as_slice())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    /// Overwrite existing rows in one transaction
    pub fn replace_rows(&self, table: Table, rows: &[(String, Row)]) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        {
            let mut t = write_txn.open_table(definition(table))?;
            for (id, row) in rows {
                let data = rmp_serde::to_vec_named(row)?;
                t.insert(id.as_str(), data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_row(&self, table: Table, id: &str) -> Result<Option<Row>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let t = read_txn.open_table(definition(table))?;

        match t.get(id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// All rows of a table, in key order
    pub fn scan_rows(&self, table: Table) -> Result<Vec<Row>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let t = read_txn.open_table(definition(table))?;

        let mut rows = Vec::new();
        for result in t.iter()? {
            let (_, value) = result?;
            rows.push(rmp_serde::from_slice(value.value())?);
        }
        Ok(rows)
    }

    /// Remove rows by id; returns how many existed
    pub fn remove_rows(&self, table: Table, ids: &[String]) -> Result<u64, DatabaseError> {
        let write_txn = self.begin_write()?;
        let mut removed = 0;
        {
            let mut t = write_txn.open_table(definition(table))?;
            for id in ids {
                if t.remove(id.as_str())?.is_some() {
                    removed += 1;
                }
            }
        }
        write_txn.commit()?;
        Ok(removed)
    }
}
