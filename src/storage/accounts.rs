use super::db::{Database, DatabaseError};
use super::models::Account;
use super::tables::*;
use crate::auth::Session;

const CURRENT_SESSION: &str = "current";

impl Database {
    // ========================================================================
    // Account operations
    // ========================================================================

    /// Store an account keyed by its (lowercased) email
    pub fn put_account(&self, account: &Account) -> Result<(), DatabaseError> {
        debug_assert!(!account.email.is_empty(), "account email must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(AUTH_ACCOUNTS)?;
            let data = rmp_serde::to_vec_named(account)?;
            table.insert(account.email.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_account(&self, email: &str) -> Result<Option<Account>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(AUTH_ACCOUNTS)?;

        match table.get(email)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Session slot
    // ========================================================================

    /// The session restored on startup, if one was left signed in
    pub fn current_session(&self) -> Result<Option<Session>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(AUTH_STATE)?;

        match table.get(CURRENT_SESSION)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    pub fn set_current_session(&self, session: Option<&Session>) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(AUTH_STATE)?;
            match session {
                Some(session) => {
                    let data = rmp_serde::to_vec_named(session)?;
                    table.insert(CURRENT_SESSION, data.as_slice())?;
                }
                None => {
                    table.remove(CURRENT_SESSION)?;
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}
