//! Query functions take a plain `&Connection` so they compose inside
//! [`crate::Database::with_tx`] as well as [`crate::Database::with_conn`].

pub mod accounts;
pub mod applications;
pub mod postings;
pub mod resumes;

use anyhow::Result;

/// Extension trait for optional query results
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
