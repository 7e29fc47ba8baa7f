//! Error type for `ragex-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] ragex_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// Raised inside a transaction; the transaction is rolled back.
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

impl Error {
  /// True if the batch was rejected before the database was touched.
  pub fn is_validation(&self) -> bool {
    matches!(self, Self::Core(e) if e.is_validation())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
