//! Error types for `hse-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown kpi status: {0:?}")]
  UnknownStatus(String),

  #[error("unknown period type: {0:?}")]
  UnknownPeriodType(String),

  #[error("year {0} is out of range for period seeding")]
  InvalidYear(i32),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
