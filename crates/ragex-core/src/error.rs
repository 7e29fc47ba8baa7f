//! Error types for `ragex-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("name must not be empty")]
  EmptyName,

  #[error("position_id must be at least 1")]
  InvalidPosition,

  #[error("duplicate position_id in request: {0}")]
  DuplicatePosition(u32),

  #[error("filename must not be empty")]
  EmptyFilename,

  #[error("duplicate filename in request: {0:?}")]
  DuplicateFilename(String),

  #[error("unknown complexity: {0:?}")]
  UnknownComplexity(String),

  #[error("unknown confidence level: {0:?}")]
  UnknownConfidence(String),

  #[error("ranking must contain at least one entry")]
  EmptyRanking,
}

impl Error {
  /// True for errors caused by a malformed batch, detected before any write.
  pub fn is_validation(&self) -> bool {
    matches!(
      self,
      Self::EmptyName
        | Self::InvalidPosition
        | Self::DuplicatePosition(_)
        | Self::EmptyFilename
        | Self::DuplicateFilename(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
