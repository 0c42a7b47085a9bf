use thiserror::Error;

/// Raised when admin input names a status outside the closed
/// Pending/Verified/Rejected set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid status '{raw}': must be Pending, Verified, or Rejected")]
pub struct InvalidStatus {
    pub raw: String,
}
