use crate::gateway::GatewayError;

/// Typed error surfaced by every protocol component. Each variant maps to a
/// stable code so callers can branch without string matching.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
  #[error("malformed script or metadata: {0}")]
  Format(String),

  #[error("invalid input: {0}")]
  Validation(String),

  #[error("holder invariant violated: {0}")]
  Security(String),

  #[error("caller is not the current owner: {0}")]
  Ownership(String),

  #[error("no usable output: {0}")]
  Utxo(String),

  #[error("insufficient funds: required {required}, available {available}")]
  InsufficientFunds { required: u64, available: u64 },

  #[error("ownership chain walk failed: {0}")]
  Chain(String),

  #[error("network error: {0}")]
  Network(#[from] GatewayError),

  #[error("fetch failed: {0}")]
  Fetch(String),

  #[error("could not determine verification outcome: {0}")]
  Verification(String),

  #[error("recovery already running")]
  AlreadyRunning,

  #[error("no checkpoint found to resume from")]
  NoCheckpoint,
}

impl ProtocolError {
  pub fn code(&self) -> &'static str {
    match self {
      Self::Format(_) => "FORMAT_ERROR",
      Self::Validation(_) => "VALIDATION_ERROR",
      Self::Security(_) => "SECURITY_ERROR",
      Self::Ownership(_) => "OWNERSHIP_ERROR",
      Self::Utxo(_) => "UTXO_ERROR",
      Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
      Self::Chain(_) => "CHAIN_ERROR",
      Self::Network(_) => "NETWORK_ERROR",
      Self::Fetch(_) => "FETCH_ERROR",
      Self::Verification(_) => "VERIFICATION_ERROR",
      Self::AlreadyRunning => "ALREADY_RUNNING",
      Self::NoCheckpoint => "NO_CHECKPOINT",
    }
  }
}
