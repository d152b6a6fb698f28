use {
  bitcoin::{Address, BlockHash, ScriptBuf, Txid},
  serde::{Deserialize, Serialize},
  std::{thread, time::Duration},
};

/// A transaction as reported by the remote ledger API, carrying the block
/// context the verification checks need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
  pub txid: Txid,
  pub inputs: Vec<InputRecord>,
  pub outputs: Vec<OutputRecord>,
  pub block_hash: Option<BlockHash>,
  pub block_height: Option<u64>,
  /// Block time in epoch seconds, as ledgers report it.
  pub block_time: Option<u64>,
  pub confirmations: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
  pub script_sig: ScriptBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
  pub value: u64,
  pub script_pubkey: ScriptBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utxo {
  pub txid: Txid,
  pub vout: u32,
  pub script_pubkey: ScriptBuf,
  pub value: u64,
  pub confirmations: Option<u32>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
  #[error("rate limited")]
  RateLimited,

  #[error("http status {status}")]
  Http { status: u16 },

  #[error("transport failure: {0}")]
  Transport(String),

  #[error("not found")]
  NotFound,

  #[error("invalid response: {0}")]
  InvalidResponse(String),
}

impl GatewayError {
  pub fn is_rate_limit(&self) -> bool {
    matches!(self, Self::RateLimited | Self::Http { status: 429 })
  }

  pub fn is_transient(&self) -> bool {
    match self {
      Self::RateLimited | Self::Transport(_) => true,
      Self::Http { status } => *status == 429 || *status >= 500,
      Self::NotFound | Self::InvalidResponse(_) => false,
    }
  }
}

/// The remote ledger surface the protocol depends on. Implementations live
/// outside this crate; everything here treats the gateway as stateless and
/// reentrant.
pub trait BlockchainGateway: Send + Sync {
  fn get_block_transactions(
    &self,
    height_start: u64,
    height_end: u64,
  ) -> Result<Vec<TransactionRecord>, GatewayError>;

  fn get_block_transaction_details(
    &self,
    block_hash: &BlockHash,
  ) -> Result<Vec<TransactionRecord>, GatewayError>;

  fn verify_block_hash(&self, hash: &BlockHash, height: u64) -> Result<bool, GatewayError>;

  fn get_transaction(&self, txid: Txid) -> Result<TransactionRecord, GatewayError>;

  fn get_transaction_hex(&self, txid: Txid) -> Result<String, GatewayError>;

  fn get_unspent_outputs(&self, address: &Address) -> Result<Vec<Utxo>, GatewayError>;

  fn broadcast_transaction(&self, raw_hex: &str) -> Result<Txid, GatewayError>;

  fn is_output_unspent(&self, txid: Txid, vout: u32) -> Result<bool, GatewayError>;

  /// The txid spending the given output, or `None` while it is unspent.
  /// A 404 from the remote means "unspent" by convention.
  fn get_spending_txid(&self, txid: Txid, vout: u32) -> Result<Option<Txid>, GatewayError>;
}

/// The single backoff policy every network-calling method goes through:
/// base delay doubling per attempt, with rate-limit responses pushed onto a
/// longer schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub base_delay: Duration,
  pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      base_delay: Duration::from_millis(500),
      rate_limit_delay: Duration::from_secs(2),
    }
  }
}

impl RetryPolicy {
  /// Policy with no sleeping, for tests and embedded callers with their own
  /// pacing.
  pub fn immediate(max_attempts: u32) -> Self {
    Self {
      max_attempts,
      base_delay: Duration::ZERO,
      rate_limit_delay: Duration::ZERO,
    }
  }

  pub fn delay_for(&self, attempt: u32, error: &GatewayError) -> Duration {
    let base = if error.is_rate_limit() {
      self.rate_limit_delay
    } else {
      self.base_delay
    };
    base * 2u32.saturating_pow(attempt)
  }
}

/// Runs `op`, retrying transient failures per the policy. Non-transient
/// failures and exhausted retries propagate to the caller.
pub fn retry<T>(
  policy: &RetryPolicy,
  mut op: impl FnMut() -> Result<T, GatewayError>,
) -> Result<T, GatewayError> {
  let mut attempt = 0;
  loop {
    match op() {
      Ok(value) => return Ok(value),
      Err(err) if err.is_transient() && attempt + 1 < policy.max_attempts => {
        log::debug!("transient gateway failure (attempt {attempt}): {err}");
        thread::sleep(policy.delay_for(attempt, &err));
        attempt += 1;
      }
      Err(err) => return Err(err),
    }
  }
}
