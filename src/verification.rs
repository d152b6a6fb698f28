use {
  crate::{
    envelope::{self, Envelope},
    error::ProtocolError,
    gateway::{retry, BlockchainGateway, RetryPolicy, TransactionRecord},
    inscription::{checksum, ContentDescriptor},
    params::*,
  },
  bitcoin::{Address, BlockHash, Txid},
  serde::Serialize,
  std::sync::Arc,
};

/// Outcome of verifying one candidate inscription. Individual check failures
/// land in `errors`; verification itself never fails the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerificationReport {
  pub verified: bool,
  pub block_verified: bool,
  pub signature_verified: bool,
  pub timestamp_verified: bool,
  pub errors: Vec<String>,
}

pub struct VerificationEngine<G> {
  gateway: Arc<G>,
  policy: RetryPolicy,
}

impl<G: BlockchainGateway> VerificationEngine<G> {
  pub fn new(gateway: Arc<G>) -> Self {
    Self {
      gateway,
      policy: RetryPolicy::default(),
    }
  }

  pub fn with_policy(gateway: Arc<G>, policy: RetryPolicy) -> Self {
    Self { gateway, policy }
  }

  /// True iff some output script carries a memepool envelope.
  pub fn is_inscription_transaction(&self, tx: &TransactionRecord) -> bool {
    self.extract_envelope(tx).is_some()
  }

  /// The first decodable memepool envelope among the outputs, if any.
  pub fn extract_envelope(&self, tx: &TransactionRecord) -> Option<Envelope> {
    tx.outputs
      .iter()
      .filter(|output| envelope::is_inscription_script(&output.script_pubkey))
      .find_map(|output| {
        envelope::decode(&output.script_pubkey)
          .ok()
          .filter(|envelope| envelope.payload.is_memepool())
      })
  }

  /// Runs the block, signature, and timestamp checks, folding every failure
  /// into the report instead of surfacing it.
  pub fn verify_inscription(
    &self,
    content: &ContentDescriptor,
    tx: &TransactionRecord,
    block_hash: &BlockHash,
    block_height: u64,
  ) -> VerificationReport {
    let mut report = VerificationReport::default();

    match retry(&self.policy, || {
      self.gateway.verify_block_hash(block_hash, block_height)
    }) {
      Ok(true) if tx.block_hash.map_or(true, |actual| actual == *block_hash) => {
        report.block_verified = true;
      }
      Ok(_) => report.errors.push("block hash verification failed".into()),
      Err(err) => report
        .errors
        .push(format!("block hash verification failed: {err}")),
    }

    if !tx.inputs.is_empty()
      && tx
        .inputs
        .iter()
        .all(|input| !input.script_sig.as_bytes().is_empty())
    {
      report.signature_verified = true;
    } else {
      report
        .errors
        .push("transaction signature verification failed".into());
    }

    match tx.block_time {
      Some(block_time) => {
        let block_ms = block_time.saturating_mul(1000);
        if content.timestamp.abs_diff(block_ms) <= TIMESTAMP_VARIANCE_MS {
          report.timestamp_verified = true;
        } else {
          report.errors.push("timestamp verification failed".into());
        }
      }
      None => report
        .errors
        .push("timestamp verification failed: block time unavailable".into()),
    }

    report.verified =
      report.block_verified && report.signature_verified && report.timestamp_verified;
    report
  }

  /// Recomputes the content hash and compares the essential metadata fields.
  /// Returns false, never an error, on missing input.
  pub fn verify_content(
    &self,
    content: &[u8],
    claimed: &ContentDescriptor,
    inscription: &ContentDescriptor,
  ) -> bool {
    if content.is_empty() {
      return false;
    }

    checksum(content) == inscription.content_hash
      && claimed.content_type == inscription.content_type
      && claimed.timestamp == inscription.timestamp
      && claimed.size == inscription.size
  }

  /// True iff `address` holds an unspent output of `txid` with positive
  /// value. Transport failure is a verification error, distinguishing "not
  /// owner" from "could not determine".
  pub fn validate_ownership(&self, address: &Address, txid: Txid) -> Result<bool, ProtocolError> {
    let utxos = retry(&self.policy, || self.gateway.get_unspent_outputs(address))
      .map_err(|err| ProtocolError::Verification(format!("failed to validate ownership: {err}")))?;

    Ok(utxos.iter().any(|utxo| utxo.txid == txid && utxo.value > 0))
  }

  /// Confirmation check against the standard threshold.
  pub fn check_transaction_confirmations(
    &self,
    txid: Txid,
  ) -> Result<(bool, u32), ProtocolError> {
    let tx = retry(&self.policy, || self.gateway.get_transaction(txid)).map_err(|err| {
      ProtocolError::Verification(format!("failed to check confirmations: {err}"))
    })?;

    Ok((tx.confirmations >= MIN_CONFIRMATIONS, tx.confirmations))
  }
}

#[cfg(test)]
mod tests {
  use {
    super::*,
    crate::test::{mint_transaction_record, payload_fixture, MockGateway},
    bitcoin::hashes::Hash,
  };

  fn engine(gateway: &Arc<MockGateway>) -> VerificationEngine<MockGateway> {
    VerificationEngine::with_policy(gateway.clone(), RetryPolicy::immediate(3))
  }

  #[test]
  fn classifies_inscription_transactions() {
    let gateway = Arc::new(MockGateway::new());
    let engine = engine(&gateway);

    let tx = mint_transaction_record(&payload_fixture(), b"content", 100);
    assert!(engine.is_inscription_transaction(&tx));

    let mut plain = tx.clone();
    plain.outputs.clear();
    assert!(!engine.is_inscription_transaction(&plain));
  }

  #[test]
  fn rejects_foreign_protocols() {
    let gateway = Arc::new(MockGateway::new());
    let engine = engine(&gateway);

    let mut payload = payload_fixture();
    payload.protocol = "ordinals".into();
    let tx = mint_transaction_record(&payload, b"content", 100);

    assert!(!engine.is_inscription_transaction(&tx));
  }

  #[test]
  fn verify_inscription_passes_consistent_records() {
    let gateway = Arc::new(MockGateway::new());
    let payload = payload_fixture();
    let tx = mint_transaction_record(&payload, b"content", 100);
    gateway.register_block_hash(100, tx.block_hash.unwrap());

    let report = engine(&gateway).verify_inscription(
      &payload.content,
      &tx,
      &tx.block_hash.unwrap(),
      100,
    );

    assert!(report.verified, "errors: {:?}", report.errors);
  }

  #[test]
  fn verify_inscription_collects_failures_without_throwing() {
    let gateway = Arc::new(MockGateway::new());
    let payload = payload_fixture();
    let mut tx = mint_transaction_record(&payload, b"content", 100);
    gateway.register_block_hash(100, tx.block_hash.unwrap());

    tx.inputs.clear();
    tx.block_time = Some(payload.content.timestamp / 1000 + 7200);

    let report = engine(&gateway).verify_inscription(
      &payload.content,
      &tx,
      &BlockHash::all_zeros(),
      100,
    );

    assert!(!report.verified);
    assert!(!report.block_verified);
    assert!(!report.signature_verified);
    assert!(!report.timestamp_verified);
    assert_eq!(report.errors.len(), 3);
  }

  #[test]
  fn timestamp_window_is_thirty_minutes() {
    let gateway = Arc::new(MockGateway::new());
    let payload = payload_fixture();
    let mut tx = mint_transaction_record(&payload, b"content", 100);
    gateway.register_block_hash(100, tx.block_hash.unwrap());
    let engine = engine(&gateway);

    tx.block_time = Some((payload.content.timestamp - TIMESTAMP_VARIANCE_MS) / 1000);
    let report =
      engine.verify_inscription(&payload.content, &tx, &tx.block_hash.unwrap(), 100);
    assert!(report.timestamp_verified);

    tx.block_time = Some((payload.content.timestamp - TIMESTAMP_VARIANCE_MS) / 1000 - 1);
    let report =
      engine.verify_inscription(&payload.content, &tx, &tx.block_hash.unwrap(), 100);
    assert!(!report.timestamp_verified);
  }

  #[test]
  fn verify_content_checks_hash_and_metadata() {
    let gateway = Arc::new(MockGateway::new());
    let engine = engine(&gateway);

    let content = b"content".to_vec();
    let mut inscription = payload_fixture().content;
    inscription.content_hash = checksum(&content);
    let claimed = inscription.clone();

    assert!(engine.verify_content(&content, &claimed, &inscription));
    assert!(!engine.verify_content(&[], &claimed, &inscription));
    assert!(!engine.verify_content(b"tampered", &claimed, &inscription));

    let mut wrong_size = claimed.clone();
    wrong_size.size += 1;
    assert!(!engine.verify_content(&content, &wrong_size, &inscription));
  }

  #[test]
  fn validate_ownership_distinguishes_transport_failure() {
    let gateway = Arc::new(MockGateway::new());
    let engine = engine(&gateway);
    let address = crate::test::test_address(7);

    assert!(!engine.validate_ownership(&address, Txid::all_zeros()).unwrap());

    gateway.fail_utxo_lookups();
    let err = engine
      .validate_ownership(&address, Txid::all_zeros())
      .unwrap_err();
    assert_eq!(err.code(), "VERIFICATION_ERROR");
  }
}
