use {
  crate::{
    chain::Chain,
    envelope::{self, EncodedInscription},
    error::ProtocolError,
    gateway::{retry, BlockchainGateway, OutputRecord, RetryPolicy, TransactionRecord, Utxo},
    holder::{self, HolderMetadata},
    inscription::{validate_mint_params, ChunkManifest, InscriptionPayload},
    params::*,
  },
  bitcoin::{
    absolute::LockTime,
    address::Payload,
    consensus,
    script::{Builder, PushBytesBuf, Script},
    secp256k1::{All, Message, Secp256k1},
    sighash::{EcdsaSighashType, SighashCache},
    OutPoint, PrivateKey, PubkeyHash, PublicKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut,
    Txid, Witness,
  },
  chrono::Utc,
  serde::Serialize,
  std::sync::Arc,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferConfig {
  pub chain: Chain,
  pub min_confirmations: u32,
  pub max_chain_hops: usize,
  /// Fee rate in smallest units per 1024 bytes.
  pub fee_rate: u64,
}

impl TransferConfig {
  pub fn new(chain: Chain) -> Self {
    Self {
      chain,
      min_confirmations: MIN_CONFIRMATIONS,
      max_chain_hops: MAX_CHAIN_HOPS,
      fee_rate: 1,
    }
  }
}

impl Default for TransferConfig {
  fn default() -> Self {
    Self::new(Chain::Testnet)
  }
}

/// The sender's signing identity.
#[derive(Debug, Clone)]
pub struct Wallet {
  pub private_key: PrivateKey,
  pub public_key: PublicKey,
}

impl Wallet {
  pub fn new(private_key: PrivateKey) -> Self {
    let secp = Secp256k1::new();
    Self {
      public_key: private_key.public_key(&secp),
      private_key,
    }
  }

  pub fn pubkey_hash(&self) -> PubkeyHash {
    self.public_key.pubkey_hash()
  }

  pub fn address(&self, chain: Chain) -> bitcoin::Address {
    chain.address_from_pubkey_hash(self.pubkey_hash())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransferStatus {
  pub confirmed: bool,
  pub confirmations: u32,
  pub timestamp: u64,
  pub complete: bool,
}

/// The current, unspent holder output of an inscription, found by walking
/// the spend chain forward from the mint.
#[derive(Debug, Clone)]
pub struct HolderLocation {
  pub outpoint: OutPoint,
  pub value: u64,
  pub script: ScriptBuf,
  pub owner: PubkeyHash,
  pub metadata: HolderMetadata,
  pub hops: usize,
}

pub struct OwnershipTransferProtocol<G> {
  gateway: Arc<G>,
  config: TransferConfig,
  policy: RetryPolicy,
  secp: Secp256k1<All>,
}

fn find_holder_output(tx: &TransactionRecord) -> Option<(u32, &OutputRecord, PubkeyHash, HolderMetadata)> {
  tx.outputs.iter().enumerate().find_map(|(vout, output)| {
    holder::decode_holder_script(&output.script_pubkey)
      .ok()
      .filter(|_| output.value == HOLDER_VALUE)
      .map(|(owner, metadata)| {
        (
          u32::try_from(vout).expect("output index fits u32"),
          output,
          owner,
          metadata,
        )
      })
  })
}

impl<G: BlockchainGateway> OwnershipTransferProtocol<G> {
  pub fn new(gateway: Arc<G>, config: TransferConfig) -> Self {
    Self {
      gateway,
      config,
      policy: RetryPolicy::default(),
      secp: Secp256k1::new(),
    }
  }

  pub fn with_policy(gateway: Arc<G>, config: TransferConfig, policy: RetryPolicy) -> Self {
    Self {
      gateway,
      config,
      policy,
      secp: Secp256k1::new(),
    }
  }

  /// Walks the spend chain forward from the mint transaction to the first
  /// unspent holder output. Each hop must land on a 1-unit holder output
  /// carrying the same content id; the walk is bounded to defend against
  /// malformed chains.
  pub fn locate_holder(&self, origin_txid: Txid) -> Result<HolderLocation, ProtocolError> {
    let origin = retry(&self.policy, || self.gateway.get_transaction(origin_txid))
      .map_err(|err| ProtocolError::Fetch(format!("mint transaction {origin_txid}: {err}")))?;

    let (mut vout, output, mut owner, mut metadata) = find_holder_output(&origin)
      .ok_or_else(|| {
        ProtocolError::Utxo(format!("transaction {origin_txid} carries no holder output"))
      })?;

    let content_id = metadata.content_id.clone();
    let mut value = output.value;
    let mut script = output.script_pubkey.clone();
    let mut current_txid = origin_txid;

    for hops in 0..self.config.max_chain_hops {
      let spender = retry(&self.policy, || {
        self.gateway.get_spending_txid(current_txid, vout)
      })
      .map_err(ProtocolError::Network)?;

      let Some(spender) = spender else {
        return Ok(HolderLocation {
          outpoint: OutPoint {
            txid: current_txid,
            vout,
          },
          value,
          script,
          owner,
          metadata,
          hops,
        });
      };

      let tx = retry(&self.policy, || self.gateway.get_transaction(spender))
        .map_err(|err| ProtocolError::Fetch(format!("spending transaction {spender}: {err}")))?;

      let next = find_holder_output(&tx)
        .filter(|(_, _, _, next_metadata)| {
          next_metadata.content_id == content_id
            && (next_metadata.txid == origin_txid.to_string()
              || next_metadata.txid == DEPLOY_TXID_LITERAL)
        })
        .ok_or_else(|| {
          ProtocolError::Chain(format!("ownership chain dead-ended at {spender}"))
        })?;

      current_txid = spender;
      vout = next.0;
      value = next.1.value;
      script = next.1.script_pubkey.clone();
      owner = next.2;
      metadata = next.3;
    }

    Err(ProtocolError::Chain(format!(
      "ownership chain exceeded {} hops",
      self.config.max_chain_hops
    )))
  }

  /// Requires the holder output to be locked to the sender, unspent, worth
  /// exactly one unit, and marked as protocol-protected.
  fn validate_ownership(
    &self,
    location: &HolderLocation,
    sender: &bitcoin::Address,
  ) -> Result<(), ProtocolError> {
    let owner_address = self.config.chain.address_from_pubkey_hash(location.owner);
    if owner_address != *sender {
      return Err(ProtocolError::Ownership(format!(
        "holder output belongs to {owner_address}, not {sender}"
      )));
    }

    if location.value != HOLDER_VALUE {
      return Err(ProtocolError::Security(format!(
        "holder output value is {}, expected {HOLDER_VALUE}",
        location.value
      )));
    }

    if !holder::has_protocol_marker(&location.script) {
      return Err(ProtocolError::Security(
        "holder output lacks the protection marker".into(),
      ));
    }

    let unspent = retry(&self.policy, || {
      self
        .gateway
        .is_output_unspent(location.outpoint.txid, location.outpoint.vout)
    })
    .map_err(ProtocolError::Network)?;

    if !unspent {
      return Err(ProtocolError::Ownership(
        "holder output is already spent".into(),
      ));
    }

    Ok(())
  }

  /// Fee from a fixed per-input/per-output byte-cost model, rounded up to
  /// whole units with a floor of one.
  pub fn estimate_fee(&self, inputs: u64, outputs: u64) -> u64 {
    fn varint_len(n: u64) -> u64 {
      if n > u64::from(u32::MAX) {
        9
      } else if n > u64::from(u16::MAX) {
        5
      } else if n > 253 {
        3
      } else {
        1
      }
    }

    let size = 4
      + varint_len(inputs)
      + inputs * (40 + 108)
      + varint_len(outputs)
      + outputs * (8 + 25)
      + 4;

    self.fee_for_size(size)
  }

  /// Fee for a transaction that also carries `data_size` bytes of script
  /// payload, as mint and chunk transactions do.
  pub fn estimate_data_fee(&self, data_size: u64, inputs: u64, outputs: u64) -> u64 {
    self.fee_for_size(data_size + 10 + inputs * 148 + outputs * 34)
  }

  fn fee_for_size(&self, size: u64) -> u64 {
    (((size * self.config.fee_rate) + 1023) / 1024).max(1)
  }

  /// Ascending-value first-fit over the wallet's plain UTXOs, skipping
  /// holder outputs so ownership tokens are never burned as fees.
  fn select_funding_utxo(&self, utxos: &[Utxo], required: u64) -> Result<Utxo, ProtocolError> {
    let mut candidates: Vec<&Utxo> = utxos
      .iter()
      .filter(|utxo| !holder::is_holder_script(&utxo.script_pubkey))
      .collect();

    candidates.sort_by_key(|utxo| utxo.value);

    let available = candidates.iter().map(|utxo| utxo.value).sum();

    candidates
      .into_iter()
      .find(|utxo| utxo.value >= required)
      .cloned()
      .ok_or(ProtocolError::InsufficientFunds {
        required,
        available,
      })
  }

  fn sign_inputs(
    &self,
    tx: &mut Transaction,
    prev_scripts: &[&Script],
    wallet: &Wallet,
  ) -> Result<(), ProtocolError> {
    let sighash_type = EcdsaSighashType::All;
    let mut signatures = Vec::with_capacity(prev_scripts.len());

    {
      let cache = SighashCache::new(&*tx);
      for (index, prev_script) in prev_scripts.iter().enumerate() {
        let sighash = cache
          .legacy_signature_hash(index, prev_script, sighash_type.to_u32())
          .map_err(|err| {
            ProtocolError::Validation(format!("sighash computation failed: {err}"))
          })?;

        let message =
          Message::from_slice(&sighash[..]).expect("sighash is always 32 bytes");
        let signature = bitcoin::ecdsa::Signature {
          sig: self.secp.sign_ecdsa(&message, &wallet.private_key.inner),
          hash_ty: sighash_type,
        };
        signatures.push(signature.to_vec());
      }
    }

    for (index, signature) in signatures.into_iter().enumerate() {
      let push = PushBytesBuf::try_from(signature)
        .map_err(|_| ProtocolError::Validation("signature exceeds push limit".into()))?;
      tx.input[index].script_sig = Builder::new()
        .push_slice(push)
        .push_key(&wallet.public_key)
        .into_script();
    }

    Ok(())
  }

  fn input(outpoint: OutPoint) -> TxIn {
    TxIn {
      previous_output: outpoint,
      script_sig: ScriptBuf::new(),
      sequence: Sequence::MAX,
      witness: Witness::new(),
    }
  }

  fn broadcast(&self, tx: &Transaction) -> Result<Txid, ProtocolError> {
    let raw = consensus::encode::serialize_hex(tx);
    let txid = retry(&self.policy, || self.gateway.broadcast_transaction(&raw))
      .map_err(ProtocolError::Network)?;
    log::info!("broadcast transaction {txid}");
    Ok(txid)
  }

  /// Moves the inscription's holder output to `recipient`. Validations run
  /// first; signing and broadcast are the final steps so a failure never
  /// leaves partial on-chain state.
  pub fn create_transfer_transaction(
    &self,
    origin_txid: Txid,
    recipient: &str,
    wallet: &Wallet,
  ) -> Result<Txid, ProtocolError> {
    let recipient = self.config.chain.parse_address(recipient)?;
    let Payload::PubkeyHash(recipient_hash) = recipient.payload else {
      return Err(ProtocolError::Validation(
        "recipient must be a P2PKH address".into(),
      ));
    };

    let location = self.locate_holder(origin_txid)?;

    let sender = wallet.address(self.config.chain);
    self.validate_ownership(&location, &sender)?;

    let fee = self.estimate_fee(2, 2);
    let required = HOLDER_VALUE + fee;

    let utxos = retry(&self.policy, || self.gateway.get_unspent_outputs(&sender))
      .map_err(|err| ProtocolError::Fetch(format!("unspent outputs for {sender}: {err}")))?;
    let funding = self.select_funding_utxo(&utxos, required)?;

    let metadata = location.metadata.for_transfer(origin_txid);
    let holder_script = holder::encode_holder_script(&recipient_hash, &metadata)?;

    let mut outputs = vec![TxOut {
      value: HOLDER_VALUE,
      script_pubkey: holder_script,
    }];

    let change = funding.value.saturating_sub(fee);
    if change > 0 {
      outputs.push(TxOut {
        value: change,
        script_pubkey: ScriptBuf::new_p2pkh(&wallet.pubkey_hash()),
      });
    }

    let mut tx = Transaction {
      version: 1,
      lock_time: LockTime::ZERO,
      input: vec![
        Self::input(location.outpoint),
        Self::input(OutPoint {
          txid: funding.txid,
          vout: funding.vout,
        }),
      ],
      output: outputs,
    };

    self.sign_inputs(
      &mut tx,
      &[&location.script, &funding.script_pubkey],
      wallet,
    )?;

    self.broadcast(&tx)
  }

  /// Publishes a new inscription: the envelope output, a fresh holder
  /// output locked to the minter, and change. Oversized content first goes
  /// out as chunk transactions whose ids are recorded in the manifest.
  pub fn create_mint_transaction(
    &self,
    payload: &InscriptionPayload,
    content: &[u8],
    wallet: &Wallet,
  ) -> Result<Txid, ProtocolError> {
    validate_mint_params(
      &payload.metadata.title,
      &payload.metadata.creator,
      &payload.metadata.attributes.block_hash,
    )?;

    let envelope_script = match envelope::encode(payload, content)? {
      EncodedInscription::Single(script) => script,
      EncodedInscription::Chunked { chunks, .. } => {
        let mut references = Vec::with_capacity(chunks.len());
        for chunk_script in chunks {
          let txid = self.fund_and_broadcast(vec![TxOut {
            value: 0,
            script_pubkey: chunk_script,
          }], wallet)?;
          references.push(txid.to_string());
        }

        let mut manifest = payload.clone();
        manifest.content.chunks = Some(ChunkManifest {
          total: u32::try_from(references.len()).expect("chunk count fits u32"),
          size: u32::try_from(MAX_CHUNK_SIZE).expect("chunk size fits u32"),
          references,
        });

        match envelope::encode(&manifest, &[])? {
          EncodedInscription::Single(script) => script,
          EncodedInscription::Chunked { .. } => unreachable!("empty content never chunks"),
        }
      }
    };

    let metadata = HolderMetadata::mint(
      &payload.metadata.title,
      &payload.content_id(),
      &payload.metadata.creator,
    );
    let holder_script = holder::encode_holder_script(&wallet.pubkey_hash(), &metadata)?;

    self.fund_and_broadcast(
      vec![
        TxOut {
          value: 0,
          script_pubkey: envelope_script,
        },
        TxOut {
          value: HOLDER_VALUE,
          script_pubkey: holder_script,
        },
      ],
      wallet,
    )
  }

  /// Wraps fixed outputs into a funded, signed, broadcast transaction with
  /// change back to the wallet.
  fn fund_and_broadcast(
    &self,
    outputs: Vec<TxOut>,
    wallet: &Wallet,
  ) -> Result<Txid, ProtocolError> {
    let data_size: u64 = outputs
      .iter()
      .map(|output| u64::try_from(output.script_pubkey.len()).expect("script length fits u64"))
      .sum();
    let output_value: u64 = outputs.iter().map(|output| output.value).sum();

    let fee = self.estimate_data_fee(
      data_size,
      1,
      u64::try_from(outputs.len()).expect("output count fits u64") + 1,
    );
    let required = output_value + fee;

    let sender = wallet.address(self.config.chain);
    let utxos = retry(&self.policy, || self.gateway.get_unspent_outputs(&sender))
      .map_err(|err| ProtocolError::Fetch(format!("unspent outputs for {sender}: {err}")))?;
    let funding = self.select_funding_utxo(&utxos, required)?;

    let mut outputs = outputs;
    let change = funding.value.saturating_sub(required);
    if change > 0 {
      outputs.push(TxOut {
        value: change,
        script_pubkey: ScriptBuf::new_p2pkh(&wallet.pubkey_hash()),
      });
    }

    let mut tx = Transaction {
      version: 1,
      lock_time: LockTime::ZERO,
      input: vec![Self::input(OutPoint {
        txid: funding.txid,
        vout: funding.vout,
      })],
      output: outputs,
    };

    self.sign_inputs(&mut tx, &[&funding.script_pubkey], wallet)?;
    self.broadcast(&tx)
  }

  pub fn get_transfer_status(&self, txid: Txid) -> Result<TransferStatus, ProtocolError> {
    let tx = retry(&self.policy, || self.gateway.get_transaction(txid))
      .map_err(|err| ProtocolError::Fetch(format!("transaction {txid}: {err}")))?;

    let confirmed = tx.confirmations >= self.config.min_confirmations;

    Ok(TransferStatus {
      confirmed,
      confirmations: tx.confirmations,
      timestamp: tx.block_time.unwrap_or_else(|| {
        u64::try_from(Utc::now().timestamp()).expect("current time is after the epoch")
      }),
      complete: confirmed,
    })
  }

  /// Confirms a finished transfer: enough confirmations and the recipient
  /// holding an unspent output of the transfer transaction.
  pub fn verify_transfer(
    &self,
    transfer_txid: Txid,
    recipient: &bitcoin::Address,
  ) -> Result<bool, ProtocolError> {
    let status = self.get_transfer_status(transfer_txid)?;
    if !status.confirmed {
      return Ok(false);
    }

    let utxos = retry(&self.policy, || self.gateway.get_unspent_outputs(recipient))
      .map_err(|err| ProtocolError::Fetch(format!("unspent outputs for {recipient}: {err}")))?;

    Ok(utxos.iter().any(|utxo| utxo.txid == transfer_txid && utxo.value > 0))
  }
}

#[cfg(test)]
mod tests {
  use {
    super::*,
    crate::test::{
      mint_transaction_record_for, payload_fixture, test_wallet, MockGateway,
    },
    pretty_assertions::assert_eq,
  };

  fn protocol(gateway: &Arc<MockGateway>) -> OwnershipTransferProtocol<MockGateway> {
    OwnershipTransferProtocol::with_policy(
      gateway.clone(),
      TransferConfig::default(),
      RetryPolicy::immediate(3),
    )
  }

  /// Mints an inscription owned by wallet 1 and funds that wallet.
  fn minted_setup(gateway: &MockGateway) -> (Txid, Wallet) {
    let owner = test_wallet(1);
    let origin = mint_transaction_record_for(
      &payload_fixture(),
      b"content",
      100,
      &owner.pubkey_hash(),
    );
    let origin_txid = origin.txid;
    gateway.register_transaction(origin);
    gateway.seed_funding(&owner, 10_000);
    (origin_txid, owner)
  }

  #[test]
  fn transfer_moves_holder_and_preserves_identity() {
    let gateway = Arc::new(MockGateway::new());
    let (origin_txid, owner) = minted_setup(&gateway);
    let recipient = test_wallet(2);

    let transfer_txid = protocol(&gateway)
      .create_transfer_transaction(
        origin_txid,
        &recipient.address(Chain::Testnet).to_string(),
        &owner,
      )
      .unwrap();

    let tx = gateway.get_transaction(transfer_txid).unwrap();
    assert_eq!(tx.inputs.len(), 2);

    let (vout, output, new_owner, metadata) = tx
      .outputs
      .iter()
      .enumerate()
      .find_map(|(vout, output)| {
        holder::decode_holder_script(&output.script_pubkey)
          .ok()
          .map(|(owner, metadata)| (vout, output, owner, metadata))
      })
      .expect("transfer carries a holder output");

    assert_eq!(vout, 0);
    assert_eq!(output.value, HOLDER_VALUE);
    assert_eq!(new_owner, recipient.pubkey_hash());
    assert_eq!(metadata.operation, crate::holder::HolderOperation::Transfer);
    assert_eq!(metadata.content_id, payload_fixture().content_id());
    assert_eq!(metadata.txid, origin_txid.to_string());

    // change flows back to the sender
    let change = &tx.outputs[1];
    assert_eq!(
      change.script_pubkey,
      ScriptBuf::new_p2pkh(&owner.pubkey_hash())
    );
    assert!(change.value > 0);
  }

  #[test]
  fn non_owner_transfer_fails_with_ownership_error() {
    let gateway = Arc::new(MockGateway::new());
    let (origin_txid, _) = minted_setup(&gateway);
    let imposter = test_wallet(3);
    gateway.seed_funding(&imposter, 10_000);

    let err = protocol(&gateway)
      .create_transfer_transaction(
        origin_txid,
        &test_wallet(2).address(Chain::Testnet).to_string(),
        &imposter,
      )
      .unwrap_err();

    assert_eq!(err.code(), "OWNERSHIP_ERROR");
    assert_eq!(gateway.broadcast_count(), 0);
  }

  #[test]
  fn invalid_recipient_fails_before_any_chain_traffic() {
    let gateway = Arc::new(MockGateway::new());
    let (origin_txid, owner) = minted_setup(&gateway);

    let err = protocol(&gateway)
      .create_transfer_transaction(origin_txid, "not-an-address", &owner)
      .unwrap_err();

    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert_eq!(gateway.broadcast_count(), 0);
  }

  #[test]
  fn insufficient_funds_abort_before_broadcast() {
    let gateway = Arc::new(MockGateway::new());
    let owner = test_wallet(1);
    let origin = mint_transaction_record_for(
      &payload_fixture(),
      b"content",
      100,
      &owner.pubkey_hash(),
    );
    let origin_txid = origin.txid;
    gateway.register_transaction(origin);
    gateway.seed_funding(&owner, 1);

    let err = protocol(&gateway)
      .create_transfer_transaction(
        origin_txid,
        &test_wallet(2).address(Chain::Testnet).to_string(),
        &owner,
      )
      .unwrap_err();

    assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
    assert_eq!(gateway.broadcast_count(), 0);
  }

  #[test]
  fn locate_holder_follows_the_spend_chain() {
    let gateway = Arc::new(MockGateway::new());
    let (origin_txid, owner) = minted_setup(&gateway);
    let recipient = test_wallet(2);
    let protocol = protocol(&gateway);

    let start = protocol.locate_holder(origin_txid).unwrap();
    assert_eq!(start.hops, 0);
    assert_eq!(start.owner, owner.pubkey_hash());

    let transfer_txid = protocol
      .create_transfer_transaction(
        origin_txid,
        &recipient.address(Chain::Testnet).to_string(),
        &owner,
      )
      .unwrap();

    let current = protocol.locate_holder(origin_txid).unwrap();
    assert_eq!(current.hops, 1);
    assert_eq!(current.outpoint.txid, transfer_txid);
    assert_eq!(current.owner, recipient.pubkey_hash());
    assert_eq!(current.metadata.content_id, start.metadata.content_id);
  }

  #[test]
  fn chain_walk_is_bounded() {
    let gateway = Arc::new(MockGateway::new());
    let owner = test_wallet(1);

    let a = mint_transaction_record_for(&payload_fixture(), b"content", 100, &owner.pubkey_hash());
    let mut b = a.clone();
    b.txid = "3333333333333333333333333333333333333333333333333333333333333333"
      .parse()
      .unwrap();

    // two-transaction spend cycle
    gateway.register_transaction(a.clone());
    gateway.register_transaction(b.clone());
    gateway.mark_spent(a.txid, 1, b.txid);
    gateway.mark_spent(b.txid, 1, a.txid);

    let protocol = OwnershipTransferProtocol::with_policy(
      gateway.clone(),
      TransferConfig {
        max_chain_hops: 5,
        ..TransferConfig::default()
      },
      RetryPolicy::immediate(3),
    );

    let err = protocol.locate_holder(a.txid).unwrap_err();
    assert_eq!(err.code(), "CHAIN_ERROR");
    assert!(err.to_string().contains("exceeded 5 hops"));
  }

  #[test]
  fn dead_ended_chain_is_a_chain_error() {
    let gateway = Arc::new(MockGateway::new());
    let (origin_txid, _) = minted_setup(&gateway);

    let stranger = crate::test::empty_transaction_record(9);
    gateway.register_transaction(stranger.clone());
    gateway.mark_spent(origin_txid, 1, stranger.txid);

    let err = protocol(&gateway).locate_holder(origin_txid).unwrap_err();
    assert_eq!(err.code(), "CHAIN_ERROR");
    assert!(err.to_string().contains("dead-ended"));
  }

  #[test]
  fn fee_is_monotonic_and_at_least_one() {
    let protocol = protocol(&Arc::new(MockGateway::new()));

    for inputs in 0..6 {
      for outputs in 0..6 {
        let fee = protocol.estimate_fee(inputs, outputs);
        assert!(fee >= 1);
        assert!(protocol.estimate_fee(inputs + 1, outputs) >= fee);
        assert!(protocol.estimate_fee(inputs, outputs + 1) >= fee);
      }
    }

    // 148 bytes per input pushes past 1024 after a handful of inputs
    assert!(protocol.estimate_fee(10, 2) > 1);
  }

  #[test]
  fn funding_selection_is_smallest_sufficient() {
    let gateway = Arc::new(MockGateway::new());
    let protocol = protocol(&gateway);
    let owner = test_wallet(1);

    let utxo = |txid_byte: u8, value: u64| Utxo {
      txid: hex::encode([txid_byte; 32]).parse().unwrap(),
      vout: 0,
      script_pubkey: ScriptBuf::new_p2pkh(&owner.pubkey_hash()),
      value,
      confirmations: Some(10),
    };

    let utxos = vec![utxo(1, 5000), utxo(2, 600), utxo(3, 40)];
    assert_eq!(protocol.select_funding_utxo(&utxos, 100).unwrap().value, 600);
    assert_eq!(protocol.select_funding_utxo(&utxos, 10).unwrap().value, 40);

    let err = protocol.select_funding_utxo(&utxos, 50_000).unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
  }

  #[test]
  fn funding_selection_never_spends_holder_outputs() {
    let gateway = Arc::new(MockGateway::new());
    let protocol = protocol(&gateway);
    let owner = test_wallet(1);

    let metadata = HolderMetadata::mint("a", "id-1", "creator-address-000000000");
    let holder_utxo = Utxo {
      txid: hex::encode([4u8; 32]).parse().unwrap(),
      vout: 0,
      script_pubkey: holder::encode_holder_script(&owner.pubkey_hash(), &metadata).unwrap(),
      value: 1_000_000,
      confirmations: Some(10),
    };

    let err = protocol
      .select_funding_utxo(&[holder_utxo], 100)
      .unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
  }

  #[test]
  fn transfer_status_confirms_at_the_threshold() {
    let gateway = Arc::new(MockGateway::new());
    let (origin_txid, owner) = minted_setup(&gateway);
    let recipient = test_wallet(2);
    let protocol = protocol(&gateway);

    let transfer_txid = protocol
      .create_transfer_transaction(
        origin_txid,
        &recipient.address(Chain::Testnet).to_string(),
        &owner,
      )
      .unwrap();

    let status = protocol.get_transfer_status(transfer_txid).unwrap();
    assert!(status.confirmed);
    assert!(status.complete);
    assert_eq!(status.confirmations, 6);

    assert!(protocol
      .verify_transfer(transfer_txid, &recipient.address(Chain::Testnet))
      .unwrap());
  }

  #[test]
  fn mint_publishes_envelope_holder_and_change() {
    let gateway = Arc::new(MockGateway::new());
    let minter = test_wallet(1);
    gateway.seed_funding(&minter, 50_000);

    let payload = payload_fixture();
    let txid = protocol(&gateway)
      .create_mint_transaction(&payload, b"content", &minter)
      .unwrap();

    let tx = gateway.get_transaction(txid).unwrap();
    assert_eq!(tx.outputs.len(), 3);

    let envelope = envelope::decode(&tx.outputs[0].script_pubkey).unwrap();
    assert_eq!(envelope.payload, payload);
    assert_eq!(envelope.content, b"content");
    assert_eq!(tx.outputs[0].value, 0);

    let (owner, metadata) = holder::decode_holder_script(&tx.outputs[1].script_pubkey).unwrap();
    assert_eq!(owner, minter.pubkey_hash());
    assert_eq!(tx.outputs[1].value, HOLDER_VALUE);
    assert_eq!(metadata.txid, DEPLOY_TXID_LITERAL);
    assert_eq!(metadata.content_id, payload.content_id());

    assert!(tx.outputs[2].value > 0);
  }

  #[test]
  fn oversized_mint_chains_chunk_transactions() {
    let gateway = Arc::new(MockGateway::new());
    let minter = test_wallet(1);
    for _ in 0..4 {
      gateway.seed_funding(&minter, 1_000_000);
    }

    let mut payload = payload_fixture();
    let content = vec![9u8; MAX_CHUNK_SIZE + 1];
    payload.content.size = u64::try_from(content.len()).unwrap();

    let txid = protocol(&gateway)
      .create_mint_transaction(&payload, &content, &minter)
      .unwrap();

    // two chunk transactions plus the mint itself
    assert_eq!(gateway.broadcast_count(), 3);

    let mint = gateway.get_transaction(txid).unwrap();
    let envelope = envelope::decode(&mint.outputs[0].script_pubkey).unwrap();
    let manifest = envelope.payload.content.chunks.expect("manifest recorded");
    assert_eq!(manifest.total, 2);
    assert_eq!(manifest.references.len(), 2);

    let chunks: Vec<_> = manifest
      .references
      .iter()
      .map(|reference| {
        let chunk_tx = gateway
          .get_transaction(reference.parse().unwrap())
          .unwrap();
        envelope::decode_chunk(&chunk_tx.outputs[0].script_pubkey).unwrap()
      })
      .collect();
    assert_eq!(envelope::reassemble(&chunks).unwrap(), content);
  }

  #[test]
  fn wallet_derives_a_testnet_address() {
    let wallet = test_wallet(1);
    let address = wallet.address(Chain::Testnet);
    assert_eq!(
      Chain::Testnet.parse_address(&address.to_string()).unwrap(),
      address
    );
  }
}
