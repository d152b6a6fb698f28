use {
  crate::{
    error::ProtocolError,
    gateway::{retry, BlockchainGateway, RetryPolicy, TransactionRecord},
    params::*,
    tx_cache::TransactionCache,
    verification::VerificationEngine,
  },
  std::{cmp, sync::Arc},
};

pub use self::{
  index::{BlockHeightStats, EntryStatus, IndexedInscription, InscriptionIndex},
  progress::{Checkpoint, PartialRecord, ProgressTracker, RecoveryError, RecoveryStatus},
};

mod index;
mod progress;

/// Drives progressive, checkpointed scans of historical block ranges and
/// owns the resulting inscription index. One scan may be active per
/// instance; concurrent starts fail fast.
pub struct RecoveryIndexer<G> {
  gateway: Arc<G>,
  engine: VerificationEngine<G>,
  cache: Arc<TransactionCache>,
  index: InscriptionIndex,
  progress: ProgressTracker,
  policy: RetryPolicy,
  batch_size: u64,
  checkpoint_interval: u64,
}

impl<G: BlockchainGateway> RecoveryIndexer<G> {
  pub fn new(gateway: Arc<G>) -> Self {
    Self::with_cache(gateway, Arc::new(TransactionCache::new()))
  }

  /// Shares an externally owned transaction cache, e.g. between an indexer
  /// and other gateway consumers.
  pub fn with_cache(gateway: Arc<G>, cache: Arc<TransactionCache>) -> Self {
    Self {
      engine: VerificationEngine::new(gateway.clone()),
      gateway,
      cache,
      index: InscriptionIndex::new(),
      progress: ProgressTracker::new(),
      policy: RetryPolicy::default(),
      batch_size: BATCH_SIZE,
      checkpoint_interval: CHECKPOINT_INTERVAL,
    }
  }

  pub fn set_retry_policy(&mut self, policy: RetryPolicy) {
    self.policy = policy;
    self.engine = VerificationEngine::with_policy(self.gateway.clone(), policy);
  }

  /// Scans `[start_height, end_height]` in sequential batches, indexing
  /// every verified inscription. A failing batch is recorded and skipped;
  /// the scan runs to the end of the range regardless.
  pub fn start_progressive_recovery(
    &mut self,
    start_height: u64,
    end_height: u64,
    mut on_progress: impl FnMut(&RecoveryStatus),
  ) -> Result<(), ProtocolError> {
    if self.progress.state.is_running {
      return Err(ProtocolError::AlreadyRunning);
    }

    if start_height > end_height {
      return Err(ProtocolError::Validation(format!(
        "start height {start_height} is past end height {end_height}"
      )));
    }

    self.progress.state.is_running = true;
    self.progress.state.current_block = start_height;
    self.progress.state.processed_blocks = 0;
    self.progress.state.total_blocks = end_height - start_height + 1;
    self.progress.clear_errors();

    log::info!("starting recovery of blocks {start_height}-{end_height}");

    let mut height = start_height;
    while height <= end_height {
      let batch_end = cmp::min(height + self.batch_size - 1, end_height);

      if let Err(err) = self.process_batch(height, batch_end) {
        self
          .progress
          .add_error(format!("Error processing batch {height}-{batch_end}: {err}"));
      }

      self.progress.state.current_block = batch_end + 1;
      self.progress.state.processed_blocks = batch_end - start_height + 1;
      self.progress.state.last_processed_height = batch_end;

      on_progress(&self.progress.status());

      if self.progress.state.processed_blocks % self.checkpoint_interval == 0 {
        self.progress.save_checkpoint(batch_end);
      }

      height = batch_end + 1;
    }

    self.progress.state.is_running = false;
    log::info!(
      "recovery finished: {} inscriptions indexed, {} errors",
      self.index.len(),
      self.progress.state.errors.len()
    );

    Ok(())
  }

  /// Continues a previous scan from the newest checkpoint up to
  /// `end_height`.
  pub fn resume_recovery(
    &mut self,
    end_height: u64,
    on_progress: impl FnMut(&RecoveryStatus),
  ) -> Result<(), ProtocolError> {
    let checkpoint = self
      .progress
      .state
      .last_checkpoint
      .ok_or(ProtocolError::NoCheckpoint)?;

    self.progress.restore_checkpoint(checkpoint)?;

    log::info!("resuming recovery from checkpoint at height {checkpoint}");
    self.start_progressive_recovery(checkpoint + 1, end_height, on_progress)
  }

  fn process_batch(&mut self, start_height: u64, end_height: u64) -> Result<(), ProtocolError> {
    let transactions = retry(&self.policy, || {
      self.gateway.get_block_transactions(start_height, end_height)
    })
    .map_err(|err| ProtocolError::Fetch(err.to_string()))?;

    for tx in transactions {
      self.process_transaction(tx);
    }

    Ok(())
  }

  fn process_transaction(&mut self, tx: TransactionRecord) {
    if self.cache.get(tx.txid).is_some() {
      return;
    }

    let Some(envelope) = self.engine.extract_envelope(&tx) else {
      return;
    };

    let (Some(block_hash), Some(block_height)) = (tx.block_hash, tx.block_height) else {
      self.progress.add_partial_data(
        tx.txid.to_string(),
        PartialRecord {
          errors: vec!["transaction lacks block context".into()],
          tx,
        },
      );
      return;
    };

    let report =
      self
        .engine
        .verify_inscription(&envelope.payload.content, &tx, &block_hash, block_height);

    if report.verified {
      let content_id = envelope.payload.content_id();
      log::debug!("indexed inscription {content_id} at height {block_height}");
      self
        .index
        .insert(content_id, tx.txid, block_height, true, envelope.payload);
      self.cache.insert(tx.txid, report);
    } else {
      self.progress.add_partial_data(
        tx.txid.to_string(),
        PartialRecord {
          errors: report.errors,
          tx,
        },
      );
    }
  }

  pub fn recovery_status(&self) -> RecoveryStatus {
    self.progress.status()
  }

  pub fn get_inscription(&self, content_id: &str) -> Option<&IndexedInscription> {
    self.index.get(content_id)
  }

  pub fn get_inscription_status(&self, content_id: &str) -> Option<EntryStatus> {
    self.index.status(content_id)
  }

  pub fn get_inscriptions_by_height(&self, block_height: u64) -> Vec<&IndexedInscription> {
    self.index.inscriptions_by_height(block_height)
  }

  pub fn get_all_inscriptions(&self) -> Vec<&IndexedInscription> {
    self.index.all()
  }

  pub fn get_verified_inscriptions(&self) -> Vec<&IndexedInscription> {
    self.index.verified()
  }

  pub fn get_block_height_stats(&self) -> BlockHeightStats {
    self.index.stats()
  }

  pub fn set_verification_status(&mut self, content_id: &str, verified: bool) {
    self.index.set_verification_status(content_id, verified);
  }

  pub fn partial_data(&self) -> Vec<(&String, &PartialRecord)> {
    self.progress.partial_data()
  }

  pub fn clear_partial_data(&mut self, key: &str) {
    self.progress.clear_partial_data(key);
  }

  /// Re-verifies every shelved transaction; entries that now verify move
  /// into the index, the rest return to the shelf. Returns how many
  /// recovered.
  pub fn reprocess_partial_data(&mut self) -> usize {
    let shelved: Vec<PartialRecord> = self
      .progress
      .state
      .partial_data
      .drain()
      .map(|(_, record)| record)
      .collect();

    let before = shelved.len();
    for record in shelved {
      self.process_transaction(record.tx);
    }

    before - self.progress.state.partial_data.len()
  }
}
