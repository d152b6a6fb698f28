use {
  crate::{error::ProtocolError, gateway::TransactionRecord, params::MAX_CHECKPOINTS},
  chrono::{DateTime, Utc},
  serde::{Deserialize, Serialize},
  std::collections::{BTreeMap, HashMap},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryError {
  pub message: String,
  pub timestamp: DateTime<Utc>,
}

/// A transaction that decoded but failed verification, shelved for an
/// explicit re-verification pass instead of being dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialRecord {
  pub tx: TransactionRecord,
  pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
  pub current_block: u64,
  pub processed_blocks: u64,
  pub total_blocks: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
  pub height: u64,
  pub created_at: DateTime<Utc>,
  pub state: StateSnapshot,
  pub partial_data: Vec<(String, PartialRecord)>,
}

/// Progress/status view handed to the caller after every batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryStatus {
  pub is_running: bool,
  pub current_block: u64,
  pub processed_blocks: u64,
  pub total_blocks: u64,
  /// Completion percentage over the requested range.
  pub progress: f64,
  pub last_processed_height: u64,
  pub partial_data_count: usize,
  pub last_checkpoint: Option<u64>,
  pub errors: Vec<RecoveryError>,
}

#[derive(Debug, Default)]
pub struct RecoveryState {
  pub is_running: bool,
  pub current_block: u64,
  pub processed_blocks: u64,
  pub total_blocks: u64,
  pub last_processed_height: u64,
  pub errors: Vec<RecoveryError>,
  pub partial_data: HashMap<String, PartialRecord>,
  pub checkpoints: BTreeMap<u64, Checkpoint>,
  pub last_checkpoint: Option<u64>,
}

/// Owns the mutable recovery state: the running flag, counters, the error
/// log, the partial-data shelf, and the bounded checkpoint map.
#[derive(Debug, Default)]
pub struct ProgressTracker {
  pub(crate) state: RecoveryState,
}

impl ProgressTracker {
  pub fn new() -> Self {
    Self::default()
  }

  fn snapshot(&self) -> StateSnapshot {
    StateSnapshot {
      current_block: self.state.current_block,
      processed_blocks: self.state.processed_blocks,
      total_blocks: self.state.total_blocks,
    }
  }

  /// Persists a checkpoint at `height`, evicting the oldest beyond the
  /// retention bound.
  pub fn save_checkpoint(&mut self, height: u64) {
    let checkpoint = Checkpoint {
      height,
      created_at: Utc::now(),
      state: self.snapshot(),
      partial_data: self
        .state
        .partial_data
        .iter()
        .map(|(key, record)| (key.clone(), record.clone()))
        .collect(),
    };

    self.state.checkpoints.insert(height, checkpoint);
    self.state.last_checkpoint = Some(height);

    while self.state.checkpoints.len() > MAX_CHECKPOINTS {
      if let Some((&oldest, _)) = self.state.checkpoints.iter().next() {
        self.state.checkpoints.remove(&oldest);
      }
    }

    log::debug!("saved checkpoint at height {height}");
  }

  /// Restores counters and the partial-data shelf from the checkpoint at
  /// `height`; the next block to process becomes `height + 1`.
  pub fn restore_checkpoint(&mut self, height: u64) -> Result<(), ProtocolError> {
    let checkpoint = self
      .state
      .checkpoints
      .get(&height)
      .cloned()
      .ok_or(ProtocolError::NoCheckpoint)?;

    self.state.current_block = checkpoint.height + 1;
    self.state.processed_blocks = checkpoint.state.processed_blocks;
    self.state.total_blocks = checkpoint.state.total_blocks;
    self.state.last_processed_height = checkpoint.height;
    self.state.partial_data = checkpoint.partial_data.into_iter().collect();

    Ok(())
  }

  pub fn add_error(&mut self, message: String) {
    log::warn!("{message}");
    self.state.errors.push(RecoveryError {
      message,
      timestamp: Utc::now(),
    });
  }

  pub fn clear_errors(&mut self) {
    self.state.errors.clear();
  }

  pub fn add_partial_data(&mut self, key: String, record: PartialRecord) {
    self.state.partial_data.insert(key, record);
  }

  pub fn partial_data(&self) -> Vec<(&String, &PartialRecord)> {
    self.state.partial_data.iter().collect()
  }

  pub fn clear_partial_data(&mut self, key: &str) {
    self.state.partial_data.remove(key);
  }

  pub fn status(&self) -> RecoveryStatus {
    let progress = if self.state.total_blocks > 0 {
      (self.state.processed_blocks as f64 / self.state.total_blocks as f64) * 100.0
    } else {
      0.0
    };

    RecoveryStatus {
      is_running: self.state.is_running,
      current_block: self.state.current_block,
      processed_blocks: self.state.processed_blocks,
      total_blocks: self.state.total_blocks,
      progress,
      last_processed_height: self.state.last_processed_height,
      partial_data_count: self.state.partial_data.len(),
      last_checkpoint: self.state.last_checkpoint,
      errors: self.state.errors.clone(),
    }
  }
}
