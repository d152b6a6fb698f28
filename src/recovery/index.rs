use {
  crate::inscription::InscriptionPayload,
  bitcoin::Txid,
  serde::Serialize,
  std::collections::{HashMap, HashSet},
};

/// One indexed inscription with the payload it was recovered from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedInscription {
  pub txid: Txid,
  pub block_height: u64,
  pub verified: bool,
  pub payload: InscriptionPayload,
}

/// The slice of an entry that status queries return.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EntryStatus {
  pub txid: Txid,
  pub block_height: u64,
  pub verified: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BlockHeightStats {
  pub total_blocks: usize,
  pub min_height: Option<u64>,
  pub max_height: Option<u64>,
  pub inscription_count: usize,
}

/// In-memory inscription index owned by the recovery indexer: a primary map
/// keyed by content id plus a secondary per-height index. Writes are
/// append-or-overwrite keyed by content id; queries never mutate.
#[derive(Debug, Default)]
pub struct InscriptionIndex {
  entries: HashMap<String, IndexedInscription>,
  by_height: HashMap<u64, HashSet<String>>,
}

impl InscriptionIndex {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(
    &mut self,
    content_id: String,
    txid: Txid,
    block_height: u64,
    verified: bool,
    payload: InscriptionPayload,
  ) {
    let previous = self.entries.insert(
      content_id.clone(),
      IndexedInscription {
        txid,
        block_height,
        verified,
        payload,
      },
    );

    // an overwrite that moves heights must not leave the id in the old bucket
    if let Some(previous) = previous {
      if previous.block_height != block_height {
        if let Some(bucket) = self.by_height.get_mut(&previous.block_height) {
          bucket.remove(&content_id);
          if bucket.is_empty() {
            self.by_height.remove(&previous.block_height);
          }
        }
      }
    }

    self
      .by_height
      .entry(block_height)
      .or_default()
      .insert(content_id);
  }

  pub fn get(&self, content_id: &str) -> Option<&IndexedInscription> {
    self.entries.get(content_id)
  }

  pub fn status(&self, content_id: &str) -> Option<EntryStatus> {
    self.entries.get(content_id).map(|entry| EntryStatus {
      txid: entry.txid,
      block_height: entry.block_height,
      verified: entry.verified,
    })
  }

  pub fn inscriptions_by_height(&self, block_height: u64) -> Vec<&IndexedInscription> {
    self
      .by_height
      .get(&block_height)
      .map(|content_ids| {
        content_ids
          .iter()
          .filter_map(|content_id| self.entries.get(content_id))
          .collect()
      })
      .unwrap_or_default()
  }

  pub fn all(&self) -> Vec<&IndexedInscription> {
    self.entries.values().collect()
  }

  pub fn verified(&self) -> Vec<&IndexedInscription> {
    self.entries.values().filter(|entry| entry.verified).collect()
  }

  /// Updates an existing entry's verification flag; unknown ids are a no-op.
  pub fn set_verification_status(&mut self, content_id: &str, verified: bool) {
    if let Some(entry) = self.entries.get_mut(content_id) {
      entry.verified = verified;
    }
  }

  pub fn stats(&self) -> BlockHeightStats {
    BlockHeightStats {
      total_blocks: self.by_height.len(),
      min_height: self.by_height.keys().min().copied(),
      max_height: self.by_height.keys().max().copied(),
      inscription_count: self.entries.len(),
    }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn clear(&mut self) {
    self.entries.clear();
    self.by_height.clear();
  }
}

#[cfg(test)]
mod tests {
  use {super::*, crate::test::payload_fixture};

  fn txid(n: u8) -> Txid {
    hex::encode([n; 32]).parse().unwrap()
  }

  fn index_with_entries() -> InscriptionIndex {
    let mut index = InscriptionIndex::new();
    index.insert("a".into(), txid(1), 100, true, payload_fixture());
    index.insert("b".into(), txid(2), 100, false, payload_fixture());
    index.insert("c".into(), txid(3), 205, true, payload_fixture());
    index
  }

  #[test]
  fn primary_and_height_indices_stay_in_step() {
    let index = index_with_entries();

    assert_eq!(index.len(), 3);
    assert_eq!(index.inscriptions_by_height(100).len(), 2);
    assert_eq!(index.inscriptions_by_height(205).len(), 1);
    assert!(index.inscriptions_by_height(999).is_empty());

    let status = index.status("a").unwrap();
    assert_eq!(status.txid, txid(1));
    assert_eq!(status.block_height, 100);
    assert!(status.verified);
  }

  #[test]
  fn insert_overwrites_by_content_id() {
    let mut index = index_with_entries();
    index.insert("a".into(), txid(9), 300, false, payload_fixture());

    assert_eq!(index.len(), 3);
    assert_eq!(index.get("a").unwrap().txid, txid(9));
    assert_eq!(index.inscriptions_by_height(300).len(), 1);

    // the move must evict "a" from the height-100 bucket
    assert!(index
      .inscriptions_by_height(100)
      .iter()
      .all(|entry| entry.txid != txid(9)));
    assert_eq!(index.inscriptions_by_height(100).len(), 1);
    assert_eq!(index.stats().total_blocks, 3);
  }

  #[test]
  fn moving_the_last_entry_drops_the_old_height_bucket() {
    let mut index = InscriptionIndex::new();
    index.insert("a".into(), txid(1), 100, true, payload_fixture());
    index.insert("a".into(), txid(2), 200, true, payload_fixture());

    assert!(index.inscriptions_by_height(100).is_empty());
    assert_eq!(index.inscriptions_by_height(200).len(), 1);

    let stats = index.stats();
    assert_eq!(stats.total_blocks, 1);
    assert_eq!(stats.min_height, Some(200));
    assert_eq!(stats.max_height, Some(200));
  }

  #[test]
  fn verified_filters_and_status_updates() {
    let mut index = index_with_entries();
    assert_eq!(index.verified().len(), 2);

    index.set_verification_status("b", true);
    assert_eq!(index.verified().len(), 3);

    // unknown ids are a no-op
    index.set_verification_status("nope", true);
    assert_eq!(index.len(), 3);
    assert!(index.get("nope").is_none());
  }

  #[test]
  fn stats_summarize_heights() {
    let index = index_with_entries();
    let stats = index.stats();

    assert_eq!(stats.total_blocks, 2);
    assert_eq!(stats.min_height, Some(100));
    assert_eq!(stats.max_height, Some(205));
    assert_eq!(stats.inscription_count, 3);

    assert_eq!(InscriptionIndex::new().stats(), BlockHeightStats::default());
  }
}
