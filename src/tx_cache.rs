use {
  crate::{params::CACHE_DURATION, verification::VerificationReport},
  bitcoin::Txid,
  std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
  },
};

#[derive(Debug, Clone)]
struct CacheEntry {
  data: VerificationReport,
  cached_at: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
  pub total_cached: usize,
  pub oldest: Option<Duration>,
  pub newest: Option<Duration>,
}

/// TTL cache of verification results keyed by txid, shielding the gateway
/// from redundant lookups. Interior-locked so a shared reference can be
/// handed to concurrent readers and writers.
#[derive(Debug)]
pub struct TransactionCache {
  entries: Mutex<HashMap<Txid, CacheEntry>>,
  ttl: Duration,
}

impl Default for TransactionCache {
  fn default() -> Self {
    Self::new()
  }
}

impl TransactionCache {
  pub fn new() -> Self {
    Self::with_ttl(CACHE_DURATION)
  }

  pub fn with_ttl(ttl: Duration) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      ttl,
    }
  }

  pub fn insert(&self, txid: Txid, data: VerificationReport) {
    self.entries.lock().unwrap().insert(
      txid,
      CacheEntry {
        data,
        cached_at: Instant::now(),
      },
    );
  }

  /// Returns the cached report, lazily evicting it when expired.
  pub fn get(&self, txid: Txid) -> Option<VerificationReport> {
    let mut entries = self.entries.lock().unwrap();

    match entries.get(&txid) {
      Some(entry) if entry.cached_at.elapsed() > self.ttl => {
        entries.remove(&txid);
        None
      }
      Some(entry) => Some(entry.data.clone()),
      None => None,
    }
  }

  /// Drops every expired entry; returns how many were evicted.
  pub fn sweep(&self) -> usize {
    let mut entries = self.entries.lock().unwrap();
    let before = entries.len();
    entries.retain(|_, entry| entry.cached_at.elapsed() <= self.ttl);
    before - entries.len()
  }

  pub fn clear(&self) {
    self.entries.lock().unwrap().clear();
  }

  pub fn len(&self) -> usize {
    self.entries.lock().unwrap().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.lock().unwrap().is_empty()
  }

  pub fn stats(&self) -> CacheStats {
    let entries = self.entries.lock().unwrap();
    let ages: Vec<Duration> = entries
      .values()
      .map(|entry| entry.cached_at.elapsed())
      .collect();

    CacheStats {
      total_cached: entries.len(),
      oldest: ages.iter().max().copied(),
      newest: ages.iter().min().copied(),
    }
  }
}
