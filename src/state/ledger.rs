use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::atomic::write_atomic;
use super::error::LedgerError;
use crate::types::EventId;

/// Number of ids kept across persists unless configured otherwise.
pub const DEFAULT_LEDGER_CAP: usize = 1000;

/// Set of event ids whose recordings are already on disk.
///
/// Only successful downloads are ever recorded, so eviction by the retention
/// cap can only drop confirmed successes. Ids are kept ordered so the most
/// recent ones (the largest under [`EventId`]'s order) survive a capped
/// persist.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    cap: Option<usize>,
    ids: BTreeSet<EventId>,
}

impl Ledger {
    /// Empty ledger that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>, cap: Option<usize>) -> Self {
        Self {
            path: path.into(),
            cap,
            ids: BTreeSet::new(),
        }
    }

    /// Read the persisted ledger. A missing or corrupt file yields an empty
    /// ledger and a warning; it never aborts the run.
    pub async fn load(path: impl Into<PathBuf>, cap: Option<usize>) -> Self {
        let mut ledger = Self::new(path, cap);

        let contents = match tokio::fs::read_to_string(&ledger.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "Ledger file {} not found, starting with an empty ledger",
                    ledger.path.display()
                );
                return ledger;
            }
            Err(e) => {
                tracing::warn!(
                    "Error opening ledger file {}: {}. Starting with an empty ledger",
                    ledger.path.display(),
                    e
                );
                return ledger;
            }
        };

        match serde_json::from_str::<Vec<EventId>>(&contents) {
            Ok(ids) => {
                ledger.ids.extend(ids);
                tracing::debug!(
                    "Loaded {} downloaded event ids from {}",
                    ledger.ids.len(),
                    ledger.path.display()
                );
            }
            Err(e) => {
                tracing::warn!(
                    "Ledger file {} is corrupt ({}), starting with an empty ledger",
                    ledger.path.display(),
                    e
                );
            }
        }
        ledger
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cap(&self) -> Option<usize> {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.ids.contains(id)
    }

    /// Record a downloaded event. Returns `false` if it was already present.
    pub fn record(&mut self, id: EventId) -> bool {
        self.ids.insert(id)
    }

    /// Most recent ids first, limited to the retention cap.
    pub fn retained(&self) -> Vec<EventId> {
        let keep = self.cap.unwrap_or(usize::MAX);
        self.ids.iter().rev().take(keep).cloned().collect()
    }

    /// Write the ledger, keeping only the newest `cap` ids; older ones are
    /// dropped from memory as well. Returns the number of ids written.
    pub async fn persist(&mut self) -> Result<usize, LedgerError> {
        let retained = self.retained();
        let json = serde_json::to_vec_pretty(&retained)?;

        write_atomic(&self.path, &json, false)
            .await
            .map_err(|source| LedgerError::Write {
                path: self.path.clone(),
                source,
            })?;

        let evicted = self.ids.len() - retained.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} oldest event ids from the ledger", evicted);
            self.ids = retained.iter().cloned().collect();
        }
        tracing::debug!(
            "Saved {} event ids to {}",
            retained.len(),
            self.path.display()
        );
        Ok(retained.len())
    }
}
