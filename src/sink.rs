//! Persistence collaborators for observation batches
//!
//! A run hands its whole batch to a [`RecordSink`] in one call. Sinks enforce
//! uniqueness of [`ObservationKey`] and skip duplicates instead of failing the batch.

use crate::errors::{Result, RuZonalError};
use crate::observation::{Observation, ObservationKey};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Outcome of one batch submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitReport {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Receives the observation batch of a finished run
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Store a batch, ignoring records whose key is already stored
    async fn submit(&self, batch: Vec<Observation>) -> Result<SubmitReport>;
}

/// Split a batch into records not yet in `stored` (nor earlier in the batch) and a
/// duplicate count
fn dedup_batch(
    stored: &HashSet<ObservationKey>,
    batch: Vec<Observation>,
) -> (Vec<Observation>, usize) {
    let mut batch_keys = HashSet::with_capacity(batch.len());
    let mut fresh = Vec::with_capacity(batch.len());
    let mut duplicates = 0;
    for observation in batch {
        let key = observation.key();
        if !stored.contains(&key) && batch_keys.insert(key) {
            fresh.push(observation);
        } else {
            warn!(
                zone_code = observation.zone_code,
                product = %observation.product_id,
                date = %observation.date,
                "skipping duplicate observation"
            );
            duplicates += 1;
        }
    }
    (fresh, duplicates)
}

/// Keeps observations in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    keys: HashSet<ObservationKey>,
    records: Vec<Observation>,
    batches: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored observation in insertion order
    pub fn records(&self) -> Vec<Observation> {
        self.lock().map(|s| s.records.clone()).unwrap_or_default()
    }

    /// Number of `submit` calls received
    pub fn batches(&self) -> usize {
        self.lock().map(|s| s.batches).unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| RuZonalError::SinkError("memory sink lock poisoned".to_string()))
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn submit(&self, batch: Vec<Observation>) -> Result<SubmitReport> {
        let mut state = self.lock()?;
        state.batches += 1;
        let (fresh, duplicates) = dedup_batch(&state.keys, batch);
        let inserted = fresh.len();
        state.keys.extend(fresh.iter().map(Observation::key));
        state.records.extend(fresh);
        Ok(SubmitReport {
            inserted,
            duplicates,
        })
    }
}

/// Appends observations to a JSON-lines file
///
/// Keys already present in the file are loaded on first use, so repeated runs for
/// the same date do not duplicate records. A batch is appended whole or not at all:
/// a failed write truncates the file back to its previous length, and an unterminated
/// last line left by an earlier crash is cut off when the keys are loaded.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    keys: tokio::sync::Mutex<Option<HashSet<ObservationKey>>>,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keys: tokio::sync::Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_keys(&self) -> Result<HashSet<ObservationKey>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(e.into()),
        };

        // everything after the last newline is an interrupted append
        let complete = content.rfind('\n').map_or(0, |end| end + 1);
        if complete < content.len() {
            warn!(
                path = %self.path.display(),
                dropped_bytes = content.len() - complete,
                "truncating unterminated last record"
            );
            let file = OpenOptions::new().write(true).open(&self.path).await?;
            file.set_len(complete as u64).await?;
        }

        let mut keys = HashSet::new();
        for (line_no, line) in content[..complete].lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let observation: Observation = serde_json::from_str(line).map_err(|e| {
                RuZonalError::SinkError(format!(
                    "{}:{}: unreadable record: {}",
                    self.path.display(),
                    line_no + 1,
                    e
                ))
            })?;
            keys.insert(observation.key());
        }
        Ok(keys)
    }

    /// Append `buffer`, restoring the original length if the write fails
    async fn append(&self, buffer: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let original_len = file.metadata().await?.len();

        let written = match file.write_all(buffer).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            warn!(path = %self.path.display(), error = %e, "append failed, rolling back");
            file.set_len(original_len).await?;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl RecordSink for JsonLinesSink {
    async fn submit(&self, batch: Vec<Observation>) -> Result<SubmitReport> {
        let mut guard = self.keys.lock().await;
        if guard.is_none() {
            *guard = Some(self.load_keys().await?);
        }
        let Some(keys) = guard.as_mut() else {
            return Err(RuZonalError::SinkError("key index unavailable".to_string()));
        };

        let (fresh, duplicates) = dedup_batch(keys, batch);
        if fresh.is_empty() {
            return Ok(SubmitReport {
                inserted: 0,
                duplicates,
            });
        }
        let mut buffer = String::new();
        for observation in &fresh {
            buffer.push_str(&serde_json::to_string(observation)?);
            buffer.push('\n');
        }

        self.append(buffer.as_bytes()).await?;
        keys.extend(fresh.iter().map(Observation::key));

        info!(
            path = %self.path.display(),
            inserted = fresh.len(),
            duplicates,
            "observations written"
        );

        Ok(SubmitReport {
            inserted: fresh.len(),
            duplicates,
        })
    }
}
