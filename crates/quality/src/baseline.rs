//! Previous-cycle baseline values for deviation checks

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Key-value store holding one prior value per metric key
pub trait BaselineStore: Send + Sync {
    fn get(&self, key: &str) -> Option<f64>;
    fn set(&self, key: &str, value: f64);

    /// Persist pending writes. Called once per refresh cycle.
    fn flush(&self) {}
}

/// Process-local baseline
#[derive(Debug, Default)]
pub struct MemoryBaseline {
    values: DashMap<String, f64>,
}

impl MemoryBaseline {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BaselineStore for MemoryBaseline {
    fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).map(|v| *v)
    }

    fn set(&self, key: &str, value: f64) {
        self.values.insert(key.to_string(), value);
    }
}

/// Baseline persisted as a JSON object on disk.
///
/// `set` only updates memory; the file is rewritten on `flush` and on drop.
/// Read and write failures are logged and otherwise ignored; the monitor keeps
/// working from memory.
#[derive(Debug)]
pub struct FileBaseline {
    path: PathBuf,
    values: Mutex<HashMap<String, f64>>,
    dirty: AtomicBool,
}

impl FileBaseline {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable baseline file");
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read baseline file");
                HashMap::new()
            }
        };

        Self {
            path,
            values: Mutex::new(values),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &HashMap<String, f64>) {
        let result = serde_json::to_vec_pretty(values)
            .map_err(|e| e.to_string())
            .and_then(|bytes| std::fs::write(&self.path, bytes).map_err(|e| e.to_string()));

        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "Failed to persist baseline");
        }
    }
}

impl BaselineStore for FileBaseline {
    fn get(&self, key: &str) -> Option<f64> {
        self.values.lock().get(key).copied()
    }

    fn set(&self, key: &str, value: f64) {
        self.values.lock().insert(key.to_string(), value);
        self.dirty.store(true, Ordering::Release);
    }

    fn flush(&self) {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return;
        }
        let values = self.values.lock().clone();
        self.persist(&values);
    }
}

impl Drop for FileBaseline {
    fn drop(&mut self) {
        self.flush();
    }
}
