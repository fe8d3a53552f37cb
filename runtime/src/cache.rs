//! Memoizing cache store with single-flight population.
//!
//! Entries are one JSON file per key under the cache directory (filename =
//! SHA-256 of the key, so arbitrary key strings are safe on disk). The
//! in-process claim table guarantees at most one concurrent producer per
//! key: the first task to miss stakes the claim, later same-key tasks wait
//! and receive the winner's result. A failing producer stores nothing —
//! the key stays absent and the next call retries.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use chore_core::Value;

/// Cache failure.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The producer callable failed; nothing was stored.
    #[error("cache producer for `{key}` failed: {message}")]
    Producer { key: String, message: String },
    /// Reading or writing the store failed.
    #[error("cache i/o: {0}")]
    Io(#[from] std::io::Error),
    /// An entry could not be encoded.
    #[error("cache encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl CacheError {
    /// Wraps a producer failure message for `key`.
    pub fn producer(key: impl Into<String>, message: impl Into<String>) -> Self {
        CacheError::Producer {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// One persisted cache record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    value: serde_json::Value,
    cached_at: String,
    ttl_secs: Option<u64>,
}

impl CacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let Some(ttl_secs) = self.ttl_secs else {
            return true;
        };
        match DateTime::parse_from_rfc3339(&self.cached_at) {
            Ok(cached_at) => {
                let age = now.signed_duration_since(cached_at.with_timezone(&Utc));
                age.num_seconds() >= 0 && (age.num_seconds() as u64) < ttl_secs
            }
            // Unparseable timestamp reads as stale.
            Err(_) => false,
        }
    }
}

/// Result of an in-flight production, shared with joining tasks.
type FlightResult = Result<Value, String>;

#[derive(Default)]
struct Flight {
    state: Mutex<Option<FlightResult>>,
    done: Condvar,
}

/// File-backed memoizing store.
///
/// # Examples
///
/// ```
/// use chore_core::Value;
/// use chore_runtime::CacheStore;
///
/// let dir = std::env::temp_dir().join("chore-cache-doc");
/// let cache = CacheStore::new(dir.clone());
/// let value = cache
///     .get_or_produce("greeting", None, || Ok(Value::from("hello")))
///     .unwrap();
/// assert_eq!(value, Value::from("hello"));
/// # let _ = std::fs::remove_dir_all(dir);
/// ```
pub struct CacheStore {
    dir: PathBuf,
    /// When set, every lookup misses; producers still run and store.
    bypass: bool,
    flights: Mutex<HashMap<String, Arc<Flight>>>,
}

impl CacheStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            bypass: false,
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// A store whose lookups always miss (the `--no-cache` mode).
    pub fn bypassed(dir: PathBuf) -> Self {
        Self {
            bypass: true,
            ..Self::new(dir)
        }
    }

    /// Default cache directory (`$XDG_CACHE_HOME/chore`, falling back to
    /// `~/.cache/chore`).
    pub fn default_dir() -> PathBuf {
        if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
            return PathBuf::from(xdg).join("chore");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".cache").join("chore");
        }
        std::env::temp_dir().join("chore-cache")
    }

    /// Reads a stored value. Expired entries are removed and read as
    /// absent; corrupt entries read as absent.
    pub fn get(&self, key: &str) -> Option<Value> {
        if self.bypass {
            return None;
        }
        let path = self.entry_path(key);
        let raw = fs::read_to_string(&path).ok()?;
        let entry: CacheEntry = serde_json::from_str(&raw).ok()?;
        if entry.key != key {
            // Hash collision or foreign file; never serve the wrong key.
            return None;
        }
        if !entry.is_fresh(Utc::now()) {
            debug!(key, "cache entry expired");
            let _ = fs::remove_file(&path);
            return None;
        }
        Value::from_json(entry.value).ok()
    }

    /// Stores a value, replacing any previous entry for `key`.
    pub fn put(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;
        let entry = CacheEntry {
            key: key.to_string(),
            value: value.to_json(),
            cached_at: Utc::now().to_rfc3339(),
            ttl_secs: ttl.map(|t| t.as_secs()),
        };
        let json = serde_json::to_string_pretty(&entry)?;
        fs::write(self.entry_path(key), json)?;
        Ok(())
    }

    /// Removes a key. Absent keys are fine.
    pub fn remove(&self, key: &str) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Returns the cached value for `key`, or runs `producer` exactly once
    /// to fill it.
    ///
    /// Concurrent same-key callers join the in-flight production instead
    /// of recomputing; unrelated keys never contend. A producer failure is
    /// returned to every joined caller but is not stored.
    pub fn get_or_produce<F>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        producer: F,
    ) -> Result<Value, CacheError>
    where
        F: FnOnce() -> Result<Value, CacheError>,
    {
        if let Some(value) = self.get(key) {
            debug!(key, "cache hit");
            return Ok(value);
        }

        // Stake the claim, or join an existing flight.
        let (flight, winner) = {
            let mut flights = self.flights.lock().expect("cache claim table poisoned");
            match flights.get(key) {
                Some(flight) => (Arc::clone(flight), false),
                None => {
                    let flight = Arc::new(Flight::default());
                    flights.insert(key.to_string(), Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if !winner {
            debug!(key, "joining in-flight cache production");
            let mut state = flight.state.lock().expect("cache flight poisoned");
            while state.is_none() {
                state = flight
                    .done
                    .wait(state)
                    .expect("cache flight poisoned");
            }
            return match state.as_ref().and_then(|r| r.as_ref().ok()) {
                Some(value) => Ok(value.clone()),
                None => {
                    let message = state
                        .as_ref()
                        .and_then(|r| r.as_ref().err())
                        .cloned()
                        .unwrap_or_default();
                    Err(CacheError::producer(key, message))
                }
            };
        }

        // The winner re-checks the store: a previous flight may have
        // finished between our miss and our claim.
        let result = match self.get(key) {
            Some(value) => Ok(value),
            None => {
                debug!(key, "cache miss, producing");
                match producer() {
                    Ok(value) => self.put(key, &value, ttl).map(|()| value),
                    Err(err) => Err(err),
                }
            }
        };

        let shared: FlightResult = match &result {
            Ok(value) => Ok(value.clone()),
            Err(err) => Err(err.to_string()),
        };
        {
            let mut state = flight.state.lock().expect("cache flight poisoned");
            *state = Some(shared);
            flight.done.notify_all();
        }
        self.flights
            .lock()
            .expect("cache claim table poisoned")
            .remove(key);

        result
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{digest:x}.json"))
    }
}
