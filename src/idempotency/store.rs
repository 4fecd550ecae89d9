//! File-backed idempotency store.

use super::key::composite_key;
use crate::clock::{system_clock, Clock};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);
pub const DEFAULT_STORE_FILE: &str = "idempotency_cache.json";

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

/// First successful response observed for one `METHOD|url|key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub body_hash: String,
    pub response: Value,
    /// Epoch seconds.
    pub stored_at: u64,
    /// Seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl: u64,
}

impl IdempotencyRecord {
    /// Expired once strictly more than `ttl` seconds have passed since `stored_at`.
    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.stored_at) > self.ttl
    }
}

type Records = BTreeMap<String, IdempotencyRecord>;

/// Whole seconds, rounded up so a sub-second TTL never becomes 0.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0)
}

/// Persistent `METHOD|url|key -> record` map stored as a single JSON object.
///
/// Every operation reads the whole file and, when it changes anything, rewrites
/// it through a temp file in the same directory followed by an atomic rename.
pub struct IdempotencyStore {
    path: PathBuf,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl IdempotencyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            default_ttl: DEFAULT_TTL,
            clock: system_clock(),
        }
    }

    /// Env-configured store:
    /// - `RESILIENT_HTTP_IDEMPOTENCY_PATH` (default `idempotency_cache.json`)
    /// - `RESILIENT_HTTP_IDEMPOTENCY_TTL_SECS` (default 86400)
    pub fn from_env() -> Self {
        let path = std::env::var("RESILIENT_HTTP_IDEMPOTENCY_PATH")
            .unwrap_or_else(|_| DEFAULT_STORE_FILE.to_string());
        let ttl = std::env::var("RESILIENT_HTTP_IDEMPOTENCY_TTL_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TTL);
        Self::new(path).with_default_ttl(ttl)
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn now(&self) -> u64 {
        self.clock.epoch_secs().max(0.0) as u64
    }

    /// Cached record, or `None` when missing or expired. Expired records are
    /// removed and the removal persisted.
    pub fn get(&self, method: &str, url: &str, key: &str) -> Result<Option<IdempotencyRecord>> {
        let mut records = self.load();
        let ck = composite_key(method, url, key);
        let expired = match records.get(&ck) {
            None => {
                debug!(key = ck.as_str(), "idempotency miss");
                return Ok(None);
            }
            Some(rec) => rec.is_expired(self.now()),
        };
        if expired {
            records.remove(&ck);
            self.save(&records)?;
            debug!(key = ck.as_str(), "idempotency record expired");
            return Ok(None);
        }
        debug!(key = ck.as_str(), "idempotency hit");
        Ok(records.remove(&ck))
    }

    /// Insert or overwrite the record for `METHOD|url|key`. `ttl` defaults to the store's TTL.
    pub fn put(
        &self,
        method: &str,
        url: &str,
        key: &str,
        body_hash: &str,
        response: Value,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let mut records = self.load();
        let ck = composite_key(method, url, key);
        records.insert(
            ck.clone(),
            IdempotencyRecord {
                body_hash: body_hash.to_string(),
                response,
                stored_at: self.now(),
                ttl: ttl_secs(ttl.unwrap_or(self.default_ttl)),
            },
        );
        self.save(&records)?;
        debug!(key = ck.as_str(), "idempotency record stored");
        Ok(())
    }

    /// Replay lookup for a write about to be sent.
    ///
    /// Returns the cached response when the stored body hash matches, `None` on a
    /// miss, and [`Error::IdempotencyConflict`] when the key was used for a
    /// different payload. A conflict leaves the stored record untouched.
    pub fn lookup(
        &self,
        method: &str,
        url: &str,
        key: &str,
        body_hash: &str,
    ) -> Result<Option<Value>> {
        match self.get(method, url, key)? {
            None => Ok(None),
            Some(rec) if rec.body_hash == body_hash => Ok(Some(rec.response)),
            Some(rec) => Err(Error::IdempotencyConflict {
                key: key.to_string(),
                stored_hash: rec.body_hash,
                request_hash: body_hash.to_string(),
            }),
        }
    }

    pub fn remove(&self, method: &str, url: &str, key: &str) -> Result<bool> {
        let mut records = self.load();
        let removed = records.remove(&composite_key(method, url, key)).is_some();
        if removed {
            self.save(&records)?;
        }
        Ok(removed)
    }

    /// Drop every expired record; returns how many were removed.
    pub fn cleanup(&self) -> Result<usize> {
        let mut records = self.load();
        let now = self.now();
        let before = records.len();
        records.retain(|_, rec| !rec.is_expired(now));
        let removed = before - records.len();
        if removed > 0 {
            self.save(&records)?;
        }
        Ok(removed)
    }

    /// Number of records on disk, expired ones included.
    pub fn len(&self) -> usize {
        self.load().len()
    }

    /// Number of records on disk that are already past their TTL.
    pub fn expired_count(&self) -> usize {
        let now = self.now();
        self.load().values().filter(|rec| rec.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Strict load: reports a malformed file as [`Error::StoreCorrupt`] instead of
    /// recovering. A missing file is an empty store.
    pub fn verify(&self) -> Result<usize> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::Io(e)),
        };
        let records: Records = serde_json::from_slice(&raw).map_err(|e| Error::StoreCorrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        Ok(records.len())
    }

    /// Tolerant load: a missing, unreadable or malformed file is an empty store,
    /// and individually malformed entries are dropped.
    fn load(&self) -> Records {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Records::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "idempotency store unreadable, starting empty");
                return Records::new();
            }
        };

        let entries: BTreeMap<String, Value> = match serde_json::from_slice(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "idempotency store corrupt, starting empty");
                return Records::new();
            }
        };

        entries
            .into_iter()
            .filter_map(|(k, v)| match serde_json::from_value(v) {
                Ok(rec) => Some((k, rec)),
                Err(e) => {
                    warn!(key = k.as_str(), error = %e, "dropping malformed idempotency record");
                    None
                }
            })
            .collect()
    }

    fn save(&self, records: &Records) -> Result<()> {
        self.save_with(records, |tmp, dest| {
            tmp.persist(dest).map(|_| ()).map_err(|e| e.error)
        })
    }

    /// Serialize into a temp file next to the destination, then hand it to
    /// `replace`. The temp file is deleted whenever it is not persisted.
    fn save_with<F>(&self, records: &Records, replace: F) -> Result<()>
    where
        F: FnOnce(NamedTempFile, &Path) -> io::Result<()>,
    {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix("idem_")
            .suffix(".json")
            .tempfile_in(&dir)?;
        serde_json::to_writer(&mut tmp, records)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;

        replace(tmp, &self.path)?;
        Ok(())
    }
}
