//! JSON-file-backed subscriber preference store.
//!
//! Persists one record per chat user: zipcode, search radius, and whether
//! broadcasts are active. The whole set is held in memory behind a lock and
//! rewritten to disk on every mutation; subscriber counts are tiny.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::report::{DEFAULT_RADIUS_MILES, DEFAULT_ZIPCODE, Query};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: i64,
    pub zipcode: String,
    pub range_miles: f64,
    pub active: bool,
}

impl Subscriber {
    /// New inactive subscriber with the default search preference.
    pub fn with_defaults(id: i64) -> Self {
        Self {
            id,
            zipcode: DEFAULT_ZIPCODE.to_string(),
            range_miles: DEFAULT_RADIUS_MILES,
            active: false,
        }
    }

    pub fn query(&self) -> Query {
        Query::new(self.range_miles, self.zipcode.clone())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DbFile {
    #[serde(default)]
    subscribers: Vec<Subscriber>,
}

/// Subscriber store persisted as a single JSON file.
pub struct SubscriberStore {
    path: PathBuf,
    inner: RwLock<Vec<Subscriber>>,
}

impl SubscriberStore {
    /// Open a store at `path`, creating an empty one if the file is absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let subscribers = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read subscriber db {}", path.display()))?;
            let db: DbFile = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse subscriber db {}", path.display()))?;
            db.subscribers
        } else {
            Vec::new()
        };
        Ok(Self {
            path,
            inner: RwLock::new(subscribers),
        })
    }

    pub fn get(&self, id: i64) -> Option<Subscriber> {
        let subscribers = self.inner.read().expect("subscriber store lock poisoned");
        subscribers.iter().find(|s| s.id == id).cloned()
    }

    pub fn active_subscribers(&self) -> Vec<Subscriber> {
        let subscribers = self.inner.read().expect("subscriber store lock poisoned");
        subscribers.iter().filter(|s| s.active).cloned().collect()
    }

    /// Count of active subscriptions (the `/stats` figure).
    pub fn active_count(&self) -> usize {
        let subscribers = self.inner.read().expect("subscriber store lock poisoned");
        subscribers.iter().filter(|s| s.active).count()
    }

    /// Insert a subscriber, or replace an existing record with the same id.
    pub fn upsert(&self, subscriber: Subscriber) -> Result<()> {
        self.mutate(|subscribers| {
            match subscribers.iter_mut().find(|s| s.id == subscriber.id) {
                Some(existing) => *existing = subscriber,
                None => subscribers.push(subscriber),
            }
            true
        })
        .map(|_| ())
    }

    /// Flip the active flag; returns false if the subscriber is unknown.
    pub fn set_active(&self, id: i64, active: bool) -> Result<bool> {
        self.mutate(|subscribers| {
            subscribers
                .iter_mut()
                .find(|s| s.id == id)
                .map(|s| s.active = active)
                .is_some()
        })
    }

    pub fn set_zipcode(&self, id: i64, zipcode: &str) -> Result<bool> {
        self.mutate(|subscribers| {
            subscribers
                .iter_mut()
                .find(|s| s.id == id)
                .map(|s| s.zipcode = zipcode.to_string())
                .is_some()
        })
    }

    pub fn set_range(&self, id: i64, range_miles: f64) -> Result<bool> {
        self.mutate(|subscribers| {
            subscribers
                .iter_mut()
                .find(|s| s.id == id)
                .map(|s| s.range_miles = range_miles)
                .is_some()
        })
    }

    /// Delete a subscriber record entirely (the `/delete` command).
    pub fn remove(&self, id: i64) -> Result<bool> {
        self.mutate(|subscribers| {
            let before = subscribers.len();
            subscribers.retain(|s| s.id != id);
            subscribers.len() != before
        })
    }

    fn mutate(&self, op: impl FnOnce(&mut Vec<Subscriber>) -> bool) -> Result<bool> {
        let mut subscribers = self.inner.write().expect("subscriber store lock poisoned");
        let changed = op(&mut subscribers);
        if changed {
            self.save(&subscribers)?;
        }
        Ok(changed)
    }

    fn save(&self, subscribers: &[Subscriber]) -> Result<()> {
        let db = DbFile {
            subscribers: subscribers.to_vec(),
        };
        let raw = serde_json::to_string_pretty(&db).context("failed to serialize subscriber db")?;
        // Write-then-rename: a crash mid-write must not truncate the db.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)
            .with_context(|| format!("failed to write subscriber db {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace subscriber db {}", self.path.display()))
    }
}
