//! Keyed collections of JSON records with a change broadcast after every
//! mutation.
//!
//! A [`Store`] sits on top of a pluggable [`Medium`]. Records are prepended on
//! append, so the persisted order is newest first. Every successful mutation
//! is persisted before its [`ChangeEvent`] is published.
//!
//! Mutations through one `Store` (and its clones) are serialized by an
//! internal lock. Separate processes sharing a medium are not coordinated:
//! the last write wins.

mod bus;
mod db;
mod file;
mod memory;

pub use bus::{ChangeBus, ChangeEvent, Subscription};
pub use db::RedbMedium;
pub use file::FileMedium;
pub use memory::MemoryMedium;

use std::cmp::Ordering;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::config::MediumKind;
use crate::error::{LaddrrError, Result};
use crate::paths::{self, validate_key};

/// Version stamped on every persisted collection document.
pub const COLLECTION_VERSION: u64 = 1;

// ---------------------------------------------------------------------------
// Medium
// ---------------------------------------------------------------------------

/// Where collections live. Implementations only move whole collections; all
/// record-level logic stays in [`Store`].
pub trait Medium: Send + Sync {
    fn name(&self) -> &'static str;
    /// The records under `key`, or an empty list if none were ever saved.
    fn load(&self, key: &str) -> Result<Vec<Value>>;
    fn save(&self, key: &str, records: &[Value]) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;
}

pub(crate) fn encode_collection(records: &[Value]) -> Value {
    json!({ "version": COLLECTION_VERSION, "records": records })
}

pub(crate) fn decode_collection(key: &str, mut doc: Value) -> Result<Vec<Value>> {
    let version = doc
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| LaddrrError::Store(format!("collection '{key}' has no version")))?;
    if version != COLLECTION_VERSION {
        return Err(LaddrrError::UnsupportedVersion {
            key: key.to_string(),
            found: version,
        });
    }
    match doc.get_mut("records").map(Value::take) {
        Some(Value::Array(records)) => Ok(records),
        _ => Err(LaddrrError::Store(format!(
            "collection '{key}' has no records array"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A storable record type.
///
/// `ID_FIELD` and `CREATED_FIELD` name the JSON fields holding the identity and
/// the RFC 3339 creation time. The store fills either when missing or empty.
pub trait Record: Serialize + DeserializeOwned + Clone {
    const ID_FIELD: &'static str;
    const CREATED_FIELD: &'static str;
}

fn is_blank(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

fn id_of<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str)
}

/// Apply a typed mutation to the stored object.
///
/// `before` and `after` are the typed record serialized around the mutation.
/// Fields the mutation wrote are replaced, fields it dropped are removed, and
/// fields the record type does not model are kept as stored.
fn merge_fields(stored: &Value, before: &Value, after: Value) -> Result<Value> {
    let (Some(stored), Some(before), Value::Object(after)) = (stored.as_object(), before.as_object(), after)
    else {
        return Err(LaddrrError::Store("records must serialize to JSON objects".into()));
    };
    let mut merged = stored.clone();
    for field in before.keys() {
        if !after.contains_key(field) {
            merged.remove(field);
        }
    }
    merged.extend(after);
    Ok(Value::Object(merged))
}

fn created_of(value: &Value, field: &str) -> Option<DateTime<Utc>> {
    value
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

struct Inner {
    medium: Arc<dyn Medium>,
    bus: ChangeBus,
    write_lock: Mutex<()>,
}

#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("medium", &self.inner.medium.name())
            .finish()
    }
}

impl Store {
    pub fn new(medium: Arc<dyn Medium>) -> Self {
        Self {
            inner: Arc::new(Inner {
                medium,
                bus: ChangeBus::default(),
                write_lock: Mutex::new(()),
            }),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryMedium::new()))
    }

    /// Build the medium named by `kind` under `root`.
    pub fn open(root: &Path, kind: MediumKind) -> Result<Self> {
        let medium: Arc<dyn Medium> = match kind {
            MediumKind::Memory => Arc::new(MemoryMedium::new()),
            MediumKind::File => Arc::new(FileMedium::new(root)),
            MediumKind::Redb => Arc::new(RedbMedium::open(&paths::store_db_path(root))?),
        };
        tracing::debug!(medium = medium.name(), root = %root.display(), "opened store");
        Ok(Self::new(medium))
    }

    pub fn medium_name(&self) -> &'static str {
        self.inner.medium.name()
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        self.inner.medium.keys()
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.inner
            .write_lock
            .lock()
            .map_err(|_| LaddrrError::Store("store write lock poisoned".into()))
    }

    fn notify(&self, key: &str) {
        let receivers = self.inner.bus.publish(key);
        tracing::debug!(key, receivers, "collection changed");
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Serialize `record`, filling a blank identity or creation time.
    fn stamp<R: Record>(&self, record: R) -> Result<Value> {
        let mut value = serde_json::to_value(&record)?;
        let obj = value
            .as_object_mut()
            .ok_or_else(|| LaddrrError::Store("records must serialize to JSON objects".into()))?;
        if is_blank(obj.get(R::ID_FIELD)) {
            obj.insert(R::ID_FIELD.into(), json!(uuid::Uuid::new_v4().to_string()));
        }
        if is_blank(obj.get(R::CREATED_FIELD)) {
            obj.insert(R::CREATED_FIELD.into(), json!(Utc::now().to_rfc3339()));
        }
        Ok(value)
    }

    /// Assign identity and creation time if absent, prepend, persist, notify.
    pub fn append<R: Record>(&self, key: &str, record: R) -> Result<R> {
        validate_key(key)?;
        let value = self.stamp(record)?;

        {
            let _guard = self.lock()?;
            let mut records = self.inner.medium.load(key)?;
            records.insert(0, value.clone());
            self.inner.medium.save(key, &records)?;
        }
        self.notify(key);
        Ok(serde_json::from_value(value)?)
    }

    /// Like [`Store::append`], but only when no record under `key` already
    /// carries the same identity. The check and the insert happen under one
    /// lock. Returns `None` on a clash, leaving the collection untouched.
    pub fn append_unique<R: Record>(&self, key: &str, record: R) -> Result<Option<R>> {
        validate_key(key)?;
        let value = self.stamp(record)?;
        let id = id_of(&value, R::ID_FIELD).map(str::to_owned);

        {
            let _guard = self.lock()?;
            let mut records = self.inner.medium.load(key)?;
            if records
                .iter()
                .any(|v| id_of(v, R::ID_FIELD).map(str::to_owned) == id)
            {
                return Ok(None);
            }
            records.insert(0, value.clone());
            self.inner.medium.save(key, &records)?;
        }
        self.notify(key);
        Ok(Some(serde_json::from_value(value)?))
    }

    /// Apply `mutator` to the record whose identity is `id`.
    ///
    /// When the record is missing or the mutator fails, the collection is left
    /// untouched and no event fires. A mutation that changes nothing is not
    /// persisted either.
    pub fn update<R, F>(&self, key: &str, id: &str, mutator: F) -> Result<R>
    where
        R: Record,
        F: FnOnce(&mut R) -> Result<()>,
    {
        validate_key(key)?;
        let updated = {
            let _guard = self.lock()?;
            let mut records = self.inner.medium.load(key)?;
            let pos = records
                .iter()
                .position(|v| id_of(v, R::ID_FIELD) == Some(id))
                .ok_or_else(|| LaddrrError::NotFound {
                    key: key.to_string(),
                    id: id.to_string(),
                })?;

            let mut record: R = serde_json::from_value(records[pos].clone())?;
            let before = serde_json::to_value(&record)?;
            mutator(&mut record)?;
            let after = serde_json::to_value(&record)?;
            if id_of(&after, R::ID_FIELD) != Some(id) {
                return Err(LaddrrError::Store(format!(
                    "mutation may not change '{}' of {id}",
                    R::ID_FIELD
                )));
            }
            let merged = merge_fields(&records[pos], &before, after)?;
            if merged == records[pos] {
                return Ok(record);
            }
            records[pos] = merged;
            self.inner.medium.save(key, &records)?;
            record
        };
        self.notify(key);
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Matching records, newest creation time first. Records without a
    /// parseable timestamp sort last, in stored order.
    pub fn list<R, P>(&self, key: &str, filter: P) -> Result<Vec<R>>
    where
        R: Record,
        P: Fn(&R) -> bool,
    {
        let mut rows: Vec<(Option<DateTime<Utc>>, R)> = self
            .decode_all::<R>(key)?
            .into_iter()
            .filter(|(_, r)| filter(r))
            .collect();
        rows.sort_by(|(a, _), (b, _)| match (a, b) {
            (Some(a), Some(b)) => b.cmp(a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        Ok(rows.into_iter().map(|(_, r)| r).collect())
    }

    /// Matching records in the order defined by `compare`.
    pub fn list_by<R, P, C>(&self, key: &str, filter: P, mut compare: C) -> Result<Vec<R>>
    where
        R: Record,
        P: Fn(&R) -> bool,
        C: FnMut(&R, &R) -> Ordering,
    {
        let mut rows: Vec<R> = self
            .decode_all::<R>(key)?
            .into_iter()
            .map(|(_, r)| r)
            .filter(|r| filter(r))
            .collect();
        rows.sort_by(|a, b| compare(a, b));
        Ok(rows)
    }

    pub fn get<R: Record>(&self, key: &str, id: &str) -> Result<Option<R>> {
        validate_key(key)?;
        let records = self.inner.medium.load(key)?;
        records
            .into_iter()
            .find(|v| id_of(v, R::ID_FIELD) == Some(id))
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    fn decode_all<R: Record>(&self, key: &str) -> Result<Vec<(Option<DateTime<Utc>>, R)>> {
        validate_key(key)?;
        let records = self.inner.medium.load(key)?;
        let mut out = Vec::with_capacity(records.len());
        for value in records {
            let created = created_of(&value, R::CREATED_FIELD);
            match serde_json::from_value::<R>(value) {
                Ok(r) => out.push((created, r)),
                Err(e) => tracing::warn!(key, error = %e, "skipping undecodable record"),
            }
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Change notifications
    // -----------------------------------------------------------------------

    pub fn subscribe(&self, key: &str) -> Subscription {
        self.inner.bus.subscribe(key)
    }

    pub fn subscribe_all(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.bus.subscribe_all()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
