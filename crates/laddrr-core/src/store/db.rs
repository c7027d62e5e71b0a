//! Embedded key-value medium backed by redb.
//!
//! A single `collections` table maps the collection key to a JSON document
//! `{ "version": 1, "records": [...] }`. Each save is one write transaction.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};
use serde_json::Value;

use super::{decode_collection, encode_collection, Medium};
use crate::error::{LaddrrError, Result};

const COLLECTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("collections");

fn db_err(e: impl std::fmt::Display) -> LaddrrError {
    LaddrrError::Store(e.to_string())
}

pub struct RedbMedium {
    db: Database,
}

impl RedbMedium {
    /// Open or create the database at `path`, creating the table up front so
    /// reads never race its creation.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(db_err)?;
        let wt = db.begin_write().map_err(db_err)?;
        wt.open_table(COLLECTIONS).map_err(db_err)?;
        wt.commit().map_err(db_err)?;
        Ok(Self { db })
    }
}

impl Medium for RedbMedium {
    fn name(&self) -> &'static str {
        "redb"
    }

    fn load(&self, key: &str) -> Result<Vec<Value>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(COLLECTIONS).map_err(db_err)?;
        let Some(raw) = table.get(key).map_err(db_err)? else {
            return Ok(Vec::new());
        };
        let doc: Value = serde_json::from_slice(raw.value())?;
        decode_collection(key, doc)
    }

    fn save(&self, key: &str, records: &[Value]) -> Result<()> {
        let data = serde_json::to_vec(&encode_collection(records))?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(COLLECTIONS).map_err(db_err)?;
            table.insert(key, data.as_slice()).map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(COLLECTIONS).map_err(db_err)?;
        let mut keys = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (k, _) = entry.map_err(db_err)?;
            keys.push(k.value().to_string());
        }
        Ok(keys)
    }
}
