use std::path::{Path, PathBuf};

use serde_json::Value;

use super::{decode_collection, encode_collection, Medium};
use crate::error::Result;
use crate::io::atomic_write;
use crate::paths;

/// One pretty-printed JSON document per collection, replaced atomically on
/// every save.
#[derive(Debug, Clone)]
pub struct FileMedium {
    dir: PathBuf,
}

impl FileMedium {
    /// Medium rooted at `<root>/.laddrr/store/`.
    pub fn new(root: &Path) -> Self {
        Self {
            dir: paths::store_dir(root),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Medium for FileMedium {
    fn name(&self) -> &'static str {
        "file"
    }

    fn load(&self, key: &str) -> Result<Vec<Value>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&path)?;
        let doc: Value = serde_json::from_str(&data)?;
        decode_collection(key, doc)
    }

    fn save(&self, key: &str, records: &[Value]) -> Result<()> {
        let data = serde_json::to_vec_pretty(&encode_collection(records))?;
        atomic_write(&self.path_for(key), &data)
    }

    fn keys(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
