use crate::error::{LaddrrError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const LADDRR_DIR: &str = ".laddrr";
pub const CONFIG_FILE: &str = ".laddrr/config.yaml";
pub const STORE_DIR: &str = ".laddrr/store";
pub const STORE_DB: &str = ".laddrr/store.redb";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn store_dir(root: &Path) -> PathBuf {
    root.join(STORE_DIR)
}

pub fn collection_path(root: &Path, key: &str) -> PathBuf {
    store_dir(root).join(format!("{key}.json"))
}

pub fn store_db_path(root: &Path) -> PathBuf {
    root.join(STORE_DB)
}

// ---------------------------------------------------------------------------
// Key validation
// ---------------------------------------------------------------------------

static KEY_RE: OnceLock<Regex> = OnceLock::new();

fn key_re() -> &'static Regex {
    KEY_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_\-]*$").unwrap())
}

/// Collection keys double as file names, so they are restricted to a safe
/// lowercase alphabet.
pub fn validate_key(key: &str) -> Result<()> {
    if key.len() > 128 || !key_re().is_match(key) {
        return Err(LaddrrError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
