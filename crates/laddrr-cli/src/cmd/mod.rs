pub mod config;
pub mod feedback;
pub mod flow;
pub mod init;
pub mod one_on_one;
pub mod serve;
pub mod survey;

use anyhow::Context;
use laddrr_core::config::Config;
use laddrr_core::{Pipeline, Store};
use std::path::Path;

/// Project config, or the defaults when `laddrr init` has not run.
pub fn load_config(root: &Path) -> anyhow::Result<Config> {
    Config::load_or_default(root).context("failed to load config")
}

pub fn open_store(root: &Path, config: &Config) -> anyhow::Result<Store> {
    Store::open(root, config.store.medium)
        .with_context(|| format!("failed to open {} store", config.store.medium.as_str()))
}

pub fn pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let service = laddrr_llm::backend_from_config(&config.llm)?;
    Ok(Pipeline::new(service).with_policy(config.llm.call_policy()))
}

pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start tokio runtime")
}
