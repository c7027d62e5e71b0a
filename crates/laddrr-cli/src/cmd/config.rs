use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use laddrr_core::config::{Config, LlmBackend, WarnLevel};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    if json {
        return print_json(&config);
    }

    println!("project:  {}", config.project.name);
    match &config.llm.backend {
        LlmBackend::Anthropic {
            model,
            api_key_env,
            base_url,
            ..
        } => println!("backend:  anthropic ({model}) at {base_url}, key from ${api_key_env}"),
        LlmBackend::ClaudeCli { model, executable } => {
            println!("backend:  claude cli ({model}) via {executable}")
        }
    }
    println!(
        "calls:    timeout {}s, {} attempt(s), backoff {}ms",
        config.llm.timeout_secs, config.llm.max_attempts, config.llm.backoff_ms
    );
    println!("store:    {}", config.store.medium.as_str());
    println!("server:   port {}", config.server.port);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
