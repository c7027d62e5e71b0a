use anyhow::Context;
use laddrr_core::config::{Config, MediumKind};
use laddrr_core::paths;
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    let project_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "laddrr".to_string());

    println!("Initializing laddrr in: {}", root.display());

    let config_path = paths::config_path(root);
    let config = if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
        Config::load(root).context("failed to read existing config")?
    } else {
        let cfg = Config::new(&project_name);
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
        cfg
    };

    if config.store.medium == MediumKind::File {
        let dir = paths::store_dir(root);
        std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    for w in config.validate() {
        println!("  note:    {}", w.message);
    }
    Ok(())
}
