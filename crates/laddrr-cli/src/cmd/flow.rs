use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use laddrr_core::flows;
use serde_json::Value;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum FlowSubcommand {
    /// List every flow and whether it calls the model
    List,

    /// Run a flow and print its JSON output
    Run {
        /// Flow name, e.g. rewriteText
        name: String,
        /// Input as inline JSON, `@path` to read a file, or `-` for stdin
        #[arg(long, default_value = "{}")]
        input: String,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: FlowSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        FlowSubcommand::List => list(json),
        FlowSubcommand::Run { name, input } => run_flow(root, &name, &input),
    }
}

fn list(json: bool) -> anyhow::Result<()> {
    let infos = flows::describe();
    if json {
        return print_json(&infos);
    }
    let rows = infos
        .iter()
        .map(|f| {
            let fields = f.input_schema["properties"]
                .as_object()
                .map(|p| p.keys().cloned().collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            vec![
                f.name.clone(),
                if f.uses_model { "model" } else { "store" }.to_string(),
                fields,
            ]
        })
        .collect();
    print_table(&["FLOW", "BACKED BY", "INPUT"], rows);
    Ok(())
}

fn run_flow(root: &Path, name: &str, raw: &str) -> anyhow::Result<()> {
    let input = read_input(raw)?;
    let config = super::load_config(root)?;

    if !flows::exists(name) {
        return Err(laddrr_core::LaddrrError::UnknownFlow(name.to_string()).into());
    }
    let output = if flows::is_store_flow(name) {
        let store = super::open_store(root, &config)?;
        flows::run_store_flow(&store, name, &input)?
    } else {
        let pipeline = super::pipeline(&config)?;
        super::runtime()?.block_on(flows::run_by_name(&pipeline, name, &input))?
    };
    print_json(&output)
}

/// Parse `--input`: inline JSON, `@file`, or `-` for stdin.
pub fn read_input(raw: &str) -> anyhow::Result<Value> {
    let text = if raw == "-" {
        std::io::read_to_string(std::io::stdin()).context("failed to read stdin")?
    } else if let Some(path) = raw.strip_prefix('@') {
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?
    } else {
        raw.to_string()
    };
    serde_json::from_str(&text).context("input is not valid JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inline_json() {
        assert_eq!(read_input(r#"{"objective":"x"}"#).unwrap(), json!({"objective": "x"}));
    }

    #[test]
    fn at_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("in.json");
        std::fs::write(&path, r#"{"role":"lead"}"#).unwrap();
        let got = read_input(&format!("@{}", path.display())).unwrap();
        assert_eq!(got, json!({"role": "lead"}));
    }

    #[test]
    fn bad_json_is_an_error() {
        let err = read_input("{nope").unwrap_err();
        assert!(format!("{err:#}").contains("not valid JSON"));
    }
}
