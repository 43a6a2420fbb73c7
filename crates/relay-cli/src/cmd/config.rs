use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use relay_core::scheduler::ScheduleEngine;
use relay_core::Config;
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Check every schedule expression in the config file
    Validate,

    /// Print the config file
    Show,
}

pub fn run(config_file: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Validate => validate(config_file, json),
        ConfigSubcommand::Show => show(config_file),
    }
}

fn load(config_file: &Path) -> anyhow::Result<Config> {
    let raw = std::fs::read_to_string(config_file)
        .with_context(|| format!("failed to read {}", config_file.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", config_file.display()))
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(config_file: &Path, json: bool) -> anyhow::Result<()> {
    let config = load(config_file)?;

    let errors: Vec<(String, String)> = config
        .schedules
        .iter()
        .filter_map(|schedule| {
            ScheduleEngine::parse(&schedule.expression)
                .err()
                .map(|e| (schedule.id.clone(), e.to_string()))
        })
        .collect();

    if json {
        let errors: Vec<serde_json::Value> = errors
            .iter()
            .map(|(id, error)| serde_json::json!({ "id": id, "error": error }))
            .collect();
        print_json(&serde_json::json!({
            "schedules": config.schedules.len(),
            "errors": errors,
        }))?;
    } else if errors.is_empty() {
        println!(
            "Config is valid. {} schedule(s) checked.",
            config.schedules.len()
        );
    } else {
        for (id, error) in &errors {
            println!("[error] schedule {id}: {error}");
        }
    }

    if !errors.is_empty() {
        anyhow::bail!("config validation found {} invalid schedule(s)", errors.len());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(config_file: &Path) -> anyhow::Result<()> {
    print_json(&load(config_file)?)
}
