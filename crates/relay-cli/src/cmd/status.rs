use crate::output::{print_json, print_table};
use crate::HardwareArgs;
use anyhow::Context;
use relay_core::{Config, JsonConfigStore, MemoryEventLog, RelayController, RelayNames};
use std::path::Path;
use std::sync::Arc;

pub fn run(config_file: &Path, hardware: &HardwareArgs, json: bool) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let store = Arc::new(
        JsonConfigStore::open(config_file)
            .with_context(|| format!("failed to open {}", config_file.display()))?,
    );

    // Names come from the config file; no schedules are armed for a one-shot read.
    let controller = RelayController::new(
        hardware.backend()?,
        hardware.pins.clone(),
        RelayNames::new(store),
        Arc::new(MemoryEventLog::default()),
        rt.handle().clone(),
        &Config::default(),
    )?;
    let status = controller.status().context("failed to read relay states")?;

    if json {
        return print_json(&status);
    }

    let rows = status
        .states
        .iter()
        .map(|s| {
            vec![
                s.relay.to_string(),
                s.name.clone(),
                s.state.as_str().to_string(),
            ]
        })
        .collect();
    print_table(&["RELAY", "NAME", "STATE"], rows);
    Ok(())
}
