use crate::HardwareArgs;
use anyhow::Context;
use relay_core::{
    ConfigStore, EventRecorder, JsonConfigStore, JsonlEventLog, RelayController, RelayNames,
};
use relay_server::AppState;
use std::path::PathBuf;
use std::sync::Arc;

pub struct ServeOptions {
    pub addr: String,
    pub config_file: PathBuf,
    pub events_file: PathBuf,
    pub events_capacity: usize,
    pub hardware: HardwareArgs,
}

pub fn run(opts: ServeOptions) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;

    let store = Arc::new(
        JsonConfigStore::open(&opts.config_file)
            .with_context(|| format!("failed to open {}", opts.config_file.display()))?,
    );
    let events = Arc::new(
        JsonlEventLog::open(&opts.events_file, opts.events_capacity)
            .with_context(|| format!("failed to open {}", opts.events_file.display()))?,
    );
    let config = store.get()?;

    let controller = RelayController::new(
        opts.hardware.backend()?,
        opts.hardware.pins.clone(),
        RelayNames::new(store.clone()),
        events.clone(),
        rt.handle().clone(),
        &config,
    )
    .context("failed to start relay controller")?;
    let controller = Arc::new(controller);

    controller.record("Server booted up");
    println!(
        "pirelay: {} relays, {} schedules, listening on {}",
        controller.relay_count(),
        config.schedules.len(),
        opts.addr
    );

    let app_state = AppState::new(controller.clone(), store, events.clone());
    let result = rt.block_on(relay_server::serve(app_state, &opts.addr, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
        }
        tracing::info!("shutdown requested");
    }));

    if result.is_ok() {
        if let Err(e) = events.record("Server shutdown cleanly") {
            tracing::warn!(error = %e, "failed to record shutdown");
        }
    }
    result
}
