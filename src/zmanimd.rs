//! Application coordinator managing the complete lifecycle of zmanimd.
//!
//! Handles resource acquisition and orchestration: configuration loading,
//! store and switch registry construction, the initial fetch-and-apply, timer
//! startup, and graceful shutdown on Ctrl-C.
//!
//! - Normal startup: `Zmanimd::new(debug_enabled).run().await`
//! - Tests: `Zmanimd::new(true).with_config_path(path).run().await`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::engine::Engine;
use crate::provider::HebcalProvider;
use crate::scheduler::Scheduler;
use crate::store::TimeStore;
use crate::switches::SwitchDriver;

/// Builder for configuring and running the daemon.
pub struct Zmanimd {
    debug_enabled: bool,
    config_path: Option<PathBuf>,
}

impl Zmanimd {
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            config_path: None,
        }
    }

    /// Use an explicit configuration file instead of the default location.
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    /// Execute the daemon: load config, restore persisted state, attempt an
    /// initial fetch, start the timers, and run until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        crate::logger::Log::set_debug(self.debug_enabled);
        log_version!();

        // Missing or invalid configuration is fatal before any timer exists.
        let config = match Config::load(self.config_path.as_deref()) {
            Ok(config) => config,
            Err(e) => {
                log_error_exit!("Configuration failed");
                eprintln!("{e:?}");
                std::process::exit(1);
            }
        };
        config.log_config();

        let store = TimeStore::open(TimeStore::default_dir()?)
            .context("failed to open the time store")?;
        let driver = SwitchDriver::with_all_switches(&config.switch_names());
        let provider = HebcalProvider::new(config.provider_url(), config.geonameid())?;
        let engine = Arc::new(Engine::new(
            store,
            driver,
            Box::new(provider),
            config.timezone()?,
        ));

        // Bring the switches in line with reality before the first scheduled
        // tick: restore from persisted state, then try a fetch. A failed
        // fetch here is the same non-event it is on the daily tick.
        engine
            .reevaluate()
            .await
            .context("initial state evaluation failed")?;
        if let Err(e) = engine.refresh_markers().await {
            log_pipe!();
            log_warning!("Initial marker fetch failed: {e:#}");
            log_indented!("Running from persisted state until the next daily fetch");
        }

        let handles = Scheduler::new(Arc::clone(&engine), &config)?.spawn();
        log_block_start!("Timers started; running");

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;
        log_block_start!("Shutting down...");
        for handle in handles {
            handle.abort();
        }
        log_end!();
        Ok(())
    }
}
