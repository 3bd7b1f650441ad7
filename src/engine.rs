//! The period state engine: the single resolve-and-apply entry point.
//!
//! All three scheduler timers funnel through this module, which owns the only
//! mutable resources in the process:
//!
//! - the [`TimeStore`] behind an async mutex; a store read is always followed
//!   by resolve-and-apply inside the same critical section, so no caller ever
//!   observes a half-updated MarkerSet;
//! - the [`SwitchDriver`] behind its own mutex.
//!
//! The provider call is the only suspending operation and runs *before* the
//! store lock is taken; the fetched result is written only after it returns.
//! A failed fetch leaves the previous day's markers and active period exactly
//! as they were: stale data beats no data, and the next daily tick retries.
//!
//! The active period is persisted only when its label changes, so a restart
//! resumes from the last known period instead of spuriously reporting "none"
//! until the next fetch.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::Utc;
use chrono_tz::Tz;
use tokio::sync::Mutex;

use crate::provider::MarkerProvider;
use crate::resolver::resolve;
use crate::store::TimeStore;
use crate::switches::{SwitchDriver, SwitchEvent};
use crate::zman::{ActivePeriod, Zman};

pub struct Engine {
    store: Mutex<TimeStore>,
    driver: Mutex<SwitchDriver>,
    provider: Box<dyn MarkerProvider>,
    tz: Tz,
}

impl Engine {
    pub fn new(
        store: TimeStore,
        driver: SwitchDriver,
        provider: Box<dyn MarkerProvider>,
        tz: Tz,
    ) -> Self {
        Self {
            store: Mutex::new(store),
            driver: Mutex::new(driver),
            provider,
            tz,
        }
    }

    /// Daily tick: fetch today's markers, persist them, then resolve and
    /// apply. On fetch failure the store is never touched.
    pub async fn refresh_markers(&self) -> Result<()> {
        let today = Utc::now().with_timezone(&self.tz).date_naive();
        // No lock is held while the request is in flight.
        let markers = self.provider.fetch(today).await?;
        log_block_start!(
            "Fetched {} marker times for {}",
            markers.times.len(),
            markers.date
        );

        let store = self.store.lock().await;
        store.save_markers(&markers)?;
        self.resolve_and_apply(&store).await
    }

    /// Frequent tick: re-resolve from the already-stored markers and apply.
    /// This is what catches a period boundary crossing between fetches.
    pub async fn reevaluate(&self) -> Result<()> {
        let store = self.store.lock().await;
        self.resolve_and_apply(&store).await
    }

    /// Observability tick: log the current active period. No state effect.
    pub async fn report_status(&self) {
        let store = self.store.lock().await;
        let now = Utc::now().with_timezone(&self.tz);
        match store.load_active_period() {
            Some(ActivePeriod {
                label: Some(zman),
                evaluated_at,
            }) => {
                let local = evaluated_at.with_timezone(&self.tz);
                log_block_start!(
                    "Current time: {}, most recent zman: {} at {}",
                    now.format("%I:%M %p"),
                    zman,
                    local.format("%I:%M %p")
                );
            }
            _ => {
                log_block_start!(
                    "Current time: {}, no zman has passed yet today",
                    now.format("%I:%M %p")
                );
            }
        }
    }

    /// Subscribe to switch transition events (for the accessory layer).
    pub async fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SwitchEvent> {
        self.driver.lock().await.subscribe()
    }

    /// Current state of one switch (accessory "get"); `None` if unregistered.
    pub async fn switch_state(&self, zman: Zman) -> Option<bool> {
        self.driver.lock().await.state(zman)
    }

    /// External "set" request from the host: accepted and logged, never
    /// applied; the engine is the sole source of truth.
    pub async fn set_external(&self, zman: Zman, on: bool) {
        self.driver.lock().await.set_external(zman, on);
    }

    /// Snapshot of the current switch states.
    pub async fn switch_states(&self) -> BTreeMap<Zman, bool> {
        self.driver.lock().await.states()
    }

    /// Resolve the active period from the stored markers and drive the
    /// switches. Called with the store lock held.
    async fn resolve_and_apply(&self, store: &TimeStore) -> Result<()> {
        let now = Utc::now();
        let previous = store.load_active_period();

        let active = match store.load_markers() {
            Some(markers) => resolve(&markers, now),
            // No markers yet (fresh install, or first run after the state
            // directory was cleared): trust the persisted period rather than
            // forcing everything off until the next fetch succeeds.
            None => previous.clone().unwrap_or_else(|| ActivePeriod::none(now)),
        };

        let previous_label = previous.and_then(|p| p.label);
        if active.label != previous_label {
            store.save_active_period(&active)?;
            match active.label {
                Some(zman) => log_block_start!("Entering period {}", zman),
                None => log_block_start!("No marker has passed yet; period is none"),
            }
        }

        let mut driver = self.driver.lock().await;
        let events = driver.apply(active.transition());
        if !events.is_empty() {
            log_debug!("{} switch transition(s) applied", events.len());
        }
        Ok(())
    }
}
