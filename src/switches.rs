//! The switch registry and transition driver.
//!
//! One binary switch exists per marker name. The driver owns the registry
//! (injected at startup with display names from config) and applies period
//! overlays to it: for each named switch the desired state is compared with
//! the last known state and a change is issued only on an actual transition,
//! so re-applying the same period is a no-op.
//!
//! Every real transition is reported as a [`SwitchEvent`] on a fire-and-forget
//! broadcast channel for the surrounding accessory layer; delivery semantics
//! to the actual device protocol are that layer's problem. Instructions for
//! switch names not present in the registry are silently ignored; the host's
//! accessory cache is only eventually consistent with ours.
//!
//! External "set" requests are accepted and logged but change nothing: the
//! engine is the sole source of truth for switch state.

use std::collections::BTreeMap;

use tokio::sync::broadcast;

use crate::zman::{Transition, Zman};

/// Capacity of the event channel; events are droppable, not load-bearing.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// One observed switch transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchEvent {
    pub zman: Zman,
    pub was_on: bool,
    pub is_on: bool,
}

#[derive(Debug)]
struct Switch {
    display_name: String,
    on: bool,
}

/// Registry of named switches plus the overlay application logic.
#[derive(Debug)]
pub struct SwitchDriver {
    switches: BTreeMap<Zman, Switch>,
    events: broadcast::Sender<SwitchEvent>,
}

impl SwitchDriver {
    /// An empty registry; switches are added with [`register`](Self::register).
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            switches: BTreeMap::new(),
            events,
        }
    }

    /// A registry with all 13 switches, applying display-name overrides where
    /// given. All switches start off.
    pub fn with_all_switches(display_names: &BTreeMap<String, String>) -> Self {
        let mut driver = Self::new();
        for zman in Zman::ALL {
            let name = display_names
                .get(zman.key())
                .cloned()
                .unwrap_or_else(|| zman.key().to_string());
            driver.register(zman, name);
        }
        driver
    }

    /// Add a switch to the registry, initially off.
    pub fn register(&mut self, zman: Zman, display_name: impl Into<String>) {
        self.switches.insert(
            zman,
            Switch {
                display_name: display_name.into(),
                on: false,
            },
        );
    }

    /// Subscribe to switch transition events.
    pub fn subscribe(&self) -> broadcast::Receiver<SwitchEvent> {
        self.events.subscribe()
    }

    /// Apply a period overlay, returning the transitions that actually
    /// happened. Applying the same overlay twice yields no events the second
    /// time.
    pub fn apply(&mut self, transition: Transition) -> Vec<SwitchEvent> {
        let mut changed = Vec::new();
        for &zman in transition.turn_off {
            if let Some(event) = self.set(zman, false) {
                changed.push(event);
            }
        }
        for &zman in transition.turn_on {
            if let Some(event) = self.set(zman, true) {
                changed.push(event);
            }
        }
        changed
    }

    /// Current state of one switch; `None` if it is not registered.
    pub fn state(&self, zman: Zman) -> Option<bool> {
        self.switches.get(&zman).map(|s| s.on)
    }

    /// Snapshot of every registered switch's state.
    pub fn states(&self) -> BTreeMap<Zman, bool> {
        self.switches.iter().map(|(&z, s)| (z, s.on)).collect()
    }

    /// Handle an external "set" request from the host. Accepted and logged
    /// only; engine state is untouched.
    pub fn set_external(&self, zman: Zman, on: bool) {
        let name = self
            .switches
            .get(&zman)
            .map(|s| s.display_name.as_str())
            .unwrap_or_else(|| zman.key());
        log_info!(
            "Switch {} externally set to {}; ignored (engine-driven)",
            name,
            if on { "ON" } else { "OFF" }
        );
    }

    /// Drive one switch to the desired state. Returns the event on an actual
    /// transition; unregistered names and no-op writes return `None`.
    fn set(&mut self, zman: Zman, on: bool) -> Option<SwitchEvent> {
        let switch = self.switches.get_mut(&zman)?;
        if switch.on == on {
            return None;
        }
        let event = SwitchEvent {
            zman,
            was_on: switch.on,
            is_on: on,
        };
        switch.on = on;
        log_decorated!(
            "Switch {} turned {}",
            switch.display_name,
            if on { "ON" } else { "OFF" }
        );
        let _ = self.events.send(event);
        Some(event)
    }
}

impl Default for SwitchDriver {
    fn default() -> Self {
        Self::new()
    }
}
