//! # zmanimd Library
//!
//! Internal library for the zmanimd binary: a daemon driving 13 named binary
//! switches through the sequence of halachic daily time markers ("zmanim").
//!
//! ## Architecture
//!
//! - **Entry Point**: `Zmanimd` coordinates startup, timers, and shutdown
//! - **Period Table**: `zman` defines the marker enumeration and the static
//!   switch overlay per period
//! - **Resolver**: `resolver` is the pure "which period is active at `now`"
//!   function
//! - **Time Store**: `store` persists the marker set and active period across
//!   restarts
//! - **Switch Driver**: `switches` owns the switch registry and applies
//!   overlays idempotently
//! - **Provider**: `provider` fetches one day's marker times over HTTP
//! - **Scheduler**: `scheduler` runs the three independent timers
//! - **Engine**: `engine` is the shared resolve-and-apply entry point

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod config;
pub mod engine;
pub mod provider;
pub mod resolver;
pub mod scheduler;
pub mod store;
pub mod switches;
pub mod zman;

mod zmanimd;

// Re-export for the binary
pub use zmanimd::Zmanimd;
