//! Structured logging with visual formatting.
//!
//! Provides zmanimd's structured terminal output: Unicode box-drawing
//! prefixes that group related lines into conceptual blocks, plus semantic
//! `[LEVEL]` macros for warnings and errors. Logging can be disabled at
//! runtime for quiet operation in tests.
//!
//! Conventions:
//! - `log_version!` once at startup, `log_end!` once at shutdown.
//! - `log_block_start!` opens a new conceptual block (state change, startup
//!   phase, scheduled tick worth announcing).
//! - `log_decorated!` continues a block; `log_indented!` nests details under
//!   a parent line.
//! - `log_pipe!` inserts one empty prefixed line, typically before a
//!   `log_warning!`/`log_error!` that is not part of the surrounding block.
//! - `log_error_exit!` terminates the visual flow for fatal startup errors.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Main logging interface; the macros below route through it.
pub struct Log;

impl Log {
    /// Enable or disable all log output, e.g. for tests.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Enable debug-level output (`--debug`).
    pub fn set_debug(enabled: bool) {
        DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_debug() -> bool {
        DEBUG_ENABLED.load(Ordering::SeqCst)
    }
}

/// Routes formatted output to stdout. Public for macro access.
pub fn write_output(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}

/// Log the application version header.
#[macro_export]
macro_rules! log_version {
    () => {{
        if $crate::logger::Log::is_enabled() {
            let version = env!("CARGO_PKG_VERSION");
            $crate::logger::write_output(&format!("┏ zmanimd v{version} ━━╸\n"));
        }
    }};
}

/// Log the final termination marker.
#[macro_export]
macro_rules! log_end {
    () => {{
        if $crate::logger::Log::is_enabled() {
            $crate::logger::write_output("╹\n");
        }
    }};
}

/// Log a block start message, initiating a new conceptual block.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)*) => {{
        if $crate::logger::Log::is_enabled() {
            let message = format!($($arg)*);
            $crate::logger::write_output(&format!("┃\n┣ {message}\n"));
        }
    }};
}

/// Log a decorated message as part of an existing block.
#[macro_export]
macro_rules! log_decorated {
    ($($arg:tt)*) => {{
        if $crate::logger::Log::is_enabled() {
            let message = format!($($arg)*);
            $crate::logger::write_output(&format!("┣ {message}\n"));
        }
    }};
}

/// Log an indented message for sub-items within a block.
#[macro_export]
macro_rules! log_indented {
    ($($arg:tt)*) => {{
        if $crate::logger::Log::is_enabled() {
            let message = format!($($arg)*);
            $crate::logger::write_output(&format!("┃   {message}\n"));
        }
    }};
}

/// Log a single empty prefixed line for vertical spacing.
#[macro_export]
macro_rules! log_pipe {
    () => {{
        if $crate::logger::Log::is_enabled() {
            $crate::logger::write_output("┃\n");
        }
    }};
}

/// Log an informational message with a green level prefix.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        if $crate::logger::Log::is_enabled() {
            let message = format!($($arg)*);
            $crate::logger::write_output(&format!("┣[\x1b[32mINFO\x1b[0m] {message}\n"));
        }
    }};
}

/// Log a debug message; suppressed unless `--debug` is active.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        if $crate::logger::Log::is_enabled() && $crate::logger::Log::is_debug() {
            let message = format!($($arg)*);
            $crate::logger::write_output(&format!("┣[\x1b[32mDEBUG\x1b[0m] {message}\n"));
        }
    }};
}

/// Log a warning with a yellow level prefix.
#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {{
        if $crate::logger::Log::is_enabled() {
            let message = format!($($arg)*);
            $crate::logger::write_output(&format!("┣[\x1b[33mWARNING\x1b[0m] {message}\n"));
        }
    }};
}

/// Log an error with a red level prefix.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        if $crate::logger::Log::is_enabled() {
            let message = format!($($arg)*);
            $crate::logger::write_output(&format!("┣[\x1b[31mERROR\x1b[0m] {message}\n"));
        }
    }};
}

/// Log a fatal error terminating the visual flow (startup failures).
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)*) => {{
        if $crate::logger::Log::is_enabled() {
            let message = format!($($arg)*);
            $crate::logger::write_output(&format!("┃\n┗[\x1b[31mERROR\x1b[0m] {message}\n"));
        }
    }};
}
