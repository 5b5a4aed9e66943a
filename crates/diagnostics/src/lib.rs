//! Logging setup shared by the hivegate crates
//!
//! Every crate logs through the macros exported here, which forward to `emit`.
//! Output goes to stderr through `emit_term` and is filtered by the
//! `HIVEGATE_LOG` environment variable:
//! - `HIVEGATE_LOG=off` (default) - no logs
//! - `HIVEGATE_LOG=error` / `warn` - failures only
//! - `HIVEGATE_LOG=info` - requests, pulls, pushes
//! - `HIVEGATE_LOG=debug` - glob patterns, lock waits, queue depth

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable consulted by [`init_diagnostics`]
pub const LOG_ENV: &str = "HIVEGATE_LOG";

static INIT: Once = Once::new();

/// Result of interpreting a `HIVEGATE_LOG` value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSetting {
    Off,
    Min(emit::Level),
    /// Unrecognized value, falls back to info
    Unknown,
}

/// Map a `HIVEGATE_LOG` value to a minimum level
#[must_use]
pub fn parse_log_setting(value: &str) -> LogSetting {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "off" | "none" => LogSetting::Off,
        "debug" => LogSetting::Min(emit::Level::Debug),
        "info" => LogSetting::Min(emit::Level::Info),
        "warn" | "warning" => LogSetting::Min(emit::Level::Warn),
        "error" => LogSetting::Min(emit::Level::Error),
        _ => LogSetting::Unknown,
    }
}

/// Initialize diagnostics based on the `HIVEGATE_LOG` environment variable
///
/// Call once at startup. Later calls are ignored.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let value = std::env::var(LOG_ENV).unwrap_or_else(|_| "off".to_string());

        let level = match parse_log_setting(&value) {
            LogSetting::Off => return,
            LogSetting::Min(level) => level,
            LogSetting::Unknown => {
                // Bootstrap warning, emitted before the runtime exists
                eprintln!("Warning: Unknown {LOG_ENV} value '{value}', using 'info'");
                emit::Level::Info
            }
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        // The runtime lives for the rest of the process
        std::mem::forget(rt);
    });
}

/// Log request-level operations: reads served, objects written, pulls, pushes
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log internal detail: resolved paths, glob patterns, lock and queue state
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log recoverable failures such as a dropped push or a failed pull
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures that end a request or abort startup
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

pub use init_diagnostics as init;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_safe_to_call_multiple_times() {
        init_diagnostics();
        init_diagnostics();
    }

    #[test]
    fn test_parse_log_setting() {
        assert_eq!(parse_log_setting("off"), LogSetting::Off);
        assert_eq!(parse_log_setting(""), LogSetting::Off);
        assert_eq!(
            parse_log_setting("DEBUG"),
            LogSetting::Min(emit::Level::Debug)
        );
        assert_eq!(
            parse_log_setting("warning"),
            LogSetting::Min(emit::Level::Warn)
        );
        assert_eq!(parse_log_setting("verbose"), LogSetting::Unknown);
    }

    #[test]
    fn test_macros_compile() {
        info!("Test message");
        debug!("Debug message with {value}", value: 42);
        warn!("Warning message");
        error!("Error message");
    }
}
