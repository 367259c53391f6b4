//! Log setup for hosts embedding the progression stores
//!
//! [`TracingConfig`] holds a base level plus overrides keyed by module path
//! below `system_core` (`"storage"`, `"migration"`, ...). The overrides are
//! rendered into `EnvFilter` directives; `SYSTEM_CORE_LOG` replaces them
//! wholesale when set.
//!
//! Store writes and loads run inside [`OpTimer`] guards so their latency
//! shows up at debug level.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Once;
use std::time::{Duration, Instant};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::span::EnteredSpan;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a full filter directive string
pub const LOG_ENV_VAR: &str = "SYSTEM_CORE_LOG";

const CRATE_TARGET: &str = "system_core";

/// Installs the global subscriber. Added by [`crate::ProgressionPlugin`]
/// unless the host registered its own instance first.
#[derive(Default)]
pub struct LoggingPlugin {
    pub config: TracingConfig,
}

impl Plugin for LoggingPlugin {
    fn build(&self, _app: &mut App) {
        init_tracing(&self.config);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub level: LogLevel,
    /// Keyed by module path relative to the crate, e.g. `"skill_tree"`
    pub modules: BTreeMap<String, LogLevel>,
    pub thread_ids: bool,
    pub targets: bool,
    pub source_location: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        let modules = [
            ("storage", LogLevel::Warn),
            ("migration", LogLevel::Info),
            ("store", LogLevel::Info),
            ("skill_tree", LogLevel::Info),
            ("track_log", LogLevel::Info),
        ]
        .into_iter()
        .map(|(module, level)| (module.to_string(), level))
        .collect();

        Self {
            level: LogLevel::Info,
            modules,
            thread_ids: false,
            targets: true,
            source_location: false,
        }
    }
}

impl TracingConfig {
    /// `EnvFilter` directive string, base level first
    pub fn directives(&self) -> String {
        std::iter::once(self.level.to_string())
            .chain(
                self.modules
                    .iter()
                    .map(|(module, level)| format!("{CRATE_TARGET}::{module}={level}")),
            )
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }
}

static SUBSCRIBER: Once = Once::new();

/// Install the fmt subscriber once per process. Later calls are ignored, as
/// is a host that already set a global default.
pub fn init_tracing(config: &TracingConfig) {
    SUBSCRIBER.call_once(|| {
        let installed = tracing_subscriber::fmt()
            .with_env_filter(config.env_filter())
            .with_target(config.targets)
            .with_thread_ids(config.thread_ids)
            .with_file(config.source_location)
            .with_line_number(config.source_location)
            .compact()
            .try_init()
            .is_ok();
        if installed {
            tracing::debug!(directives = %config.directives(), "tracing installed");
        }
    });
}

/// Guard timing one store operation. Enters a `store_op` span and logs the
/// elapsed time when dropped.
pub struct OpTimer {
    store: &'static str,
    op: &'static str,
    started: Instant,
    _span: EnteredSpan,
}

impl OpTimer {
    pub fn start(store: &'static str, op: &'static str) -> Self {
        Self {
            store,
            op,
            started: Instant::now(),
            _span: tracing::debug_span!("store_op", store, op).entered(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for OpTimer {
    fn drop(&mut self) {
        tracing::debug!(
            store = self.store,
            op = self.op,
            micros = self.elapsed().as_micros() as u64,
            "store op finished"
        );
    }
}
