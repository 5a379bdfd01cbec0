//! Tracing subscriber setup
//!
//! The subscriber goes in before configuration is read, so warnings raised
//! while loading the config file are printed. The configured level is applied
//! afterwards through a reload handle; a valid `RUST_LOG` always wins.

use tracing::{debug, warn, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

/// Level used until the configuration has been read
pub const DEFAULT_LEVEL: &str = "info";

/// Handle for swapping the active filter after startup
pub type LevelHandle = reload::Handle<EnvFilter, Registry>;

/// `RUST_LOG` when set and valid, otherwise [`DEFAULT_LEVEL`]
pub fn initial_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}

/// Registry with a reloadable filter and a fmt layer writing to `writer`
pub fn build_subscriber<W>(
    filter: EnvFilter,
    writer: W,
) -> (impl Subscriber + Send + Sync + 'static, LevelHandle)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let (filter_layer, handle) = reload::Layer::new(filter);
    let subscriber = tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer().with_writer(writer));
    (subscriber, handle)
}

/// Switch to the configured `logging.level` unless `RUST_LOG` is in effect
pub fn apply_configured_level(handle: &LevelHandle, level: &str) {
    if EnvFilter::try_from_default_env().is_ok() {
        debug!("RUST_LOG is set, ignoring logging.level = {}", level);
        return;
    }
    if let Err(e) = reload_level(handle, level) {
        warn!("{}; keeping log level {}", e, DEFAULT_LEVEL);
    }
}

/// Replace the active filter with `level`
pub fn reload_level(handle: &LevelHandle, level: &str) -> Result<(), String> {
    let filter = EnvFilter::try_new(level)
        .map_err(|e| format!("Invalid logging.level {:?}: {}", level, e))?;
    handle
        .reload(filter)
        .map_err(|e| format!("Could not apply logging.level {:?}: {}", level, e))
}
