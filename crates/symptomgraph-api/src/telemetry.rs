use anyhow::{Context, Result};
use symptomgraph_core::Settings;
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

const BOOTSTRAP_FILTER: &str = "info";

/// Filter layer whose directives can be replaced once settings are loaded.
pub type ReloadableFilter = reload::Layer<EnvFilter, Registry>;

pub struct LogFilterHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

/// `RUST_LOG` when set, otherwise a bootstrap level until settings are known.
pub fn filter_layer() -> (ReloadableFilter, LogFilterHandle) {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => reloadable(filter, true),
        Err(_) => reloadable(EnvFilter::new(BOOTSTRAP_FILTER), false),
    }
}

fn reloadable(filter: EnvFilter, from_env: bool) -> (ReloadableFilter, LogFilterHandle) {
    let (layer, handle) = reload::Layer::new(filter);
    (layer, LogFilterHandle { handle, from_env })
}

/// Installs the global subscriber before anything else logs.
pub fn init_tracing() -> LogFilterHandle {
    let (filter, handle) = filter_layer();
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    handle
}

impl LogFilterHandle {
    /// Switches to the configured level. An explicit `RUST_LOG` always wins.
    pub fn apply_settings(&self, settings: &Settings) -> Result<()> {
        if self.from_env {
            return Ok(());
        }
        self.handle
            .reload(EnvFilter::new(settings.log_filter()))
            .context("reloading log filter")
    }

    pub fn current(&self) -> Option<String> {
        self.handle.with_current(|filter| filter.to_string()).ok()
    }
}
