use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "tradeguard=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global fmt subscriber; `RUST_LOG` overrides the default filter
pub fn setup_logging() {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();
}

/// Like [`setup_logging`] but tolerates an already installed subscriber
pub fn try_setup_logging() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .try_init()
        .is_ok()
}
