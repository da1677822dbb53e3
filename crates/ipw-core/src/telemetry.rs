//! Tracing setup shared by the `ipwd` and `ipw` binaries.
//!
//! Call [`init_tracing`] once at program start to configure the global
//! subscriber with an `EnvFilter` and optional JSON formatting.
//!
//! Safe to call more than once; subsequent calls are silently ignored
//! (the global subscriber can only be set once per process).

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Initialise the global tracing subscriber.
///
/// * `json` — newline-delimited JSON lines instead of human-readable ones.
/// * `level` — default verbosity when `RUST_LOG` is not set.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let format: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer().with_target(false).json().boxed()
    } else {
        fmt::layer().with_target(false).boxed()
    };

    tracing_subscriber::registry()
        .with(format)
        .with(env_filter)
        .try_init()
        .ok();
}

/// Map the `DEBUG` switch onto `(json, level)`.
///
/// Debug mode logs human-readable lines at debug level; otherwise JSON at info.
pub fn logging_profile(debug: bool) -> (bool, Level) {
    if debug {
        (false, Level::DEBUG)
    } else {
        (true, Level::INFO)
    }
}
