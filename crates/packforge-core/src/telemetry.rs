//! Tracing initialisation for the Packforge binary.
//!
//! Call [`init_tracing`] once at program start. Later calls are ignored
//! because the global subscriber can only be set once per process.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Build the filter: `RUST_LOG` if set, otherwise `level` for the
/// Packforge crates and `warn` for everything else.
pub fn default_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,packforge={level},packforge_core={level},artifact_cache={level}",
            level = level.as_str().to_lowercase()
        ))
    })
}

/// Initialise the global tracing subscriber.
///
/// * `json`: emit newline-delimited JSON instead of human-readable lines.
/// * `level`: verbosity when `RUST_LOG` is not set.
pub fn init_tracing(json: bool, level: Level) {
    let (json_layer, text_layer) = if json {
        (Some(fmt::layer().with_target(false).json()), None)
    } else {
        (None, Some(fmt::layer().with_target(false)))
    };

    tracing_subscriber::registry()
        .with(default_filter(level))
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .ok();
}
