//! Log output for the `bpad` binary.
//!
//! Lifecycle progress, command lines and captured tool output are emitted as
//! `tracing` events. They are written to stderr: stdout belongs to whatever
//! terraform or kubectl print during an interactive run.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber for one `bpad` invocation.
///
/// `level` comes from `--verbose` and is overridden by `RUST_LOG`. With
/// `json`, each event is one JSON object per line. Later calls in the same
/// process are no-ops.
pub fn init_tracing(json: bool, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let json_layer = json.then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
    });
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .ok();
}
