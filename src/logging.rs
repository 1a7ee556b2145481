//! Console logging.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Install a stderr subscriber.
///
/// `RUST_LOG` wins when set; otherwise everything at `level` and above is
/// shown. Stdout is left to command output.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .init();
}
