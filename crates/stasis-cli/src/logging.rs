//! Log output for the CLI
//!
//! Filter directives come from `STASIS_LOG` (same syntax as `RUST_LOG`).
//! Without it, `--verbose` selects `debug` and the default is `info`.

use std::io;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable holding filter directives
pub const LOG_ENV: &str = "STASIS_LOG";

pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    let stderr_layer = fmt::layer()
        .compact()
        .with_target(verbose)
        .without_time()
        .with_writer(io::stderr)
        .with_filter(filter);

    tracing_subscriber::registry().with(stderr_layer).init();
}
