//! Diagnostics to stderr.
//!
//! `RUST_LOG` wins when set; otherwise the level comes from the number of
//! `-v` flags. Stdout is left to command output.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter directive for a `-v` count: 0 = warn, 1 = info, 2 = debug, 3+ = trace.
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "clip_harness=warn,clips=warn",
        1 => "clip_harness=info,clips=info",
        2 => "clip_harness=debug,clips=debug",
        _ => "trace",
    }
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose >= 2),
        )
        .with(filter)
        .try_init();
}
