//! Diagnostic logging to stderr.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "printscan=info,printscan_core=info,warn";
const VERBOSE_FILTER: &str = "printscan=debug,printscan_core=debug,info";

/// Filter used when `RUST_LOG` is unset.
fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `verbose`.
///
/// Output goes to stderr so stdout stays clean for tables and JSON.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .compact();

    // A second init (tests) is harmless.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        for verbose in [false, true] {
            assert!(default_directives(verbose)
                .parse::<EnvFilter>()
                .is_ok());
        }
    }
}
