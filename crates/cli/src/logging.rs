//! Diagnostics on stderr through `tracing-subscriber`.
//!
//! Both crates log through the `log` facade; the subscriber's `init` bridges
//! those records into `tracing`, so stdout stays reserved for contract output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "warn";

/// Filter for a configured level name or directive, falling back to `warn`.
pub fn filter(level: &str) -> EnvFilter {
    let level = level.trim();
    if level.is_empty() {
        return EnvFilter::new(DEFAULT_FILTER);
    }
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the stderr subscriber. A second call is a no-op.
pub fn init(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(filter(level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn level_names_become_filters() {
        assert_eq!(filter("debug").max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(filter("off").max_level_hint(), Some(LevelFilter::OFF));
        assert_eq!(filter("  ").max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn malformed_directive_falls_back_to_warn() {
        assert_eq!(filter("twinroom=loudest").max_level_hint(), Some(LevelFilter::WARN));
    }
}
