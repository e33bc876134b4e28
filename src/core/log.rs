use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Storage and HTTP crates that are chatty at debug level.
const QUIET_TARGETS: [&str; 4] = ["fjall", "lsm_tree", "hyper", "reqwest"];

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line output for one-shot commands at a terminal.
    Pretty,
    /// Single-line, timestamped output for the long-running scheduler.
    Timestamped,
}

fn app_targets(verbose: bool) -> Targets {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    QUIET_TARGETS
        .iter()
        .fold(Targets::new(), |targets, target| {
            targets.with_target(*target, LevelFilter::WARN)
        })
        .with_target("bankcms", level)
        .with_default(LevelFilter::WARN)
}

pub fn init_logging(verbose: bool, format: LogFormat) {
    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (pretty, timestamped) = match format {
        LogFormat::Pretty => (Some(fmt::layer().pretty().without_time()), None),
        LogFormat::Timestamped => (None, Some(fmt::layer().compact().with_target(false))),
    };

    tracing_subscriber::registry()
        .with(pretty)
        .with(timestamped)
        .with(app_targets(verbose))
        .with(env_filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_app_targets_scope_crate_level() {
        let quiet = app_targets(false);
        assert!(quiet.would_enable("bankcms::core::sync", &Level::INFO));
        assert!(!quiet.would_enable("bankcms::core::sync", &Level::DEBUG));

        let verbose = app_targets(true);
        assert!(verbose.would_enable("bankcms::core::sync", &Level::DEBUG));
        assert!(!verbose.would_enable("some_dependency", &Level::INFO));
    }

    #[test]
    fn test_app_targets_quiet_storage_and_http() {
        let targets = app_targets(true);
        assert!(!targets.would_enable("fjall::keyspace", &Level::DEBUG));
        assert!(!targets.would_enable("hyper::proto", &Level::INFO));
        assert!(targets.would_enable("reqwest::connect", &Level::WARN));
    }
}
