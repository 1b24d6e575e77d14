//! Logging setup
//!
//! Logs go to stderr so report progress never mixes with stdout output.
//! `RUST_LOG` wins over the command-line level when set.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Map CLI level names (including the aliases clap accepts) onto filter
/// directives
fn level_directive(verbose: bool, log_level: Option<&str>) -> &'static str {
    match log_level.map(str::to_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("verbose") | Some("debug") => "debug",
        Some("info") => "info",
        Some("warning") | Some("warn") => "warn",
        Some("error") | Some("critical") => "error",
        _ if verbose => "debug",
        _ => "info",
    }
}

/// Install the global subscriber
pub fn init(verbose: bool, json_output: bool, log_level: Option<&str>) -> anyhow::Result<()> {
    let level = level_directive(verbose, log_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,stroi_monitor={}", level))
    });

    let result = if json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };

    result.map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_directive() {
        assert_eq!(level_directive(false, None), "info");
        assert_eq!(level_directive(true, None), "debug");
        assert_eq!(level_directive(true, Some("error")), "error");
        assert_eq!(level_directive(false, Some("WARNING")), "warn");
        assert_eq!(level_directive(false, Some("verbose")), "debug");
        assert_eq!(level_directive(false, Some("critical")), "error");
    }
}
