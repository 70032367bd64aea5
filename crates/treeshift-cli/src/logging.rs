//! Logging initialization.

use clap::ValueEnum;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event, for log aggregation.
    Json,
}

/// Map `-v` occurrences to a level.
pub fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
///
/// With `trace_calls`, span creation and close are logged as well, which
/// shows every instrumented engine call with its arguments and duration.
pub fn init_logging(level: &str, format: LogFormat, trace_calls: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("treeshift={level}").into());

    let span_events = if trace_calls {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true)
                    .with_span_events(span_events),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_span_events(span_events),
            )
            .init(),
    }

    tracing::debug!(level = %level, ?format, trace_calls, "Logging initialized");
}
