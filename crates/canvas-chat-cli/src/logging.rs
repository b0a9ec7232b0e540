//! Tracing subscriber setup from the `logging` config section.
//!
//! `RUST_LOG` wins when set. Otherwise the level comes from `--verbose`, the
//! `chat.debug` flag or `logging.level`, followed by any per-crate filters.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use canvas_chat_core::config::{Config, LoggingConfig};

const DEFAULT_LEVEL: &str = "info";

/// Build the filter directive string used when `RUST_LOG` is unset.
pub fn filter_directive(logging: Option<&LoggingConfig>, verbose: bool, debug: bool) -> String {
    let level = if verbose || debug {
        "debug"
    } else {
        logging
            .and_then(|l| l.level.as_deref())
            .unwrap_or(DEFAULT_LEVEL)
    };

    let mut directives = vec![level.to_string()];
    if let Some(logging) = logging {
        directives.extend(logging.filters.iter().cloned());
    }
    directives.join(",")
}

pub fn init(config: &Config, verbose: bool) -> anyhow::Result<()> {
    let logging = config.logging.as_ref();
    let directive = filter_directive(logging, verbose, config.debug());

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directive))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    let writer = match logging.map(|l| l.output.as_str()) {
        Some("stdout") => BoxMakeWriter::new(std::io::stdout),
        _ => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);

    let result = match logging.map(|l| l.format.as_str()) {
        Some("json") => builder.json().try_init(),
        _ => builder.try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialise logging: {e}"))
}
