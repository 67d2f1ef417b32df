//! Tracing subscriber setup.

use connmat_config::{LogFormat, LoggingConfig};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install a global fmt subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false`
/// when a global subscriber was already installed; that one stays active.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        LogFormat::Text => builder.with_ansi(true).finish().try_init(),
        LogFormat::Json => builder.json().finish().try_init(),
    };
    installed.is_ok()
}
