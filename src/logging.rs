//! Tracing setup shared by the binaries

use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::LoggingConfig;

/// Directives used when `RUST_LOG` is unset
pub fn default_directives(config: &LoggingConfig) -> String {
    format!("glycotrack={},tower_http=debug", config.level)
}

/// Install the global subscriber: `EnvFilter` plus a pretty or json
/// formatter, writing to stdout or the configured file
pub fn init_tracing(config: &LoggingConfig) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config)));
    let json = config.format.eq_ignore_ascii_case("json");

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let writer = Mutex::new(file);
            if json {
                fmt::layer().json().with_writer(writer).boxed()
            } else {
                fmt::layer().with_ansi(false).with_writer(writer).boxed()
            }
        }
        None if json => fmt::layer().json().boxed(),
        None => fmt::layer().boxed(),
    };

    tracing_subscriber::registry().with(layer).with(filter).init();
    Ok(())
}
