//! Tracing setup: a console layer on stderr plus an optional rolling file sink.
//!
//! Stdout is reserved for status lines so `--json` output stays parseable.

use std::path::Path;

use cycler_config::Logging;
use eyre::{Result, WrapErr};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

use crate::cli::FILE_GUARD;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Console filter comes from `RUST_LOG` when set, else `--log-level`.
/// The file sink uses `[logging] level`, falling back to the console level.
pub fn init(cli_level: &str, json: bool, cfg: &Logging) -> Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli_level))
        .wrap_err_with(|| format!("invalid log level {cli_level:?}"))?;

    let console: BoxedLayer = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    };

    let mut layers = vec![console];
    if let Some(file) = cfg.file.as_deref() {
        let level = cfg.level.as_deref().unwrap_or(cli_level);
        layers.push(file_layer(Path::new(file), cfg.rotation.as_deref(), level)?);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}

fn file_layer(path: &Path, rotation: Option<&str>, level: &str) -> Result<BoxedLayer> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .ok_or_else(|| eyre::eyre!("logging.file {} has no file name", path.display()))?;

    let appender = match rotation.unwrap_or("never") {
        "daily" => tracing_appender::rolling::daily(dir, name),
        "hourly" => tracing_appender::rolling::hourly(dir, name),
        _ => tracing_appender::rolling::never(dir, name),
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);
    // Keep the worker alive for the whole process so buffered lines flush.
    let _ = FILE_GUARD.set(guard);

    let filter = EnvFilter::try_new(level)
        .wrap_err_with(|| format!("invalid logging.level {level:?}"))?;
    Ok(fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(filter)
        .boxed())
}
