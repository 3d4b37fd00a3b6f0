//! Logging initialization built on fern.

use log::LevelFilter;

/// Initializes the global logger. `level` accepts the usual level names
/// and falls back to info for anything unrecognized. An optional file
/// path adds a second output alongside stderr.
pub fn init_logging(
    level: &str,
    log_file: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let level = match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    };

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Some(path) = log_file {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_applies_once() {
        assert!(init_logging("debug", None).is_ok());
        // The global logger can only be installed once per process.
        assert!(init_logging("info", None).is_err());
    }
}
