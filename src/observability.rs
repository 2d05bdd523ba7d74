//! Logging setup and structured diagnostics for the codec.
//!
//! The library itself only talks to the `log` facade. Binaries and tests that
//! want to see encoder/decoder events call `enable_verbose_logging` (or
//! `enable_logging` with a `CodecConfig`) once; later calls are no-ops.

use log::LevelFilter;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Once;

use crate::config::CodecConfig;
use crate::error::Result;

/// Logs a structured key-value metric line at debug level, only in debug builds.
///
/// # Example
/// ```
/// use scmv_codec::log_metric;
/// let total_size = 12;
/// log_metric!("event" = "encoder_close", "total_size" = total_size);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        #[cfg(debug_assertions)]
        {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            log::debug!(target: "scmv_metric", "SCMV_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

static INIT_LOGGER: Once = Once::new();

/// Turns on info-level logging, optionally appending to `log_file`.
pub fn enable_verbose_logging(log_file: Option<&Path>) -> Result<()> {
    init_logger(LevelFilter::Info, log_file)
}

/// Turns on logging as described by `config.log_level` / `config.log_file`.
/// A config without a level leaves logging untouched.
pub fn enable_logging(config: &CodecConfig) -> Result<()> {
    config.validate()?;
    match config.log_level.as_deref() {
        Some(level) => {
            let filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
            init_logger(filter, config.log_file.as_deref())
        }
        None => Ok(()),
    }
}

fn init_logger(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    // Open the file up front so a bad path is reported instead of swallowed.
    let file = match log_file {
        Some(path) => Some(OpenOptions::new().append(true).create(true).open(path)?),
        None => None,
    };

    INIT_LOGGER.call_once(move || {
        let mut builder = env_logger::Builder::new();

        builder.is_test(false);
        builder.filter_level(level);

        // Custom formatter: just print the level and message
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(file) = file {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        let _ = builder.try_init();
    });
    Ok(())
}
