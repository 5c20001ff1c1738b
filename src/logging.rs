//! Logging setup using the `log` facade and `env_logger` backend.
//!
//! The level comes from, in priority order:
//!
//! 1. `RUST_LOG` (if set)
//! 2. `--quiet` (errors only) or `-v`/`-vv` (debug/trace)
//! 3. Default: info
//!
//! Log lines go to stderr so that search results on stdout stay pipeable.

use std::env;
use std::io::Write;

use env_logger::{Builder, Target, WriteStyle};
use log::LevelFilter;

/// Initialize logging from CLI flags.
///
/// Must be called at most once per process; later calls are ignored.
///
/// # Arguments
///
/// * `verbose` - Verbosity count from CLI (0=info, 1=debug, 2+=trace)
/// * `quiet` - Only show errors (overridden by `RUST_LOG`)
/// * `no_color` - Never emit ANSI colors
pub fn init_logging(verbose: u8, quiet: bool, no_color: bool) {
    let mut builder = Builder::new();
    builder.target(Target::Stderr);

    let from_env = env::var("RUST_LOG").is_ok();
    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    builder.write_style(if no_color {
        WriteStyle::Never
    } else {
        WriteStyle::Auto
    });

    let line = LineFormat::for_build(verbose, cfg!(debug_assertions));
    builder.format(move |buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        match line {
            LineFormat::TimestampModule => writeln!(
                buf,
                "{} {style}{:<5}{style:#} [{}] {}",
                buf.timestamp_seconds(),
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            ),
            LineFormat::Timestamp => writeln!(
                buf,
                "{} {style}{:<5}{style:#} {}",
                buf.timestamp_seconds(),
                level,
                record.args()
            ),
            LineFormat::Plain => writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args()),
        }
    });

    if builder.try_init().is_err() {
        return;
    }

    if from_env {
        log::debug!("Logging configured from RUST_LOG");
    } else {
        log::debug!("Logging initialized at level: {:?}", log::max_level());
    }
}

/// Shape of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineFormat {
    /// Level and message (release builds).
    Plain,
    /// Timestamp, level and message.
    Timestamp,
    /// Timestamp, level, module path and message.
    TimestampModule,
}

impl LineFormat {
    fn for_build(verbose: u8, debug_build: bool) -> Self {
        match (debug_build, verbose) {
            (false, _) => Self::Plain,
            (true, 0) => Self::Timestamp,
            (true, _) => Self::TimestampModule,
        }
    }
}

/// Map CLI flags to a level filter. `quiet` wins over `verbose`.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
