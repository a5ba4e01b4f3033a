//! Minimal logger.
//!
//! Prints `[elapsed LEVEL thread] message` to stderr. The thread column tells
//! main-loop output apart from the detection worker. Use `init_with_level` to
//! install it once at startup, or `init_tracing` when the `tracing` feature
//! is on.

use std::fmt;
use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::EnvFilter;

struct ThreadTaggedLogger {
    level: LevelFilter,
    started: Instant,
}

/// One output line, without the trailing newline.
fn format_line(elapsed: f64, level: Level, thread: Option<&str>, args: &fmt::Arguments) -> String {
    format!("[{elapsed:7.3}s {level:>5} {}] {args}", thread.unwrap_or("?"))
}

impl Log for ThreadTaggedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_line(
            self.started.elapsed().as_secs_f64(),
            record.level(),
            std::thread::current().name(),
            record.args(),
        );
        // one write per line so worker and main-loop output never interleave
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<ThreadTaggedLogger> = OnceLock::new();

/// Install the logger with the provided level filter.
///
/// Calling this more than once is a no-op after the first successful
/// initialization; the first level wins.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| ThreadTaggedLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install a global `tracing` subscriber writing to stderr.
///
/// The filter comes from `RUST_LOG`, falling back to `default` when the
/// variable is unset or unparsable. Events carry the thread name, and span
/// close events are emitted so instrumented stages (scheduler submit,
/// smoothing) report their duration. With `json` every event is one
/// flattened JSON object per line, otherwise lines are plain text stamped
/// with the process uptime.
///
/// Returns `false` when a global subscriber was already installed, in which
/// case nothing changes. Bridging `log` records into tracing is left to the
/// caller (`tracing_log::LogTracer`).
#[cfg(feature = "tracing")]
pub fn init_tracing(default: LevelFilter, json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default.to_string().to_lowercase()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE)
        .with_thread_names(true);
    let installed = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(tracing_subscriber::fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_carries_thread_name() {
        let line = format_line(1.5, Level::Warn, Some("tag-detect"), &format_args!("slow {}", 3));
        assert_eq!(line, "[  1.500s  WARN tag-detect] slow 3");
    }

    #[test]
    fn unnamed_thread_is_marked() {
        let line = format_line(0.0, Level::Debug, None, &format_args!("x"));
        assert_eq!(line, "[  0.000s DEBUG ?] x");
    }

    #[test]
    fn repeated_init_is_a_no_op() {
        init_with_level(LevelFilter::Debug).unwrap();
        init_with_level(LevelFilter::Trace).unwrap();
        assert_eq!(LOGGER.get().map(|l| l.level), Some(LevelFilter::Debug));
    }
}
