//! Subscriber installation for the command-line driver.
//!
//! Everything comes from [`LogConfig`]: the base level, extra per-target
//! directives, stderr and file sinks, and whether `frame`/`module` spans report
//! their duration when they close. `RUST_LOG` still wins over the configured level.

use anyhow::{Context, Result};
use iqflow_core::LogConfig;
use std::fs::File;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::{Directive, EnvFilter};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Keeps the file writer flushing until the process ends
pub struct LogGuard {
    _worker: Option<WorkerGuard>,
    log_file: Option<PathBuf>,
}

impl LogGuard {
    /// Log file of this session, when file output is on
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }
}

/// Filter for every sink: configured level, then each extra directive
fn build_filter(config: &LogConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::builder()
        .with_default_directive(config.parse_level().into())
        .from_env_lossy();
    for raw in &config.directives {
        let directive: Directive = raw
            .parse()
            .with_context(|| format!("Invalid log directive '{}'", raw))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

fn span_events(config: &LogConfig) -> FmtSpan {
    if config.span_timing {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

fn open_log_file(config: &LogConfig) -> Result<(NonBlocking, WorkerGuard, PathBuf)> {
    config
        .ensure_log_directory()
        .context("Failed to create log directory")?;
    if let Err(e) = config.cleanup_old_logs() {
        eprintln!("Warning: Failed to cleanup old log files: {}", e);
    }

    let path = config.current_log_path();
    let file =
        File::create(&path).with_context(|| format!("Failed to create log file: {:?}", path))?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    Ok((writer, guard, path))
}

/// Install the global subscriber described by `config`.
pub fn init(config: &LogConfig) -> Result<LogGuard> {
    let filter = build_filter(config)?;

    // Register fields go to stdout, so the console sink is stderr
    let console = config.console_output.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .with_target(false)
            .with_span_events(span_events(config))
    });

    let (file, worker, log_file) = if config.file_output {
        let (writer, guard, path) = open_log_file(config)?;
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_thread_names(true)
            .with_span_events(span_events(config));
        (Some(layer), Some(guard), Some(path))
    } else {
        (None, None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .context("Logging was already initialized")?;

    tracing::debug!(
        level = %config.level,
        directives = ?config.directives,
        log_file = ?log_file,
        "Logging initialized"
    );
    Ok(LogGuard {
        _worker: worker,
        log_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_directives_are_parsed() {
        let config = LogConfig {
            directives: vec!["iqflow_core::tree=trace".to_string()],
            ..Default::default()
        };
        assert!(build_filter(&config).is_ok());
    }

    #[test]
    fn test_invalid_directive_is_rejected() {
        let config = LogConfig {
            directives: vec!["iqflow_core=loudest".to_string()],
            ..Default::default()
        };
        let err = build_filter(&config).unwrap_err();
        assert!(err.to_string().contains("iqflow_core=loudest"));
    }

    #[test]
    fn test_span_timing_selects_close_events() {
        let mut config = LogConfig::default();
        assert_eq!(span_events(&config), FmtSpan::NONE);
        config.span_timing = true;
        assert_eq!(span_events(&config), FmtSpan::CLOSE);
    }

    #[test]
    fn test_log_file_created_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            log_path: dir.path().join("logs"),
            file_output: true,
            ..Default::default()
        };
        let (_writer, _guard, path) = open_log_file(&config).unwrap();
        assert!(path.starts_with(dir.path().join("logs")));
        assert!(path.exists());
    }
}
