//! Logging configuration
//!
//! The subscriber itself is installed by the binary; this module only describes
//! where logs go and how many old log files are kept.

use chrono::Local;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

/// Prefix of every log file name
pub const LOG_FILE_PREFIX: &str = "iqflow_";

/// Timestamp shared by every log path of this process
static SESSION_STAMP: Lazy<String> =
    Lazy::new(|| Local::now().format("%Y-%m-%d_%H-%M-%S").to_string());

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level name (trace, debug, info, warn, error)
    pub level: String,
    /// Directory for log files
    pub log_path: PathBuf,
    /// Number of log files to keep
    pub max_files: usize,
    /// Log to stderr
    pub console_output: bool,
    /// Log to a file in `log_path`
    pub file_output: bool,
    /// Extra filter directives such as `iqflow_core::tree=trace`
    pub directives: Vec<String>,
    /// Report the duration of each frame and module span when it closes
    pub span_timing: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_path: PathBuf::from("logs"),
            max_files: 10,
            console_output: true,
            file_output: false,
            directives: Vec::new(),
            span_timing: false,
        }
    }
}

impl LogConfig {
    /// Configured level, `INFO` if the name is not recognised
    pub fn parse_level(&self) -> LevelFilter {
        self.level.parse().unwrap_or(LevelFilter::INFO)
    }

    /// Log file of the current session
    pub fn current_log_path(&self) -> PathBuf {
        self.log_path
            .join(format!("{}{}.log", LOG_FILE_PREFIX, *SESSION_STAMP))
    }

    /// Create the log directory when file output is enabled
    pub fn ensure_log_directory(&self) -> io::Result<()> {
        if self.file_output {
            fs::create_dir_all(&self.log_path)?;
        }
        Ok(())
    }

    /// Delete the oldest log files beyond `max_files`; returns how many were removed
    pub fn cleanup_old_logs(&self) -> io::Result<usize> {
        if !self.log_path.is_dir() {
            return Ok(0);
        }

        let mut logs: Vec<PathBuf> = fs::read_dir(&self.log_path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX) && n.ends_with(".log"))
            })
            .collect();

        if logs.len() <= self.max_files {
            return Ok(0);
        }

        // Timestamped names sort chronologically
        logs.sort();
        let excess = logs.len() - self.max_files;
        for path in &logs[..excess] {
            fs::remove_file(path)?;
        }
        Ok(excess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        let mut config = LogConfig::default();
        assert_eq!(config.parse_level(), LevelFilter::INFO);
        config.level = "debug".to_string();
        assert_eq!(config.parse_level(), LevelFilter::DEBUG);
        config.level = "loud".to_string();
        assert_eq!(config.parse_level(), LevelFilter::INFO);
    }

    #[test]
    fn test_cleanup_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            log_path: dir.path().to_path_buf(),
            max_files: 2,
            file_output: true,
            ..Default::default()
        };

        for stamp in ["2024-01-01", "2024-01-02", "2024-01-03"] {
            fs::write(dir.path().join(format!("iqflow_{stamp}.log")), "x").unwrap();
        }
        fs::write(dir.path().join("other.txt"), "x").unwrap();

        assert_eq!(config.cleanup_old_logs().unwrap(), 1);
        assert!(!dir.path().join("iqflow_2024-01-01.log").exists());
        assert!(dir.path().join("iqflow_2024-01-03.log").exists());
        assert!(dir.path().join("other.txt").exists());
    }

    #[test]
    fn test_log_path_in_directory() {
        let config = LogConfig::default();
        let path = config.current_log_path();
        assert!(path.starts_with("logs"));
        assert_eq!(path, config.current_log_path());
    }
}
