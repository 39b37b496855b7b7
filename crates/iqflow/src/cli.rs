use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Also write logs to a file in the log directory
    #[arg(long, global = true)]
    pub log_file: bool,

    /// Directory for log files
    #[arg(long, default_value = "logs", global = true)]
    pub log_dir: PathBuf,

    /// Extra filter directive, e.g. `iqflow_core::tree=trace` (repeatable)
    #[arg(long = "log-directive", value_name = "DIRECTIVE", global = true)]
    pub log_directives: Vec<String>,

    /// Log how long each frame and module took
    #[arg(long, global = true)]
    pub timings: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a frame sequence through every module of a tuning asset
    Run {
        /// Tuning asset (.ron, .iqt or .json)
        asset: PathBuf,

        /// Frame sequence (.ron or .json)
        frames: PathBuf,

        /// Only run these modules (repeatable)
        #[arg(short, long = "module", value_name = "NAME")]
        modules: Vec<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Check a tuning asset and list every issue found
    Validate {
        /// Tuning asset (.ron, .iqt or .json)
        asset: PathBuf,
    },

    /// Write a starter tuning asset and frame sequence
    Template {
        /// Where to write the tuning asset
        asset: PathBuf,

        /// Where to write the frame sequence
        #[arg(long)]
        frames: Option<PathBuf>,
    },
}

/// Output format for register fields.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum OutputFormat {
    /// One line per register field
    Text,
    /// One JSON frame report per line
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let args = Args::try_parse_from([
            "iqflow",
            "run",
            "sensor.ron",
            "frames.json",
            "-m",
            "color_correction",
            "--format",
            "json",
            "--log-level",
            "debug",
            "--log-directive",
            "iqflow_core::tree=trace",
            "--timings",
        ])
        .unwrap();

        assert_eq!(args.log_level, "debug");
        assert_eq!(args.log_directives, vec!["iqflow_core::tree=trace"]);
        assert!(args.timings);
        match args.command {
            Command::Run {
                modules, format, ..
            } => {
                assert_eq!(modules, vec!["color_correction"]);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_template_frames_optional() {
        let args = Args::try_parse_from(["iqflow", "template", "sensor.ron"]).unwrap();
        assert!(matches!(args.command, Command::Template { frames: None, .. }));
    }
}
