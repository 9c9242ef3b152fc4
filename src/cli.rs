use crate::logging::{LogConfig, LogFormat};
use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "seatplannerd",
    version,
    about = "Classroom seating sidecar speaking JSON lines on stdin/stdout"
)]
pub struct Cli {
    /// Workspace directory to open at startup.
    #[arg(long, value_name = "DIR", env = "SEATPLANNER_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(long = "log-format", value_enum, default_value = "compact")]
    pub log_format: LogFormat,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn log_config(&self) -> LogConfig {
        LogConfig::from_verbosity(self.verbose)
            .with_format(self.log_format)
            .with_log_file(self.log_file.clone())
    }
}
