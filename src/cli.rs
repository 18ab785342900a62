use clap::Parser;

use crate::types::LogLevel;

/// Every flag is an optional override of the config file; running with no
/// arguments performs one full sync pass.
#[derive(Parser, Debug)]
#[command(
    name = "ringdl",
    version,
    about = "Download new Ring doorbell recordings to a local directory"
)]
pub struct Cli {
    /// Config file (default: ~/.ringdl/config.toml)
    #[arg(short = 'c', long)]
    pub config: Option<String>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Number of recent events to check per device
    #[arg(short = 'n', long)]
    pub limit: Option<u32>,

    /// Ring account password, overriding the config file.
    /// WARNING: passing via --password is visible in process listings.
    /// Prefer the RING_PASSWORD environment variable instead.
    #[arg(short = 'p', long, env = "RING_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments_is_a_full_run() {
        let cli = Cli::try_parse_from(["ringdl"]).unwrap();
        assert!(cli.config.is_none());
        assert!(cli.limit.is_none());
        assert_eq!(cli.log_level, LogLevel::Info);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "ringdl",
            "--config",
            "/etc/ringdl.toml",
            "--limit",
            "300",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some("/etc/ringdl.toml"));
        assert_eq!(cli.limit, Some(300));
        assert_eq!(cli.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_rejects_subcommands() {
        assert!(Cli::try_parse_from(["ringdl", "sync"]).is_err());
    }

    #[test]
    fn test_rejects_negative_limit() {
        assert!(Cli::try_parse_from(["ringdl", "--limit", "-1"]).is_err());
    }
}
