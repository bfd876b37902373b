mod help_text;

use crate::config::LogLevel;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Generate a configuration file from the fragments in a .d directory
#[derive(Parser, Debug)]
#[command(name = "dotdee", version, about, long_about = help_text::ROOT_LONG_ABOUT)]
pub struct Cli {
    /// Change to DIRECTORY before doing anything
    #[arg(short = 'C', value_name = "DIRECTORY", global = true)]
    pub directory: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug). Takes precedence over RUST_LOG.
    #[arg(short, long, action = ArgAction::Count, global = true, conflicts_with = "log_level")]
    pub verbose: u8,

    /// Only log errors. Takes precedence over RUST_LOG.
    #[arg(short, long, action = ArgAction::Count, global = true, conflicts_with_all = ["log_level", "verbose"])]
    pub quiet: u8,

    /// Set the log level. Takes precedence over RUST_LOG.
    #[arg(long, value_name = "LEVEL", value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Read settings from this file only
    #[arg(long, value_name = "FILE", global = true, conflicts_with = "no_config")]
    pub config: Option<PathBuf>,

    /// Do not read any configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Manage files on this host over SSH
    #[arg(long, value_name = "HOST", global = true)]
    pub host: Option<String>,

    /// SSH port of the remote host
    #[arg(long, value_name = "PORT", global = true)]
    pub port: Option<u16>,

    /// Log in to the remote host as USER
    #[arg(long, value_name = "USER", global = true)]
    pub user: Option<String>,

    /// Run all operations through sudo
    #[arg(long, global = true)]
    pub sudo: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Regenerate a file from its fragment directory
    #[command(long_about = help_text::UPDATE_LONG_ABOUT)]
    Update {
        /// File to generate (its fragments live in FILE.d)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Overwrite the file even if it was modified since it was last generated
        #[arg(short, long)]
        force: bool,

        /// Show what would happen without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Only proceed if the rendered content matches this fingerprint from status
        #[arg(long, value_name = "FINGERPRINT")]
        fingerprint: Option<String>,
    },

    /// Show what an update would do
    #[command(long_about = help_text::STATUS_LONG_ABOUT)]
    Status {
        /// File to inspect
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_update_with_globals_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dotdee", "update", "--force", "/etc/hosts", "--host", "web1", "--sudo",
        ])
        .unwrap();

        assert_eq!(cli.host.as_deref(), Some("web1"));
        assert!(cli.sudo);
        match cli.command {
            Command::Update {
                file,
                force,
                dry_run,
                fingerprint,
            } => {
                assert_eq!(file, PathBuf::from("/etc/hosts"));
                assert!(force);
                assert!(!dry_run);
                assert_eq!(fingerprint, None);
            }
            other => panic!("Expected Update, got {other:?}"),
        }
    }

    #[test]
    fn test_log_level_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["dotdee", "--log-level", "info", "-v", "status", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_file_is_required() {
        assert!(Cli::try_parse_from(["dotdee", "update"]).is_err());
    }
}
