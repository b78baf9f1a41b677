use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::cli::setup::SetupArg;
use crate::cli::status::StatusArg;
use crate::cli::sync::SyncArg;
use crate::cli::verify::VerifyArg;

#[derive(Clone, Debug, Parser)]
#[command(name = "aipsync", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    #[arg(short, long, global = true, default_value = "aipsync.toml", help = "Config file")]
    pub config:  PathBuf,
    #[arg(short, long, global = true, action = ArgAction::Count, help = "More logging, repeat for trace")]
    pub verbose: u8,
    #[command(subcommand)]
    pub cmd:     Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "s", name = "sync", about = "Download and merge the active cycle")]
    Sync(SyncArg),
    #[command(alias = "st", name = "status", about = "Show the last recorded run")]
    Status(StatusArg),
    #[command(alias = "v", name = "verify", about = "Check a unit's merged artifacts without writing")]
    Verify(VerifyArg),
    #[command(name = "setup", about = "Print shell completion")]
    Setup(SetupArg),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_is_consistent() { App::command().debug_assert(); }

    #[test]
    fn test_sync_alias_and_flags() {
        let app = App::try_parse_from(["aipsync", "-vv", "s", "--force", "--workers", "3"]).unwrap();
        assert_eq!(app.verbose, 2);
        assert_eq!(app.config, PathBuf::from("aipsync.toml"));
        match app.cmd {
            Commands::Sync(arg) => {
                assert!(arg.force);
                assert!(!arg.refetch);
                assert_eq!(arg.workers, Some(3));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_verify_requires_unit() {
        assert!(App::try_parse_from(["aipsync", "verify"]).is_err());
        let app = App::try_parse_from(["aipsync", "v", "RJTT"]).unwrap();
        assert!(matches!(app.cmd, Commands::Verify(arg) if arg.unit == "RJTT"));
    }
}
