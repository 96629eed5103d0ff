//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::BOTNAME;

#[derive(Debug, Parser)]
#[command(name = "natter", version, about = "An automated microblog responder.")]
pub struct Args {
    /// Debug mode: process everything, post nothing, persist nothing.
    #[arg(short, long)]
    pub debug: bool,

    /// Account to run as.
    #[arg(short, long, default_value = BOTNAME)]
    pub user: String,

    /// Increase verbosity (repeatable).
    #[arg(short, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Config file (defaults to <state dir>/natter.conf).
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Default log level for the verbosity count. `RUST_LOG` wins when set.
    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "natter=info",
            2 => "natter=debug",
            _ => "natter=trace",
        }
    }

    /// Where marker, chore stamps, and the default config live.
    pub fn state_dir(&self) -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(format!(".{BOTNAME}"))
    }

    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| self.state_dir().join("natter.conf"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::parse_from(["natter"]);
        assert!(!args.debug);
        assert_eq!(args.user, "natter");
        assert_eq!(args.verbose, 0);
        assert_eq!(args.log_directive(), "warn");
    }

    #[test]
    fn verbosity_stacks() {
        let args = Args::parse_from(["natter", "-vvv", "-d", "-u", "chatterbox"]);
        assert!(args.debug);
        assert_eq!(args.user, "chatterbox");
        assert_eq!(args.log_directive(), "natter=trace");
    }

    #[test]
    fn explicit_config_path_wins() {
        let args = Args::parse_from(["natter", "-c", "/tmp/other.conf"]);
        assert_eq!(args.config_path(), PathBuf::from("/tmp/other.conf"));
    }
}
