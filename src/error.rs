//! Error types for natter.
//!
//! Remote failures are handled (logged, possibly slept on) where they occur
//! and never unwind the dispatch pipeline. Only the variants below reach
//! `main`, and all of them abort the run with a non-zero exit.

use std::path::PathBuf;

use crate::platform::ApiError;

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

/// Configuration-file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unable to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to rewrite config file {path}: {source}")]
    Rewrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No API credentials found in {path}")]
    MissingApiCredentials { path: PathBuf },

    #[error("No access credentials for user {user} found in {path}")]
    MissingUserCredentials { user: String, path: PathBuf },
}

/// Persisted-state errors. All of these are resource failures and fatal.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Another instance holds the lock on {path}")]
    Locked { path: PathBuf },

    #[error("Unable to access state file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Safety-threshold violations during follower reconciliation.
///
/// These abort the run before any follow/unfollow action is taken and
/// before the baseline is rewritten.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("All {count} known followers gone from the remote snapshot")]
    AllFollowersGone { count: usize },

    #[error("Suspiciously large follower loss: {lost} > {max}")]
    SuspiciousLoss { lost: usize, max: usize },
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
