//! Collaborator ports — the microblog API and the page fetcher.
//!
//! Adapters are pure I/O; classification, gating, and reconciliation logic
//! live in the pipeline, chores, and followers modules. Everything a
//! handler or chore needs from the network arrives through these traits.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::pipeline::types::Message;

/// Failures reported by the remote platform.
///
/// The named variants mirror the platform's documented response codes so
/// the classifier in [`crate::ratelimit`] can map each to a policy.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("rate limited (400)")]
    RateLimited,

    #[error("search rate limited (420)")]
    SearchRateLimited,

    #[error("service broken (500)")]
    Broken,

    #[error("service down (502)")]
    Down,

    #[error("service overloaded (503)")]
    Overloaded,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),
}

impl ApiError {
    /// Map a platform HTTP status code to an error variant.
    pub fn from_status(code: u16) -> Self {
        match code {
            400 => Self::RateLimited,
            420 => Self::SearchRateLimited,
            500 => Self::Broken,
            502 => Self::Down,
            503 => Self::Overloaded,
            other => Self::Status(other),
        }
    }

    /// True for the rate-limit class of failures, which warrant a
    /// follow-up allowance query before deciding how to proceed.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited | Self::SearchRateLimited)
    }
}

/// Remaining-call allowance as reported by the platform.
///
/// Fetched per failure, never cached across calls.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitStatus {
    /// Calls left in the current window.
    pub remaining_hits: u32,
    /// UNIX timestamp at which the window resets.
    pub reset_time_in_seconds: i64,
}

impl RateLimitStatus {
    /// Parse the platform's JSON status payload.
    pub fn from_json(body: &str) -> Result<Self, ApiError> {
        serde_json::from_str(body).map_err(|e| ApiError::Network(e.to_string()))
    }
}

/// The microblog platform seam.
///
/// Both feeds are monotonic-id-ordered. `post_update` expects text already
/// truncated to the platform ceiling (the [`crate::outbound::Courier`]
/// takes care of that).
#[async_trait]
pub trait MicroblogApi: Send + Sync {
    /// Mentions of the bot newer than `since_id`.
    async fn mentions_since(&self, since_id: u64) -> Result<Vec<Message>, ApiError>;

    /// Home-timeline posts newer than `since_id`.
    async fn timeline_since(&self, since_id: u64) -> Result<Vec<Message>, ApiError>;

    /// Post a status, optionally in reply to another message.
    async fn post_update(&self, text: &str, in_reply_to: Option<u64>) -> Result<(), ApiError>;

    async fn follow(&self, user: &str) -> Result<(), ApiError>;

    async fn unfollow(&self, user: &str) -> Result<(), ApiError>;

    /// One page of the bot's followers. Pages are zero-indexed; a page
    /// shorter than `per_page` is the last one.
    async fn followers_page(&self, page: usize, per_page: usize)
    -> Result<Vec<String>, ApiError>;

    /// Current rate-limit allowance.
    async fn rate_limit_status(&self) -> Result<RateLimitStatus, ApiError>;

    /// Id of the bot's own most recent post, if it has any.
    async fn own_last_status_id(&self) -> Result<Option<u64>, ApiError>;
}

/// Plain page fetcher for URL-backed commands, triggers, and chores.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a remote resource as text.
    async fn fetch(&self, url: &str) -> Result<String, ApiError>;
}

/// Debug-mode wrapper: reads pass through, mutations are logged as
/// intended actions instead of being performed.
pub struct DryRunApi {
    inner: Arc<dyn MicroblogApi>,
}

impl DryRunApi {
    pub fn new(inner: Arc<dyn MicroblogApi>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl MicroblogApi for DryRunApi {
    async fn mentions_since(&self, since_id: u64) -> Result<Vec<Message>, ApiError> {
        self.inner.mentions_since(since_id).await
    }

    async fn timeline_since(&self, since_id: u64) -> Result<Vec<Message>, ApiError> {
        self.inner.timeline_since(since_id).await
    }

    async fn post_update(&self, text: &str, in_reply_to: Option<u64>) -> Result<(), ApiError> {
        info!(in_reply_to, text, "dry-run: would post");
        Ok(())
    }

    async fn follow(&self, user: &str) -> Result<(), ApiError> {
        info!(user, "dry-run: would follow");
        Ok(())
    }

    async fn unfollow(&self, user: &str) -> Result<(), ApiError> {
        info!(user, "dry-run: would unfollow");
        Ok(())
    }

    async fn followers_page(
        &self,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<String>, ApiError> {
        self.inner.followers_page(page, per_page).await
    }

    async fn rate_limit_status(&self) -> Result<RateLimitStatus, ApiError> {
        self.inner.rate_limit_status().await
    }

    async fn own_last_status_id(&self) -> Result<Option<u64>, ApiError> {
        self.inner.own_last_status_id().await
    }
}
