//! Rate-limit and remote-error policy.
//!
//! Every failed platform call funnels through [`handle`], which asks the
//! platform for the current allowance and then either sleeps the run until
//! the window resets or just logs and moves on. Classification itself is a
//! pure function so the policy table is testable without a clock or a
//! network.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::platform::{ApiError, MicroblogApi, RateLimitStatus};

/// What to do about a failed platform call.
#[derive(Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Sleep this long, then carry on.
    Sleep(Duration),
    /// Log and carry on immediately.
    Log,
}

/// Decide the policy for `err` given the platform's reported allowance.
///
/// Only the rate-limit class ever sleeps, and only when the allowance is
/// actually exhausted. A rate-limit error with calls remaining is a race
/// against the window reset, not a real throttle, and is ignored. A reset
/// time in the past likewise means the window already rolled over.
pub fn classify(err: &ApiError, status: Option<&RateLimitStatus>, now_epoch: i64) -> Disposition {
    if !err.is_rate_limit() {
        return Disposition::Log;
    }
    let Some(status) = status else {
        return Disposition::Log;
    };
    if status.remaining_hits > 0 {
        debug!(
            remaining = status.remaining_hits,
            "rate-limit error with calls remaining, treating as false alarm"
        );
        return Disposition::Log;
    }
    let diff = status.reset_time_in_seconds - now_epoch;
    if diff > 0 {
        Disposition::Sleep(Duration::from_secs(diff as u64))
    } else {
        Disposition::Log
    }
}

/// Log a failed call and sleep out the rate-limit window if there is one.
///
/// The allowance probe itself can fail; when it does we move on without
/// even reporting the original error. Sleeping an unknown amount of time
/// on a second-order failure would be worse than dropping one diagnostic.
pub async fn handle(api: &dyn MicroblogApi, err: &ApiError, context: &str) {
    let status = match api.rate_limit_status().await {
        Ok(status) => Some(status),
        Err(probe_err) => {
            debug!(error = %probe_err, "allowance probe failed, moving on");
            return;
        }
    };

    let now = chrono::Utc::now().timestamp();
    match classify(err, status.as_ref(), now) {
        Disposition::Sleep(dur) => {
            warn!(context, error = %err, sleep_secs = dur.as_secs(), "rate limited, backing off");
            tokio::time::sleep(dur).await;
        }
        Disposition::Log => {
            info!(context, error = %err, "remote call failed");
        }
    }
}
