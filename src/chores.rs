//! Periodic chores: unprompted posts made at most once per cadence window.
//!
//! A chore is a named producer of optional text. On every run the set is
//! scanned in order; a chore runs when its cadence admits today and its
//! ledger stamp is older than a day (or missing). The stamp is refreshed
//! after every attempt, successful or not, so a chore that produced nothing
//! still waits out its window instead of retrying on every run.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Local, Weekday};
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::outbound::Courier;
use crate::state::ChoreLedger;

/// A chore is re-attempted once its stamp is older than this many seconds.
pub const CHORE_WINDOW_SECS: u64 = 86_400;

/// Capability producing a chore's post text. `None` means nothing to post
/// this time around.
pub type Producer = Arc<dyn Fn() -> BoxFuture<'static, Option<String>> + Send + Sync>;

/// Wrap a plain async closure as a [`Producer`].
pub fn producer<F, Fut>(f: F) -> Producer
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<String>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// How often a chore is eligible to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Every day.
    Daily,
    /// Monday through Friday only.
    Weekday,
}

impl Cadence {
    pub fn admits(&self, day: Weekday) -> bool {
        match self {
            Cadence::Daily => true,
            Cadence::Weekday => !matches!(day, Weekday::Sat | Weekday::Sun),
        }
    }
}

pub struct ChoreDef {
    pub name: String,
    pub cadence: Cadence,
    producer: Producer,
}

impl ChoreDef {
    pub fn new(name: impl Into<String>, cadence: Cadence, producer: Producer) -> Self {
        Self {
            name: name.into(),
            cadence,
            producer,
        }
    }
}

/// The ordered list of configured chores.
pub struct ChoreSet {
    chores: Vec<ChoreDef>,
}

impl ChoreSet {
    pub fn new(chores: Vec<ChoreDef>) -> Self {
        Self { chores }
    }

    pub fn len(&self) -> usize {
        self.chores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chores.is_empty()
    }

    /// Attempt every chore whose cadence admits `now` and whose window has
    /// elapsed. Producer output, if any, is posted as a standalone update.
    pub async fn run_pending(&self, now: DateTime<Local>, ledger: &ChoreLedger, courier: &Courier) {
        for chore in &self.chores {
            if !chore.cadence.admits(now.weekday()) {
                debug!(chore = %chore.name, "cadence does not admit today, skipping");
                continue;
            }
            match ledger.elapsed_secs(&chore.name) {
                Some(elapsed) if elapsed <= CHORE_WINDOW_SECS => {
                    debug!(chore = %chore.name, elapsed, "chore not yet pending");
                    continue;
                }
                Some(elapsed) => {
                    debug!(chore = %chore.name, elapsed, "chore window elapsed");
                }
                None => {
                    debug!(chore = %chore.name, "chore has never run");
                }
            }

            match (chore.producer)().await {
                Some(text) if !text.is_empty() => {
                    info!(chore = %chore.name, "posting chore result");
                    courier.post(&text).await;
                }
                _ => {
                    warn!(chore = %chore.name, "chore produced nothing to post");
                }
            }

            // Stamp even when nothing was posted. A failing source gets one
            // attempt per window, not one per run.
            if let Err(e) = ledger.stamp(&chore.name) {
                warn!(chore = %chore.name, error = %e, "unable to stamp chore");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;

    use super::*;
    use crate::platform::MicroblogApi;
    use crate::platform::testing::RecordingApi;

    fn courier(api: &Arc<RecordingApi>) -> Courier {
        Courier::new(api.clone() as Arc<dyn MicroblogApi>)
    }

    fn monday() -> DateTime<Local> {
        // 2026-08-24 was a Monday.
        Local.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap()
    }

    fn saturday() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 22, 12, 0, 0).unwrap()
    }

    #[test]
    fn weekday_cadence_excludes_weekends() {
        assert!(Cadence::Weekday.admits(Weekday::Mon));
        assert!(Cadence::Weekday.admits(Weekday::Fri));
        assert!(!Cadence::Weekday.admits(Weekday::Sat));
        assert!(!Cadence::Weekday.admits(Weekday::Sun));
        assert!(Cadence::Daily.admits(Weekday::Sun));
    }

    #[tokio::test]
    async fn never_run_chore_posts_and_stamps() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ChoreLedger::new(dir.path());
        let api = Arc::new(RecordingApi::default());
        let set = ChoreSet::new(vec![ChoreDef::new(
            "wikipedia",
            Cadence::Daily,
            producer(|| async { Some("An article of the day.".to_string()) }),
        )]);
        set.run_pending(monday(), &ledger, &courier(&api)).await;
        assert_eq!(api.posts().len(), 1);
        assert_eq!(api.posts()[0].1, None, "chore posts are not replies");
        assert!(ledger.elapsed_secs("wikipedia").is_some());
    }

    #[tokio::test]
    async fn fresh_stamp_suppresses_second_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ChoreLedger::new(dir.path());
        let api = Arc::new(RecordingApi::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let set = ChoreSet::new(vec![ChoreDef::new(
            "wotd",
            Cadence::Daily,
            producer(move || {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Some("Word of the day.".to_string())
                }
            }),
        )]);
        let c = courier(&api);
        set.run_pending(monday(), &ledger, &c).await;
        set.run_pending(monday(), &ledger, &c).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.posts().len(), 1);
    }

    fn backdate(path: std::path::PathBuf, secs: u64) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(std::time::SystemTime::now() - std::time::Duration::from_secs(secs))
            .unwrap();
    }

    #[tokio::test]
    async fn elapsed_window_reopens_the_chore() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ChoreLedger::new(dir.path());
        let api = Arc::new(RecordingApi::default());
        let set = ChoreSet::new(vec![ChoreDef::new(
            "fortune",
            Cadence::Daily,
            producer(|| async { Some("A fortune.".to_string()) }),
        )]);
        let c = courier(&api);
        set.run_pending(monday(), &ledger, &c).await;
        assert_eq!(api.posts().len(), 1);

        // An hour-old stamp is still inside the window.
        backdate(dir.path().join("fortune"), 3_600);
        set.run_pending(monday(), &ledger, &c).await;
        assert_eq!(api.posts().len(), 1);

        // A day-old stamp is not.
        backdate(dir.path().join("fortune"), 90_000);
        set.run_pending(monday(), &ledger, &c).await;
        assert_eq!(api.posts().len(), 2);
    }

    #[tokio::test]
    async fn weekday_chore_skipped_on_saturday() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ChoreLedger::new(dir.path());
        let api = Arc::new(RecordingApi::default());
        let set = ChoreSet::new(vec![ChoreDef::new(
            "recipe",
            Cadence::Weekday,
            producer(|| async { Some("A recipe.".to_string()) }),
        )]);
        set.run_pending(saturday(), &ledger, &courier(&api)).await;
        assert!(api.posts().is_empty());
        assert_eq!(ledger.elapsed_secs("recipe"), None, "skipped chores are not stamped");
    }

    #[tokio::test]
    async fn empty_producer_still_stamps() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ChoreLedger::new(dir.path());
        let api = Arc::new(RecordingApi::default());
        let set = ChoreSet::new(vec![ChoreDef::new(
            "flaky",
            Cadence::Daily,
            producer(|| async { None }),
        )]);
        set.run_pending(monday(), &ledger, &courier(&api)).await;
        assert!(api.posts().is_empty());
        assert!(ledger.elapsed_secs("flaky").is_some());
    }
}
