//! Follower reconciliation.
//!
//! The bot follows back everyone who follows it. Each run it pages the
//! remote follower list, diffs it against the baseline persisted in the
//! config file, unfollows the leavers, follows the joiners, and persists
//! the new baseline. Two safety thresholds abort the run before any action
//! is taken: the entire baseline vanishing at once, and a loss larger than
//! [`MAX_LOST`]. Both smell like a bad API response rather than a real mass
//! exodus, and acting on one would mass-unfollow real people.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ReconcileError, Result};
use crate::platform::MicroblogApi;
use crate::ratelimit;

/// Followers fetched per page.
pub const PAGE_SIZE: usize = 100;
/// Pages fetched before giving up on the listing as too large to trust.
pub const PAGE_CEILING: usize = 100;
/// Largest follower loss acted upon in a single run.
pub const MAX_LOST: usize = 25;

/// Page through the remote follower list.
///
/// Returns `None` when the listing is unreliable, because a page failed or
/// the account outgrew the page ceiling. An unreliable snapshot must not be
/// diffed; a partial list looks exactly like a mass exodus.
pub async fn fetch_snapshot(api: &dyn MicroblogApi) -> Option<BTreeSet<String>> {
    let mut followers = BTreeSet::new();
    for page in 0..PAGE_CEILING {
        let batch = match api.followers_page(page, PAGE_SIZE).await {
            Ok(batch) => batch,
            Err(e) => {
                ratelimit::handle(api, &e, "listing followers").await;
                return None;
            }
        };
        let short = batch.len() < PAGE_SIZE;
        debug!(page, count = batch.len(), "fetched follower page");
        followers.extend(batch);
        if short {
            return Some(followers);
        }
    }
    warn!(
        pages = PAGE_CEILING,
        collected = followers.len(),
        "follower listing exceeds page ceiling, treating as unreliable"
    );
    None
}

/// The actions a reconciliation run would take.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Plan {
    pub to_follow: Vec<String>,
    pub to_unfollow: Vec<String>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.to_follow.is_empty() && self.to_unfollow.is_empty()
    }
}

/// Diff the remote snapshot against the persisted baseline.
pub fn plan(baseline: &BTreeSet<String>, snapshot: &BTreeSet<String>) -> Plan {
    Plan {
        to_follow: snapshot.difference(baseline).cloned().collect(),
        to_unfollow: baseline.difference(snapshot).cloned().collect(),
    }
}

/// Refuse plans that would act on an implausible follower loss.
pub fn check_thresholds(plan: &Plan, baseline: &BTreeSet<String>) -> Result<()> {
    if !baseline.is_empty() && plan.to_unfollow.len() == baseline.len() {
        return Err(ReconcileError::AllFollowersGone {
            count: baseline.len(),
        }
        .into());
    }
    if plan.to_unfollow.len() > MAX_LOST {
        return Err(ReconcileError::SuspiciousLoss {
            lost: plan.to_unfollow.len(),
            max: MAX_LOST,
        }
        .into());
    }
    Ok(())
}

/// Drives one reconciliation pass per run.
pub struct Reconciler {
    api: Arc<dyn MicroblogApi>,
    /// In debug mode the baseline is never rewritten, so a later real run
    /// still sees the old baseline.
    debug: bool,
}

impl Reconciler {
    pub fn new(api: Arc<dyn MicroblogApi>, debug: bool) -> Self {
        Self { api, debug }
    }

    /// Fetch, diff, act, persist.
    ///
    /// An unreliable snapshot skips the pass entirely, pretending nothing
    /// changed. Threshold violations are fatal. Individual follow and
    /// unfollow failures are handled in place and do not stop the rest of
    /// the plan.
    pub async fn reconcile(&self, config: &mut Config) -> Result<()> {
        let Some(snapshot) = fetch_snapshot(self.api.as_ref()).await else {
            info!("follower snapshot unreliable, pretending nothing changed");
            return Ok(());
        };

        let plan = plan(&config.followers, &snapshot);
        if plan.is_empty() {
            debug!("followship unchanged");
            return Ok(());
        }
        check_thresholds(&plan, &config.followers)?;

        info!(
            joining = plan.to_follow.len(),
            leaving = plan.to_unfollow.len(),
            "reconciling followship"
        );
        for user in &plan.to_unfollow {
            info!(user = %user, "unfollowing");
            if let Err(e) = self.api.unfollow(user).await {
                ratelimit::handle(self.api.as_ref(), &e, "unfollowing").await;
            }
        }
        for user in &plan.to_follow {
            info!(user = %user, "following");
            if let Err(e) = self.api.follow(user).await {
                ratelimit::handle(self.api.as_ref(), &e, "following").await;
            }
        }

        if self.debug {
            info!("debug mode, not rewriting follower baseline");
            return Ok(());
        }
        config.update_followers(&snapshot)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::error::Error;
    use crate::platform::testing::RecordingApi;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn config_with_followers(dir: &tempfile::TempDir, followers: &str) -> Config {
        let path = dir.path().join("natter.conf");
        fs::write(
            &path,
            format!("<api>_key = k\n<api>_secret = s\nfollowers = {followers}\n"),
        )
        .unwrap();
        Config::load(&path).unwrap()
    }

    #[tokio::test]
    async fn snapshot_collects_across_pages() {
        let mut api = RecordingApi::default();
        let full: Vec<String> = (0..PAGE_SIZE).map(|i| format!("user{i:03}")).collect();
        api.follower_pages = vec![full.clone(), vec!["zed".to_string()]];
        let snapshot = fetch_snapshot(&api).await.unwrap();
        assert_eq!(snapshot.len(), PAGE_SIZE + 1);
        assert!(snapshot.contains("zed"));
    }

    #[tokio::test]
    async fn failed_page_marks_snapshot_unreliable() {
        let mut api = RecordingApi::default();
        api.follower_pages = vec![(0..PAGE_SIZE).map(|i| format!("user{i:03}")).collect()];
        api.fail_followers_at_page = Some(1);
        assert!(fetch_snapshot(&api).await.is_none());
    }

    #[test]
    fn plan_diffs_both_ways() {
        let p = plan(&names(&["alice", "bob"]), &names(&["bob", "carol"]));
        assert_eq!(p.to_follow, vec!["carol"]);
        assert_eq!(p.to_unfollow, vec!["alice"]);
    }

    #[test]
    fn losing_every_follower_is_fatal() {
        let baseline = names(&["alice", "bob", "carol"]);
        let p = plan(&baseline, &BTreeSet::new());
        assert!(matches!(
            check_thresholds(&p, &baseline),
            Err(Error::Reconcile(ReconcileError::AllFollowersGone { count: 3 }))
        ));
    }

    #[test]
    fn empty_baseline_accepts_first_followers() {
        let baseline = BTreeSet::new();
        let p = plan(&baseline, &names(&["alice"]));
        assert!(check_thresholds(&p, &baseline).is_ok());
    }

    #[test]
    fn large_loss_is_fatal() {
        let baseline: BTreeSet<String> = (0..40).map(|i| format!("user{i:02}")).collect();
        let kept: BTreeSet<String> = (0..14).map(|i| format!("user{i:02}")).collect();
        let p = plan(&baseline, &kept);
        assert_eq!(p.to_unfollow.len(), 26);
        assert!(matches!(
            check_thresholds(&p, &baseline),
            Err(Error::Reconcile(ReconcileError::SuspiciousLoss { lost: 26, max: MAX_LOST }))
        ));
    }

    #[test]
    fn loss_at_the_threshold_is_accepted() {
        let baseline: BTreeSet<String> = (0..40).map(|i| format!("user{i:02}")).collect();
        let kept: BTreeSet<String> = (0..15).map(|i| format!("user{i:02}")).collect();
        let p = plan(&baseline, &kept);
        assert_eq!(p.to_unfollow.len(), MAX_LOST);
        assert!(check_thresholds(&p, &baseline).is_ok());
    }

    #[tokio::test]
    async fn reconcile_acts_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_followers(&dir, "alice,bob");
        let mut api = RecordingApi::default();
        api.follower_pages = vec![vec!["bob".to_string(), "carol".to_string()]];
        let api = Arc::new(api);

        Reconciler::new(api.clone(), false)
            .reconcile(&mut config)
            .await
            .unwrap();

        assert_eq!(api.actions(), vec!["unfollow:alice", "follow:carol"]);
        assert_eq!(config.followers, names(&["bob", "carol"]));
        let body = fs::read_to_string(config.path()).unwrap();
        assert!(body.contains("followers = bob,carol"));
    }

    #[tokio::test]
    async fn unchanged_followship_rewrites_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_followers(&dir, "alice,bob");
        let before = fs::metadata(config.path()).unwrap().modified().unwrap();
        let mut api = RecordingApi::default();
        api.follower_pages = vec![vec!["alice".to_string(), "bob".to_string()]];
        let api = Arc::new(api);

        Reconciler::new(api.clone(), false)
            .reconcile(&mut config)
            .await
            .unwrap();

        assert!(api.actions().is_empty());
        let after = fs::metadata(config.path()).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn debug_mode_skips_baseline_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_followers(&dir, "alice");
        let mut api = RecordingApi::default();
        api.follower_pages = vec![vec!["alice".to_string(), "bob".to_string()]];
        let api = Arc::new(api);

        Reconciler::new(api.clone(), true)
            .reconcile(&mut config)
            .await
            .unwrap();

        // The action still goes through the API (a DryRunApi wrapper keeps
        // it from reaching the network), but the baseline stays put.
        assert_eq!(api.actions(), vec!["follow:bob"]);
        let body = fs::read_to_string(config.path()).unwrap();
        assert!(body.contains("followers = alice\n"));
    }

    #[tokio::test]
    async fn fatal_threshold_takes_no_action() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_followers(&dir, "alice,bob,carol");
        let mut api = RecordingApi::default();
        api.follower_pages = vec![vec![]];
        let api = Arc::new(api);

        let err = Reconciler::new(api.clone(), false)
            .reconcile(&mut config)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Reconcile(ReconcileError::AllFollowersGone { .. })
        ));
        assert!(api.actions().is_empty());
        assert!(fs::read_to_string(config.path())
            .unwrap()
            .contains("followers = alice,bob,carol"));
    }
}
