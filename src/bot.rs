//! One full run of the bot, start to finish.
//!
//! The bot is a run-to-completion process, not a daemon: acquire the
//! marker lock, catch up on both feeds since the last run, do the pending
//! chores, record how far we got, exit. Scheduling recurrence is cron's
//! job.

use std::sync::Arc;

use chrono::Local;
use tracing::{info, warn};

use crate::chores::ChoreSet;
use crate::config::Config;
use crate::error::Result;
use crate::followers::Reconciler;
use crate::outbound::Courier;
use crate::pipeline::dispatcher::Dispatcher;
use crate::platform::MicroblogApi;
use crate::ratelimit;
use crate::state::{ChoreLedger, MessageMarker};

pub struct Bot {
    api: Arc<dyn MicroblogApi>,
    user: String,
    dispatcher: Dispatcher,
    chores: ChoreSet,
    reconciler: Reconciler,
    config: Config,
    marker: MessageMarker,
    ledger: ChoreLedger,
    debug: bool,
}

impl Bot {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn MicroblogApi>,
        user: impl Into<String>,
        dispatcher: Dispatcher,
        chores: ChoreSet,
        reconciler: Reconciler,
        config: Config,
        marker: MessageMarker,
        ledger: ChoreLedger,
        debug: bool,
    ) -> Self {
        Self {
            api,
            user: user.into(),
            dispatcher,
            chores,
            reconciler,
            config,
            marker,
            ledger,
            debug,
        }
    }

    /// Run once: reconcile followship, answer both feeds, do chores,
    /// advance the marker.
    pub async fn run(mut self) -> Result<()> {
        let mut since = self.marker.last_id()?.unwrap_or(0);
        info!(since, "starting run");

        // The bot's own last post also bounds "already handled": anything
        // older than our last utterance was either answered or deliberately
        // skipped by a previous run whose marker write we may have lost.
        match self.api.own_last_status_id().await {
            Ok(Some(own)) if own > since => {
                info!(own, "own last post is newer than the marker, advancing");
                since = own;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "unable to determine own last post, using marker as is");
                ratelimit::handle(self.api.as_ref(), &e, "probing own timeline").await;
            }
        }

        self.reconciler.reconcile(&mut self.config).await?;

        let courier = Courier::new(self.api.clone());

        match self.api.mentions_since(since).await {
            Ok(messages) => {
                info!(count = messages.len(), "processing mentions");
                for msg in &messages {
                    if msg.sender == self.user {
                        continue;
                    }
                    self.dispatcher.process_message(msg, &courier).await;
                }
            }
            Err(e) => ratelimit::handle(self.api.as_ref(), &e, "fetching mentions").await,
        }

        match self.api.timeline_since(since).await {
            Ok(messages) => {
                info!(count = messages.len(), "processing timeline");
                for msg in &messages {
                    // The home timeline includes our own posts.
                    if msg.sender == self.user {
                        continue;
                    }
                    self.dispatcher.process_message(msg, &courier).await;
                }
            }
            Err(e) => ratelimit::handle(self.api.as_ref(), &e, "fetching timeline").await,
        }

        self.chores
            .run_pending(Local::now(), &self.ledger, &courier)
            .await;

        let high_water = self.dispatcher.max_seen().unwrap_or(since).max(since);
        if self.debug {
            info!(high_water, "debug mode, not advancing the message marker");
            return Ok(());
        }
        // A lost marker write means replaying every message next run, so
        // this failure is fatal rather than logged.
        self.marker.record(high_water)?;
        info!(high_water, "run complete");
        Ok(())
    }
}
