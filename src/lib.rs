//! natter — an automated microblog responder.
//!
//! One process per scheduled invocation: acquire the single-instance lock,
//! reconcile the follower set, answer the mention and home-timeline feeds
//! (at most one reply per message), run any pending daily chores, then
//! persist the high-water message id and exit.

pub mod bot;
pub mod catalog;
pub mod chores;
pub mod cli;
pub mod config;
pub mod error;
pub mod followers;
pub mod outbound;
pub mod pipeline;
pub mod platform;
pub mod ratelimit;
pub mod state;

/// Default identity the bot runs as.
pub const BOTNAME: &str = "natter";
