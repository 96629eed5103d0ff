//! The message classification and dispatch pipeline.
//!
//! A message flows through a fixed decision sequence: dedup, command match,
//! string triggers, function triggers, URL triggers, conversational
//! fallback. The first step that emits a reply wins; at most one outbound
//! post is produced per inbound message.

pub mod chatter;
pub mod commands;
pub mod dispatcher;
pub mod triggers;
pub mod types;

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::pipeline::types::Message;

/// A reply-producing capability bound to a command or trigger.
///
/// Invoked with the inbound message and an optional bound context value
/// (usually a resource URL). Returns the reply text, or `None` when the
/// capability has nothing to say — remote-fetch failures surface here as
/// `None`, never as an error that unwinds the pipeline.
pub type Handler =
    Arc<dyn Fn(Message, Option<String>) -> BoxFuture<'static, Option<String>> + Send + Sync>;

/// Wrap an async closure as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Message, Option<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<String>> + Send + 'static,
{
    Arc::new(move |msg, ctx| Box::pin(f(msg, ctx)))
}
