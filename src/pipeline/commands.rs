//! The command registry.
//!
//! Commands are the explicitly named, explicitly invoked actions behind
//! the `@<botname> !<token>` syntax. The registry is built once at startup
//! and passed into the dispatcher; it is read-only thereafter.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::catalog::HELP_URL;
use crate::pipeline::Handler;
use crate::pipeline::types::Message;

/// How a command is invoked and what it is expected to return.
#[derive(Debug, Clone)]
pub enum Invocation {
    /// Side-effecting handler; nothing is posted.
    NoReply,
    /// Handler receives the message and returns the reply text.
    Reply,
    /// Handler receives the message plus a bound context value declared
    /// at registration (usually a resource URL).
    ReplyWithContext(String),
}

/// A registered command. Immutable after registration.
pub struct Command {
    pub name: String,
    pub usage: String,
    pub summary: String,
    pub how: String,
    pub invocation: Invocation,
    /// An empty result from this command is expected, not an anomaly.
    pub silent_ok: bool,
    handler: Handler,
}

impl Command {
    pub fn new(
        name: impl Into<String>,
        usage: impl Into<String>,
        summary: impl Into<String>,
        how: impl Into<String>,
        invocation: Invocation,
        handler: Handler,
    ) -> Self {
        Self {
            name: name.into(),
            usage: usage.into(),
            summary: summary.into(),
            how: how.into(),
            invocation,
            silent_ok: false,
            handler,
        }
    }

    /// Mark an empty result as expected (no anomaly diagnostic).
    pub fn silent_ok(mut self) -> Self {
        self.silent_ok = true;
        self
    }

    /// Invoke the command per its declared invocation kind.
    ///
    /// `NoReply` commands run for their side effect and never produce a
    /// reply, whatever the handler returns.
    pub async fn run(&self, msg: &Message) -> Option<String> {
        debug!(command = %self.name, id = msg.id, "running command");
        match &self.invocation {
            Invocation::NoReply => {
                (self.handler)(msg.clone(), None).await;
                None
            }
            Invocation::Reply => (self.handler)(msg.clone(), None).await,
            Invocation::ReplyWithContext(ctx) => {
                (self.handler)(msg.clone(), Some(ctx.clone())).await
            }
        }
    }

    /// One-line help text: `!name usage - summary`.
    pub fn help_line(&self) -> String {
        format!("!{} {} - {}", self.name, self.usage, self.summary)
    }
}

/// Name → command mapping, created once at process start.
pub struct CommandRegistry {
    commands: HashMap<String, Command>,
}

impl CommandRegistry {
    pub fn new(commands: Vec<Command>) -> Self {
        Self {
            commands: commands
                .into_iter()
                .map(|c| (c.name.clone(), c))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// The canonical reply for an unknown command token.
pub fn no_such_command(token: &str) -> String {
    format!("No such command: {token}. Try !help or see: {HELP_URL}")
}

/// Immutable help/how metadata snapshot, shared with the `!help` and
/// `!how` handlers so they can describe the registry they live in.
#[derive(Debug, Default)]
pub struct HelpIndex {
    entries: BTreeMap<String, HelpEntry>,
}

#[derive(Debug)]
struct HelpEntry {
    line: String,
    how: String,
}

impl HelpIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, usage: &str, summary: &str, how: &str) {
        self.entries.insert(
            name.to_string(),
            HelpEntry {
                line: format!("!{name} {usage} - {summary}"),
                how: how.to_string(),
            },
        );
    }

    pub fn help_line(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|e| e.line.as_str())
    }

    pub fn how(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|e| e.how.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
