//! The per-message decision sequence.
//!
//! Steps, strictly ordered, short-circuiting on first emission:
//! dedup → command match → string triggers → function triggers →
//! URL triggers → conversational fallback. At most one outbound post per
//! inbound message; the dedup mark is written before any processing so
//! re-delivery across feeds cannot produce a second reply.

use regex::Regex;
use tracing::{debug, trace, warn};

use crate::outbound::Courier;
use crate::pipeline::chatter::Chatter;
use crate::pipeline::commands::{CommandRegistry, no_such_command};
use crate::pipeline::triggers::TriggerSet;
use crate::pipeline::types::{Message, SeenSet};

/// Routes one message at a time through the classification sequence.
pub struct Dispatcher {
    command_pattern: Regex,
    commands: CommandRegistry,
    triggers: TriggerSet,
    chatter: Chatter,
    seen: SeenSet,
}

impl Dispatcher {
    pub fn new(
        botname: &str,
        commands: CommandRegistry,
        triggers: TriggerSet,
        chatter: Chatter,
    ) -> Self {
        let command_pattern = Regex::new(&format!(r"@{}\s+!(\S+)", regex::escape(botname)))
            .expect("command pattern");
        Self {
            command_pattern,
            commands,
            triggers,
            chatter,
            seen: SeenSet::new(),
        }
    }

    /// Highest message id processed this run.
    pub fn max_seen(&self) -> Option<u64> {
        self.seen.max_id()
    }

    /// Process a single message. Returns `true` iff a reply was emitted
    /// or the message had already been handled.
    pub async fn process_message(&mut self, msg: &Message, courier: &Courier) -> bool {
        if !self.seen.mark(msg.id) {
            trace!(id = msg.id, sender = %msg.sender, "already seen, skipping");
            return true;
        }

        debug!(id = msg.id, sender = %msg.sender, "processing message");

        if let Some(handled) = self.try_command(msg, courier).await {
            return handled;
        }

        if self.try_string_trigger(msg, courier).await {
            return true;
        }

        if self.try_func_trigger(msg, courier).await {
            return true;
        }

        if self.try_url_trigger(msg, courier).await {
            return true;
        }

        let reply = self.chatter.respond(msg);
        courier.reply(&msg.sender, &reply, Some(msg.id)).await;
        true
    }

    /// Step 2: explicit `@botname !token` command syntax.
    ///
    /// Returns `Some(true)` when the command syntax was present — a
    /// command match always ends the sequence, even when the handler
    /// produced nothing.
    async fn try_command(&self, msg: &Message, courier: &Courier) -> Option<bool> {
        let caps = self.command_pattern.captures(&msg.text)?;
        let token = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

        let reply = match self.commands.get(token) {
            Some(cmd) => match cmd.run(msg).await {
                Some(text) if !text.is_empty() => Some(text),
                _ => {
                    if !cmd.silent_ok {
                        warn!(command = token, id = msg.id, "command produced no reply");
                    }
                    None
                }
            },
            None => {
                debug!(token, id = msg.id, "unknown command");
                Some(no_such_command(token))
            }
        };

        if let Some(text) = reply {
            courier.reply(&msg.sender, &text, Some(msg.id)).await;
        }
        Some(true)
    }

    /// Step 3: literal/listed triggers.
    async fn try_string_trigger(&self, msg: &Message, courier: &Courier) -> bool {
        let Some(hit) = self.triggers.first_string(&msg.text) else {
            return false;
        };
        let reply = hit.response.pick().to_string();
        courier.reply(&msg.sender, &reply, Some(msg.id)).await;
        true
    }

    /// Step 4: function triggers. A matching trigger whose handler comes
    /// back empty falls through to the next kind rather than ending the
    /// sequence.
    async fn try_func_trigger(&self, msg: &Message, courier: &Courier) -> bool {
        let Some(hit) = self.triggers.first_func(&msg.text) else {
            return false;
        };
        match (hit.handler)(msg.clone(), None).await {
            Some(text) if !text.is_empty() => {
                courier.reply(&msg.sender, &text, Some(msg.id)).await;
                true
            }
            _ => {
                warn!(id = msg.id, "function trigger matched but produced nothing");
                false
            }
        }
    }

    /// Step 5: URL triggers, same semantics with the bound context.
    async fn try_url_trigger(&self, msg: &Message, courier: &Courier) -> bool {
        let Some(hit) = self.triggers.first_url(&msg.text) else {
            return false;
        };
        match (hit.handler)(msg.clone(), Some(hit.context.clone())).await {
            Some(text) if !text.is_empty() => {
                courier.reply(&msg.sender, &text, Some(msg.id)).await;
                true
            }
            _ => {
                warn!(id = msg.id, "URL trigger matched but produced nothing");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use regex::Regex;

    use super::*;
    use crate::pipeline::commands::{Command, Invocation};
    use crate::pipeline::handler;
    use crate::pipeline::triggers::{FuncTrigger, StringResponse, StringTrigger, UrlTrigger};
    use crate::platform::testing::RecordingApi;

    fn chatter() -> Chatter {
        Chatter::new(
            vec![Regex::new(r"(?i)you stink").unwrap()],
            vec!["I know you are, but what am I?".to_string()],
            vec![],
            vec!["What does that suggest to you?".to_string()],
        )
    }

    fn dispatcher(commands: Vec<Command>, triggers: TriggerSet) -> Dispatcher {
        Dispatcher::new("natter", CommandRegistry::new(commands), triggers, chatter())
    }

    fn courier(api: &Arc<RecordingApi>) -> Courier {
        Courier::new(api.clone() as Arc<dyn crate::platform::MicroblogApi>)
    }

    fn msg(id: u64, text: &str) -> Message {
        Message::new(id, "alice", text)
    }

    #[tokio::test]
    async fn duplicate_id_answered_once() {
        let api = Arc::new(RecordingApi::default());
        let c = courier(&api);
        let mut d = dispatcher(vec![], TriggerSet::default());
        let m = msg(10, "anything at all");
        assert!(d.process_message(&m, &c).await);
        assert!(d.process_message(&m, &c).await);
        assert_eq!(api.posts().len(), 1);
    }

    #[tokio::test]
    async fn unknown_command_yields_canonical_reply() {
        let api = Arc::new(RecordingApi::default());
        let c = courier(&api);
        let mut d = dispatcher(vec![], TriggerSet::default());
        d.process_message(&msg(1, "hey @natter !bogus now"), &c).await;
        let posts = api.posts();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].0.contains("No such command: bogus"));
        assert!(posts[0].0.starts_with("@alice "));
        assert_eq!(posts[0].1, Some(1));
    }

    #[tokio::test]
    async fn known_command_replies_and_short_circuits_triggers() {
        let api = Arc::new(RecordingApi::default());
        let c = courier(&api);
        let cmd = Command::new(
            "new",
            "",
            "show what's new",
            "hardcoded",
            Invocation::Reply,
            handler(|_, _| async { Some("Fresh paint.".to_string()) }),
        );
        let triggers = TriggerSet::new(
            vec![StringTrigger {
                pattern: Regex::new("new").unwrap(),
                response: StringResponse::Say("trigger must not fire".to_string()),
            }],
            vec![],
            vec![],
        );
        let mut d = dispatcher(vec![cmd], triggers);
        d.process_message(&msg(2, "@natter !new"), &c).await;
        let posts = api.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "@alice Fresh paint.");
    }

    #[tokio::test]
    async fn silent_command_posts_nothing_but_is_handled() {
        let api = Arc::new(RecordingApi::default());
        let c = courier(&api);
        let cmd = Command::new(
            "ping",
            "",
            "",
            "",
            Invocation::NoReply,
            handler(|_, _| async { None }),
        )
        .silent_ok();
        let mut d = dispatcher(vec![cmd], TriggerSet::default());
        assert!(d.process_message(&msg(3, "@natter !ping"), &c).await);
        assert!(api.posts().is_empty());
    }

    #[tokio::test]
    async fn string_trigger_beats_function_trigger() {
        let api = Arc::new(RecordingApi::default());
        let c = courier(&api);
        let triggers = TriggerSet::new(
            vec![StringTrigger {
                pattern: Regex::new("pirate").unwrap(),
                response: StringResponse::Say("Arrr!".to_string()),
            }],
            vec![FuncTrigger {
                pattern: Regex::new("pirate").unwrap(),
                handler: handler(|_, _| async { Some("from the function".to_string()) }),
            }],
            vec![],
        );
        let mut d = dispatcher(vec![], triggers);
        d.process_message(&msg(4, "pirate talk"), &c).await;
        assert_eq!(api.posts()[0].0, "@alice Arrr!");
    }

    #[tokio::test]
    async fn empty_function_result_falls_through_to_url_trigger() {
        let api = Arc::new(RecordingApi::default());
        let c = courier(&api);
        let triggers = TriggerSet::new(
            vec![],
            vec![FuncTrigger {
                pattern: Regex::new("duck").unwrap(),
                handler: handler(|_, _| async { None }),
            }],
            vec![UrlTrigger {
                pattern: Regex::new("duck").unwrap(),
                handler: handler(|_, ctx| async move { ctx }),
                context: "Quack.".to_string(),
            }],
        );
        let mut d = dispatcher(vec![], triggers);
        d.process_message(&msg(5, "a duck walked by"), &c).await;
        assert_eq!(api.posts()[0].0, "@alice Quack.");
    }

    #[tokio::test]
    async fn handler_reply_with_mention_is_not_reprefixed() {
        let api = Arc::new(RecordingApi::default());
        let c = courier(&api);
        let triggers = TriggerSet::new(
            vec![],
            vec![FuncTrigger {
                pattern: Regex::new("brick").unwrap(),
                handler: handler(|_, _| async { Some("@bob consider yourself bricked".to_string()) }),
            }],
            vec![],
        );
        let mut d = dispatcher(vec![], triggers);
        d.process_message(&msg(6, "brick bob"), &c).await;
        assert_eq!(api.posts()[0].0, "@bob consider yourself bricked");
    }

    #[tokio::test]
    async fn fallback_insult_and_misc() {
        let api = Arc::new(RecordingApi::default());
        let c = courier(&api);
        let mut d = dispatcher(vec![], TriggerSet::default());
        d.process_message(&msg(7, "you stink"), &c).await;
        d.process_message(&msg(8, "zxqj"), &c).await;
        let posts = api.posts();
        assert!(posts[0].0.contains("I know you are"));
        assert!(posts[1].0.contains("What does that suggest to you?"));
        // Every fallback reply addresses the sender.
        assert!(posts.iter().all(|(t, _)| t.starts_with("@alice ")));
    }
}
