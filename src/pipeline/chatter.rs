//! Conversational fallback.
//!
//! When nothing else matched, the bot still answers: insults are met with
//! an insult, recognized keywords get a line from the matching bucket,
//! and anything else draws from a generic miscellaneous pool. All tables
//! are explicit ordered sequences — first matching rule wins.

use rand::seq::SliceRandom;
use regex::Regex;

use crate::pipeline::types::Message;

/// A keyword→canned-responses rule.
pub struct ChatterRule {
    pub pattern: Regex,
    pub responses: Vec<String>,
}

/// Fallback responder. Always produces a reply.
pub struct Chatter {
    insult_patterns: Vec<Regex>,
    insults: Vec<String>,
    rules: Vec<ChatterRule>,
    misc: Vec<String>,
}

impl Chatter {
    pub fn new(
        insult_patterns: Vec<Regex>,
        insults: Vec<String>,
        rules: Vec<ChatterRule>,
        misc: Vec<String>,
    ) -> Self {
        Self {
            insult_patterns,
            insults,
            rules,
            misc,
        }
    }

    /// Classify the text and synthesize a reply.
    pub fn respond(&self, msg: &Message) -> String {
        let mut rng = rand::thread_rng();

        if self.insult_patterns.iter().any(|p| p.is_match(&msg.text)) {
            return self
                .insults
                .choose(&mut rng)
                .cloned()
                .unwrap_or_else(|| "Takes one to know one.".to_string());
        }

        for rule in &self.rules {
            if rule.pattern.is_match(&msg.text) {
                if let Some(line) = rule.responses.choose(&mut rng) {
                    return line.clone();
                }
            }
        }

        self.misc
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| "Please continue...".to_string())
    }
}
