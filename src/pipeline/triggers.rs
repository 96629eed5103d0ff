//! Pattern→action trigger tables.
//!
//! Triggers are the eastereggs evaluated against message text outside of
//! the explicit command syntax. Each kind is an explicit ordered sequence:
//! when two patterns of the same kind match the same text, the one
//! registered first wins. The three kinds are tried in a fixed priority —
//! string triggers, then function triggers, then URL triggers.

use rand::seq::SliceRandom;
use regex::Regex;

use crate::pipeline::Handler;

/// The literal side of a string trigger.
#[derive(Debug, Clone)]
pub enum StringResponse {
    /// A single fixed reply.
    Say(String),
    /// A pool of equally likely replies.
    SayOneOf(Vec<String>),
}

impl StringResponse {
    /// Pick the reply text — uniform random for pools.
    pub fn pick(&self) -> &str {
        match self {
            Self::Say(s) => s,
            Self::SayOneOf(pool) => pool
                .choose(&mut rand::thread_rng())
                .map(String::as_str)
                .unwrap_or(""),
        }
    }
}

/// Pattern bound to a literal reply (or pool of replies).
pub struct StringTrigger {
    pub pattern: Regex,
    pub response: StringResponse,
}

/// Pattern bound to a reply-producing capability.
pub struct FuncTrigger {
    pub pattern: Regex,
    pub handler: Handler,
}

/// Pattern bound to a capability plus a bound context string (a URL to
/// fetch material from).
pub struct UrlTrigger {
    pub pattern: Regex,
    pub handler: Handler,
    pub context: String,
}

/// The three ordered trigger tables.
#[derive(Default)]
pub struct TriggerSet {
    strings: Vec<StringTrigger>,
    funcs: Vec<FuncTrigger>,
    urls: Vec<UrlTrigger>,
}

impl TriggerSet {
    pub fn new(
        strings: Vec<StringTrigger>,
        funcs: Vec<FuncTrigger>,
        urls: Vec<UrlTrigger>,
    ) -> Self {
        Self {
            strings,
            funcs,
            urls,
        }
    }

    /// First string trigger whose pattern occurs anywhere in the text.
    pub fn first_string(&self, text: &str) -> Option<&StringTrigger> {
        self.strings.iter().find(|t| t.pattern.is_match(text))
    }

    /// First function trigger matching the text.
    pub fn first_func(&self, text: &str) -> Option<&FuncTrigger> {
        self.funcs.iter().find(|t| t.pattern.is_match(text))
    }

    /// First URL trigger matching the text.
    pub fn first_url(&self, text: &str) -> Option<&UrlTrigger> {
        self.urls.iter().find(|t| t.pattern.is_match(text))
    }
}
