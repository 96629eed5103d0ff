//! Outbound path — mention prefixing, truncation, posting.
//!
//! Every reply the pipeline or the chore runner produces goes through the
//! [`Courier`], which enforces the platform character ceiling and makes
//! sure replies address the original sender.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::platform::MicroblogApi;
use crate::ratelimit;

/// Platform character ceiling.
pub const MAX_CHARS: usize = 140;

/// Overlong text is cut at the last word boundary within this prefix and
/// suffixed with an ellipsis marker.
const TRUNCATE_AT: usize = 136;

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@\S+").expect("mention pattern"));

/// Posts replies and chore output through the platform seam.
pub struct Courier {
    api: Arc<dyn MicroblogApi>,
}

impl Courier {
    pub fn new(api: Arc<dyn MicroblogApi>) -> Self {
        Self { api }
    }

    /// Post a reply addressed to `sender`, in reply to the original
    /// message. The mention prefix is added unless the text already
    /// addresses someone.
    pub async fn reply(&self, sender: &str, text: &str, in_reply_to: Option<u64>) {
        let addressed = ensure_mention(sender, text);
        self.send(&addressed, in_reply_to).await;
    }

    /// Post standalone output (chores), no addressee.
    pub async fn post(&self, text: &str) {
        self.send(text, None).await;
    }

    async fn send(&self, text: &str, in_reply_to: Option<u64>) {
        let text = truncate(text);
        debug!(len = text.chars().count(), in_reply_to, "posting");
        if let Err(e) = self.api.post_update(&text, in_reply_to).await {
            // Never unwinds the pipeline; a lost post is a logged
            // transient failure, possibly with a backoff sleep.
            ratelimit::handle(self.api.as_ref(), &e, "posting update").await;
        }
    }
}

/// Prefix `@sender ` unless the text already contains a mention.
pub fn ensure_mention(sender: &str, text: &str) -> String {
    if MENTION.is_match(text) {
        text.to_string()
    } else {
        format!("@{sender} {text}")
    }
}

/// Trim overlong text to the last whole word within the first
/// [`TRUNCATE_AT`] characters and suffix an ellipsis marker. Text within
/// the ceiling passes through unchanged.
pub fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_CHARS {
        return text.to_string();
    }
    let prefix: String = text.chars().take(TRUNCATE_AT).collect();
    let mut words: Vec<&str> = prefix.split(' ').collect();
    words.pop();
    let mut out = words.join(" ");
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_passes_through() {
        let text = "a".repeat(140);
        assert_eq!(truncate(&text), text);
    }

    #[test]
    fn overlong_text_is_cut_at_word_boundary() {
        // 160 characters with a space every 8th position.
        let word = "abcdefg";
        let text = std::iter::repeat(word)
            .take(20)
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(text.len(), 159);
        let long = format!("{text}xx"); // 161 chars, over the ceiling
        let cut = truncate(&long);
        assert!(cut.chars().count() <= MAX_CHARS - 1);
        assert!(cut.ends_with("..."));
        // Ends on a whole word, not mid-word.
        assert!(cut.trim_end_matches("...").ends_with(word));
    }

    #[test]
    fn truncation_never_exceeds_139() {
        let text = "word ".repeat(60);
        let cut = truncate(&text);
        assert!(cut.chars().count() <= 139);
    }

    #[test]
    fn mention_added_when_missing() {
        assert_eq!(ensure_mention("alice", "hello"), "@alice hello");
    }

    #[test]
    fn mention_preserved_when_present() {
        assert_eq!(ensure_mention("alice", "@bob hello"), "@bob hello");
    }
}
