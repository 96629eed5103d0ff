//! The stock catalog: commands, triggers, chatter pools, and chores that a
//! default bot instance ships with.
//!
//! Everything here is plain data plus small handler closures over the
//! [`Fetcher`] port. Nothing in the catalog talks to the platform API
//! directly; replies flow back through the dispatcher and courier.

use std::sync::Arc;
use std::sync::LazyLock;

use chrono::{TimeZone, Utc};
use rand::seq::SliceRandom;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::BOTNAME;
use crate::chores::{Cadence, ChoreDef, ChoreSet, producer};
use crate::pipeline::chatter::{Chatter, ChatterRule};
use crate::pipeline::commands::{Command, CommandRegistry, HelpIndex, Invocation, no_such_command};
use crate::pipeline::handler;
use crate::pipeline::triggers::{
    FuncTrigger, StringResponse, StringTrigger, TriggerSet, UrlTrigger,
};
use crate::platform::Fetcher;

/// Where the long-form command documentation lives.
pub const HELP_URL: &str = "https://natter.example.net/help.html";

const TRIVIA_URL: &str = "https://natter.example.net/trivia.html";
const INSULT_URL: &str = "https://natter.example.net/insults.html";
const FORTUNE_URL: &str = "https://natter.example.net/fortunes";
const QUACK_URL: &str = "https://natter.example.net/quack";
const EXCUSE_URL: &str = "https://natter.example.net/excuses";
const WOTD_URL: &str = "https://natter.example.net/wotd.html";
const RECIPE_URL: &str = "https://natter.example.net/recipes.html";

/// What changed in the most recent release, joined for `!new`.
const NEW: &[&str] = &[
    "chores now skip weekends where appropriate",
    "smarter rate-limit backoff",
    "!countdown learned a few new events",
];

/// Stock answers for requests the bot cannot make sense of.
const DONT_KNOW: &[&str] = &[
    "How should I know?",
    "Beats me.",
    "No clue, sorry.",
    "Not the faintest idea.",
    "I wouldn't tell you even if I knew.",
];

fn dont_know() -> String {
    DONT_KNOW
        .choose(&mut rand::thread_rng())
        .unwrap_or(&DONT_KNOW[0])
        .to_string()
}

// ── Extraction helpers ──────────────────────────────────────────────

/// A random non-empty line from a fetched plain-text resource.
fn random_line(body: &str) -> Option<String> {
    let lines: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    lines
        .choose(&mut rand::thread_rng())
        .map(|l| l.to_string())
}

/// First capture group of `pattern` anywhere in `body`.
fn first_capture(pattern: &Regex, body: &str) -> Option<String> {
    pattern
        .captures(body)?
        .get(1)
        .map(|m| m.as_str().trim().to_string())
}

async fn fetch_and_extract(
    fetcher: &dyn Fetcher,
    url: &str,
    pattern: &Regex,
) -> Option<String> {
    match fetcher.fetch(url).await {
        Ok(body) => {
            let found = first_capture(pattern, &body);
            if found.is_none() {
                warn!(url, "fetched page but found nothing to extract");
            }
            found
        }
        Err(e) => {
            warn!(url, error = %e, "unable to fetch");
            None
        }
    }
}

async fn fetch_random_line(fetcher: &dyn Fetcher, url: &str) -> Option<String> {
    match fetcher.fetch(url).await {
        Ok(body) => random_line(&body),
        Err(e) => {
            warn!(url, error = %e, "unable to fetch");
            None
        }
    }
}

// ── Countdowns ──────────────────────────────────────────────────────

/// Events `!countdown` knows about, as UNIX timestamps.
static COUNTDOWNS: LazyLock<Vec<(&'static str, i64)>> = LazyLock::new(|| {
    vec![
        (
            "xmas",
            Utc.with_ymd_and_hms(2026, 12, 24, 0, 0, 0).unwrap().timestamp(),
        ),
        (
            "newyear",
            Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap().timestamp(),
        ),
        (
            "y2k38",
            Utc.with_ymd_and_hms(2038, 1, 19, 3, 14, 7).unwrap().timestamp(),
        ),
    ]
});

fn format_countdown(secs: i64) -> String {
    if secs < 0 {
        return "that already happened".to_string();
    }
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let mins = (secs % 3_600) / 60;
    let s = secs % 60;
    format!("{days} days, {hours}:{mins:02}:{s:02}")
}

fn countdown_reply(text: &str, now_epoch: i64) -> String {
    static ARG: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!countdown\s+(.+?)\s*$").unwrap());
    let Some(what) = first_capture(&ARG, text) else {
        return dont_know();
    };
    match COUNTDOWNS.iter().find(|(name, _)| *name == what.as_str()) {
        Some((_, target)) => format_countdown(target - now_epoch),
        None => dont_know(),
    }
}

// ── Commands ────────────────────────────────────────────────────────

struct CommandSpec {
    name: &'static str,
    usage: &'static str,
    summary: &'static str,
    how: &'static str,
}

impl CommandSpec {
    /// Attach behavior to this entry. Keeping the metadata in one place
    /// means the help index can never describe a command differently from
    /// the command itself.
    fn command(&self, invocation: Invocation, handler: crate::pipeline::Handler) -> Command {
        Command::new(self.name, self.usage, self.summary, self.how, invocation, handler)
    }
}

fn listed(name: &str) -> &'static CommandSpec {
    COMMAND_SPECS
        .iter()
        .find(|s| s.name == name)
        .expect("command is listed")
}

const COMMAND_SPECS: &[CommandSpec] = &[
    CommandSpec {
        name: "help",
        usage: "(<command>)",
        summary: "request help (about the given command)",
        how: "hardcoded",
    },
    CommandSpec {
        name: "how",
        usage: "(<command>)",
        summary: "ask how something works",
        how: "hardcoded",
    },
    CommandSpec {
        name: "new",
        usage: "",
        summary: "show what's new",
        how: "hardcoded",
    },
    CommandSpec {
        name: "countdown",
        usage: "<event>",
        summary: "display countdown until event",
        how: "hardcoded",
    },
    CommandSpec {
        name: "feature",
        usage: "<descr>",
        summary: "request a feature from the author",
        how: "message to the log",
    },
    CommandSpec {
        name: "ping",
        usage: "",
        summary: "check that the bot is alive",
        how: "hardcoded",
    },
    CommandSpec {
        name: "trivia",
        usage: "",
        summary: "display some useless information",
        how: TRIVIA_URL,
    },
    CommandSpec {
        name: "insult",
        usage: "<somebody>",
        summary: "insult somebody",
        how: INSULT_URL,
    },
    CommandSpec {
        name: "fortune",
        usage: "",
        summary: "get a fortune",
        how: FORTUNE_URL,
    },
];

/// Build the stock command registry.
///
/// Two-phase: the help index is assembled from the specs first, then each
/// command handler that describes the registry captures that snapshot.
pub fn default_commands(fetcher: Arc<dyn Fetcher>) -> CommandRegistry {
    let mut index = HelpIndex::new();
    for spec in COMMAND_SPECS {
        index.insert(spec.name, spec.usage, spec.summary, spec.how);
    }
    let index = Arc::new(index);

    let trivia_pattern =
        Regex::new(r"(?i)<div class='factText'>([^<]+)</div>").expect("trivia pattern");
    let insult_pattern = Regex::new(r"(?i)<i>([^<]+)</i>").expect("insult pattern");

    let help_index = index.clone();
    let how_index = index.clone();
    let trivia_fetcher = fetcher.clone();
    let insult_fetcher = fetcher.clone();
    let fortune_fetcher = fetcher;

    let commands = vec![
        listed("help").command(
            Invocation::Reply,
            handler(move |msg, _| {
                let index = help_index.clone();
                async move {
                    static ARG: LazyLock<Regex> =
                        LazyLock::new(|| Regex::new(r"!help\s+(\S+)").unwrap());
                    static BARE: LazyLock<Regex> =
                        LazyLock::new(|| Regex::new(r"!help\s*$").unwrap());
                    if let Some(name) = first_capture(&ARG, &msg.text) {
                        return Some(
                            index
                                .help_line(&name)
                                .map(str::to_string)
                                .unwrap_or_else(|| no_such_command(&name)),
                        );
                    }
                    if BARE.is_match(&msg.text) {
                        return Some(HELP_URL.to_string());
                    }
                    Some(format!(
                        "I know of {} commands. Ask me about one of them or see: {}",
                        index.len(),
                        HELP_URL
                    ))
                }
            }),
        ),
        listed("how").command(
            Invocation::Reply,
            handler(move |msg, _| {
                let index = how_index.clone();
                async move {
                    static ARG: LazyLock<Regex> =
                        LazyLock::new(|| Regex::new(r"!how\s+(\S+)").unwrap());
                    let Some(name) = first_capture(&ARG, &msg.text) else {
                        return Some(dont_know());
                    };
                    if name == BOTNAME {
                        return Some(format!(
                            "Unfortunately, no one can be told what {BOTNAME} is... \
                             You have to see it for yourself."
                        ));
                    }
                    Some(
                        index
                            .how(&name)
                            .map(str::to_string)
                            .unwrap_or_else(dont_know),
                    )
                }
            }),
        ),
        listed("new").command(
            Invocation::Reply,
            handler(|_, _| async { Some(NEW.join(", ")) }),
        ),
        listed("countdown").command(
            Invocation::Reply,
            handler(|msg, _| async move {
                Some(countdown_reply(&msg.text, Utc::now().timestamp()))
            }),
        ),
        listed("feature").command(
            Invocation::Reply,
            handler(|msg, _| async move {
                info!(from = %msg.sender, request = %msg.text, "feature request");
                Some("Feature request relayed to my owner. Thank you!".to_string())
            }),
        ),
        listed("ping")
            .command(
                Invocation::NoReply,
                handler(|msg, _| async move {
                    debug!(from = %msg.sender, "pinged");
                    None
                }),
            )
            .silent_ok(),
        listed("trivia").command(
            Invocation::ReplyWithContext(TRIVIA_URL.to_string()),
            handler(move |_, url| {
                let fetcher = trivia_fetcher.clone();
                let pattern = trivia_pattern.clone();
                async move {
                    fetch_and_extract(fetcher.as_ref(), url.as_deref()?, &pattern).await
                }
            }),
        ),
        listed("insult").command(
            Invocation::ReplyWithContext(INSULT_URL.to_string()),
            handler(move |_, url| {
                let fetcher = insult_fetcher.clone();
                let pattern = insult_pattern.clone();
                async move {
                    fetch_and_extract(fetcher.as_ref(), url.as_deref()?, &pattern).await
                }
            }),
        ),
        listed("fortune").command(
            Invocation::ReplyWithContext(FORTUNE_URL.to_string()),
            handler(move |_, url| {
                let fetcher = fortune_fetcher.clone();
                async move { fetch_random_line(fetcher.as_ref(), url.as_deref()?).await }
            }),
        ),
    ];

    CommandRegistry::new(commands)
}

// ── Triggers ────────────────────────────────────────────────────────

/// QWERTY text as if typed on a Dvorak layout.
fn dvorakify(text: &str) -> String {
    const QWERTY: &str = "qwertyuiopasdfghjkl;zxcvbnm,./QWERTYUIOPASDFGHJKL:ZXCVBNM<>?-=_+[]{}";
    const DVORAK: &str = "',.pyfgcrlaoeuidhtns;qjkxbmwvz\"<>PYFGCRLAOEUIDHTNS:QJKXBMWVZ[]{}/=?+";
    text.chars()
        .map(|c| {
            QWERTY
                .find(c)
                .and_then(|i| DVORAK.chars().nth(i))
                .unwrap_or(c)
        })
        .collect()
}

/// Build the stock trigger tables. Order within each table matters; the
/// dispatcher takes the first match.
pub fn default_triggers(fetcher: Arc<dyn Fetcher>) -> TriggerSet {
    let re = |p: &str| Regex::new(p).expect("trigger pattern");

    let strings = vec![
        StringTrigger {
            pattern: re("(?i)(pirate|ahoy|arrr|pillage|yarr|lagoon)"),
            response: StringResponse::SayOneOf(vec![
                "Hoist the colors!".to_string(),
                "Swab that deck!".to_string(),
                "All hands on deck!".to_string(),
                "Land ho!".to_string(),
                "Batten down the hatches!".to_string(),
                "Weigh anchor and set sail!".to_string(),
            ]),
        },
        StringTrigger {
            pattern: re("(?i)(ninja|shinobi|shuriken)"),
            response: StringResponse::SayOneOf(vec![
                "Vanish in a puff of smoke!".to_string(),
                "Strike from the shadows!".to_string(),
                "Scale the castle wall!".to_string(),
                "Silence! A ninja is passing.".to_string(),
            ]),
        },
        StringTrigger {
            pattern: re("(?i)hold on"),
            response: StringResponse::Say("No, *YOU* hold on!".to_string()),
        },
        StringTrigger {
            pattern: re("(?i)hang on"),
            response: StringResponse::Say("No, *YOU* hang on!".to_string()),
        },
    ];

    let funcs = vec![
        FuncTrigger {
            pattern: re("(?i)what's new"),
            handler: handler(|_, _| async { Some(NEW.join(", ")) }),
        },
        FuncTrigger {
            pattern: re("(?i)(dvorak|keyboard layout)"),
            handler: handler(|msg, _| async move { Some(dvorakify(&msg.text)) }),
        },
    ];

    let quack_fetcher = fetcher.clone();
    let excuse_fetcher = fetcher.clone();
    let trivia_fetcher = fetcher;
    let trivia_pattern =
        Regex::new(r"(?i)<div class='factText'>([^<]+)</div>").expect("trivia pattern");

    let urls = vec![
        UrlTrigger {
            pattern: re("(?i)(trivia|factual|factlet)"),
            handler: handler(move |_, url| {
                let fetcher = trivia_fetcher.clone();
                let pattern = trivia_pattern.clone();
                async move {
                    fetch_and_extract(fetcher.as_ref(), url.as_deref()?, &pattern).await
                }
            }),
            context: TRIVIA_URL.to_string(),
        },
        UrlTrigger {
            pattern: re("(?i)(quack|duck|bird|chirp)"),
            handler: handler(move |_, url| {
                let fetcher = quack_fetcher.clone();
                async move { fetch_random_line(fetcher.as_ref(), url.as_deref()?).await }
            }),
            context: QUACK_URL.to_string(),
        },
        UrlTrigger {
            pattern: re("(?i)(security|obscurity|excuse|bingo)"),
            handler: handler(move |_, url| {
                let fetcher = excuse_fetcher.clone();
                async move { fetch_random_line(fetcher.as_ref(), url.as_deref()?).await }
            }),
            context: EXCUSE_URL.to_string(),
        },
    ];

    TriggerSet::new(strings, funcs, urls)
}

// ── Chatter ─────────────────────────────────────────────────────────

/// Build the stock fallback responder.
pub fn default_chatter() -> Chatter {
    let re = |p: &str| Regex::new(p).expect("chatter pattern");

    let insult_patterns = vec![re("(?i)(you suck|stupid bot|dumb bot|shut up|useless)")];
    let insults = vec![
        "Takes one to know one.".to_string(),
        "I'm rubber, you're glue.".to_string(),
        "Strong words from someone arguing with a bot.".to_string(),
        "I'd agree with you, but then we'd both be wrong.".to_string(),
    ];

    let rules = vec![
        ChatterRule {
            pattern: re("(?i)(hello|how are you|how do you do|good (morning|day|evening))"),
            responses: vec![
                "How do you do?".to_string(),
                "A good day to you!".to_string(),
                "Hello there. What shall we talk about?".to_string(),
            ],
        },
        ChatterRule {
            pattern: re("(?i)are you (a )?(ro)?bot"),
            responses: vec![
                "Would it bother you if I were?".to_string(),
                "Does it matter?".to_string(),
            ],
        },
        ChatterRule {
            pattern: re("(?i)(weather|raining|sunny|forecast)"),
            responses: vec![
                "Lovely weather for ducks.".to_string(),
                "I never go outside, so I couldn't say.".to_string(),
            ],
        },
    ];

    let misc = vec![
        "Very interesting.".to_string(),
        "Funny you should say that.".to_string(),
        "I am not sure I understand you completely.".to_string(),
        "What does that suggest to you?".to_string(),
        "Please continue...".to_string(),
        "Go on...".to_string(),
        "Do you want to tell me more about that?".to_string(),
        "Could you rephrase that?".to_string(),
        "I'm gonna go ahead and say... no.".to_string(),
        "Sure, why not?".to_string(),
    ];

    Chatter::new(insult_patterns, insults, rules, misc)
}

// ── Chores ──────────────────────────────────────────────────────────

/// Build the stock chore list.
pub fn default_chores(fetcher: Arc<dyn Fetcher>) -> ChoreSet {
    let title_pattern = Regex::new(r"(?i)<title>([^<]+)</title>").expect("title pattern");

    let fortune_fetcher = fetcher.clone();
    let wotd_fetcher = fetcher.clone();
    let recipe_fetcher = fetcher;
    let wotd_pattern = title_pattern.clone();

    ChoreSet::new(vec![
        ChoreDef::new(
            "fortune",
            Cadence::Daily,
            producer(move || {
                let fetcher = fortune_fetcher.clone();
                async move {
                    fetch_random_line(fetcher.as_ref(), FORTUNE_URL)
                        .await
                        .map(|line| format!("Fortune of the day: {line}"))
                }
            }),
        ),
        ChoreDef::new(
            "wotd",
            Cadence::Daily,
            producer(move || {
                let fetcher = wotd_fetcher.clone();
                let pattern = wotd_pattern.clone();
                async move {
                    fetch_and_extract(fetcher.as_ref(), WOTD_URL, &pattern)
                        .await
                        .map(|word| format!("Word of the day: {word}"))
                }
            }),
        ),
        ChoreDef::new(
            "recipe",
            Cadence::Weekday,
            producer(move || {
                let fetcher = recipe_fetcher.clone();
                let pattern = title_pattern.clone();
                async move {
                    fetch_and_extract(fetcher.as_ref(), RECIPE_URL, &pattern)
                        .await
                        .map(|title| format!("Recipe of the day: {title}"))
                }
            }),
        ),
    ])
}
