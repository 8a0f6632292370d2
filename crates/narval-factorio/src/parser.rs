//! Factorio console output parser
//!
//! Patterns are tried in a fixed order because the formats overlap: the
//! engine's own log lines (ready, saved) come first, then the timestamped
//! main log with its `[TAG]`.

use narval_api::{EventKind, ParsedLine, User};
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

// The `:<line>` after the source file is optional; some builds omit it.
static READY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^ *\d+\.\d{3} Info ServerMultiplayerManager\.cpp:.* changing state .+ to\(InGame\)$",
    )
    .expect("ready pattern")
});

static SAVED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ *\d+\.\d{3} Info AppManagerStates\.cpp:\d+: Saving finished$")
        .expect("saved pattern")
});

static MAIN_LOG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.{19} \[([A-Z]+)\] (.+)$").expect("main log pattern"));

static CHAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?): (.+)$").expect("chat pattern"));

static JOIN_LEAVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+) (joined|left) the game$").expect("join/leave pattern")
});

/// Classify one line of server output (newline already stripped)
pub fn parse_line(raw: &str) -> ParsedLine {
    if READY.is_match(raw) {
        return ParsedLine::event(raw, EventKind::Ready);
    }
    if SAVED.is_match(raw) {
        return ParsedLine::event(raw, EventKind::Saved);
    }

    let Some(caps) = MAIN_LOG.captures(raw) else {
        return ParsedLine::unparsed(raw);
    };
    let tag = &caps[1];
    let rest = &caps[2];

    match tag {
        "JOIN" => presence(raw, rest, EventKind::Join),
        "LEAVE" => presence(raw, rest, EventKind::Leave),
        "CHAT" => match CHAT.captures(rest) {
            Some(chat) => ParsedLine::talk(raw, Some(User::new(&chat[1])), &chat[2]),
            None => ParsedLine::talk(raw, None, rest),
        },
        _ => ParsedLine::unparsed(raw),
    }
}

fn presence(raw: &str, rest: &str, kind: EventKind) -> ParsedLine {
    match JOIN_LEAVE.captures(rest) {
        Some(caps) => ParsedLine::presence(raw, kind, User::new(&caps[1])),
        None => {
            warn!(line = %raw, event = %kind, "Presence line without a player name");
            ParsedLine::unparsed(raw)
        }
    }
}
