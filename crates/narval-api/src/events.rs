//! Events parsed from game server output

use serde::{Deserialize, Serialize};

use crate::User;

/// What a line of server output means to the launcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Chat message (author absent for system chat)
    Talk,
    /// Server finished loading and accepts players
    Ready,
    /// Server finished writing its save file
    Saved,
    /// Request to stop the server (only meaningful as a command)
    Stop,
    /// A player connected
    Join,
    /// A player disconnected
    Leave,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::Talk => "talk",
            EventKind::Ready => "ready",
            EventKind::Saved => "saved",
            EventKind::Stop => "stop",
            EventKind::Join => "join",
            EventKind::Leave => "leave",
        };
        f.write_str(name)
    }
}

/// One line of server output, classified.
///
/// Lines that match no known pattern keep `raw` and carry no `event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedLine {
    pub raw: String,
    pub event: Option<EventKind>,
    pub author: Option<User>,
    pub message: Option<String>,
}

impl ParsedLine {
    /// A line that carries no event
    pub fn unparsed(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            event: None,
            author: None,
            message: None,
        }
    }

    /// A bare event without payload (Ready, Saved, Stop)
    pub fn event(raw: impl Into<String>, event: EventKind) -> Self {
        Self {
            raw: raw.into(),
            event: Some(event),
            author: None,
            message: None,
        }
    }

    /// A player roster change (Join, Leave)
    pub fn presence(raw: impl Into<String>, event: EventKind, author: User) -> Self {
        Self {
            raw: raw.into(),
            event: Some(event),
            author: Some(author),
            message: None,
        }
    }

    /// A chat line, with or without an author
    pub fn talk(raw: impl Into<String>, author: Option<User>, message: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            event: Some(EventKind::Talk),
            author,
            message: Some(message.into()),
        }
    }

    /// The command a launcher sends to ask the server to stop
    pub fn stop() -> Self {
        Self::event(String::new(), EventKind::Stop)
    }

    pub fn is(&self, kind: EventKind) -> bool {
        self.event == Some(kind)
    }
}
