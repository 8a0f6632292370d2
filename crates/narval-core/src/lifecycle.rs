//! Session clock: player roster and shutdown deadlines
//!
//! The clock owns the roster and the two lifecycle deadlines:
//! - `shutdown_at`: when the server should stop if it is still idle
//! - `max_session`: hard cap, regardless of activity
//!
//! `shutdown_at` never exceeds `max_session`. While anyone is connected it
//! sits at `max_session`; when the last player leaves it moves to
//! `now + shutdown_grace`.

use narval_api::{EventKind, ParsedLine, ServerSettings, User};
use narval_util::MonotonicInstant;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SessionClock {
    roster: HashSet<User>,
    shutdown_at: MonotonicInstant,
    max_session: MonotonicInstant,
    shutdown_grace: Duration,
}

impl SessionClock {
    /// Start a session at `now` with an empty roster
    pub fn start(now: MonotonicInstant, settings: &ServerSettings) -> Self {
        let max_session = now + settings.max_session;
        let shutdown_at = (now + settings.startup_grace).min(max_session);

        Self {
            roster: HashSet::new(),
            shutdown_at,
            max_session,
            shutdown_grace: settings.shutdown_grace,
        }
    }

    /// Apply a parsed line. Returns true if the roster changed.
    pub fn observe(&mut self, line: &ParsedLine, now: MonotonicInstant) -> bool {
        let Some(author) = &line.author else {
            return false;
        };
        match line.event {
            Some(EventKind::Join) => self.join(author.clone()),
            Some(EventKind::Leave) => self.leave(author, now),
            _ => false,
        }
    }

    /// Add a player to the roster
    pub fn join(&mut self, user: User) -> bool {
        let changed = self.roster.insert(user);
        self.clamp();
        changed
    }

    /// Remove a player. An empty roster afterwards starts the idle countdown.
    pub fn leave(&mut self, user: &User, now: MonotonicInstant) -> bool {
        let changed = self.roster.remove(user);
        if self.roster.is_empty() {
            self.shutdown_at = now + self.shutdown_grace;
            debug!(grace = ?self.shutdown_grace, "Roster empty, idle countdown started");
        }
        self.clamp();
        changed
    }

    fn clamp(&mut self) {
        if !self.roster.is_empty() || self.shutdown_at > self.max_session {
            self.shutdown_at = self.max_session;
        }
    }

    /// Whether the server should be stopped at `now`
    pub fn is_due(&self, now: MonotonicInstant) -> bool {
        now >= self.shutdown_at
    }

    /// Time left until `shutdown_at`, zero if already due
    pub fn remaining(&self, now: MonotonicInstant) -> Duration {
        self.shutdown_at.saturating_duration_until(now)
    }

    pub fn num_players(&self) -> usize {
        self.roster.len()
    }

    pub fn shutdown_at(&self) -> MonotonicInstant {
        self.shutdown_at
    }

    pub fn max_session(&self) -> MonotonicInstant {
        self.max_session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(startup: u64, max: u64, grace: u64) -> ServerSettings {
        ServerSettings {
            startup_grace: Duration::from_secs(startup),
            max_session: Duration::from_secs(max),
            shutdown_grace: Duration::from_secs(grace),
            ..Default::default()
        }
    }

    fn join(name: &str) -> ParsedLine {
        ParsedLine::presence("", EventKind::Join, User::new(name))
    }

    fn leave(name: &str) -> ParsedLine {
        ParsedLine::presence("", EventKind::Leave, User::new(name))
    }

    #[test]
    fn startup_grace_sets_first_deadline() {
        let t0 = MonotonicInstant::now();
        let clock = SessionClock::start(t0, &settings(300, 86400, 60));

        assert_eq!(clock.shutdown_at(), t0 + Duration::from_secs(300));
        assert_eq!(clock.max_session(), t0 + Duration::from_secs(86400));
        assert!(!clock.is_due(t0 + Duration::from_secs(299)));
        assert!(clock.is_due(t0 + Duration::from_secs(300)));
    }

    #[test]
    fn startup_grace_is_clamped_to_max_session() {
        let t0 = MonotonicInstant::now();
        let clock = SessionClock::start(t0, &settings(600, 120, 60));
        assert_eq!(clock.shutdown_at(), clock.max_session());
    }

    #[test]
    fn join_pushes_deadline_to_max_session() {
        let t0 = MonotonicInstant::now();
        let mut clock = SessionClock::start(t0, &settings(300, 86400, 60));

        assert!(clock.observe(&join("Alice"), t0));
        // Joining twice does not count twice
        assert!(!clock.observe(&join("Alice"), t0));
        assert_eq!(clock.num_players(), 1);
        assert_eq!(clock.shutdown_at(), clock.max_session());
    }

    #[test]
    fn last_leave_starts_idle_countdown() {
        let t0 = MonotonicInstant::now();
        let mut clock = SessionClock::start(t0, &settings(300, 86400, 60));

        clock.observe(&join("Alice"), t0);
        clock.observe(&join("Bob"), t0);

        let t1 = t0 + Duration::from_secs(1000);
        clock.observe(&leave("Alice"), t1);
        assert_eq!(clock.shutdown_at(), clock.max_session());

        let t2 = t0 + Duration::from_secs(2000);
        clock.observe(&leave("Bob"), t2);
        assert_eq!(clock.num_players(), 0);
        assert_eq!(clock.shutdown_at(), t2 + Duration::from_secs(60));
        assert_eq!(clock.remaining(t2), Duration::from_secs(60));
    }

    #[test]
    fn idle_countdown_never_passes_max_session() {
        let t0 = MonotonicInstant::now();
        let mut clock = SessionClock::start(t0, &settings(300, 1000, 60));

        clock.observe(&join("Alice"), t0);
        clock.observe(&leave("Alice"), t0 + Duration::from_secs(990));
        assert_eq!(clock.shutdown_at(), clock.max_session());
    }

    #[test]
    fn rejoin_cancels_countdown() {
        let t0 = MonotonicInstant::now();
        let mut clock = SessionClock::start(t0, &settings(300, 86400, 60));

        clock.observe(&join("Alice"), t0);
        clock.observe(&leave("Alice"), t0 + Duration::from_secs(10));
        clock.observe(&join("Alice"), t0 + Duration::from_secs(20));
        assert_eq!(clock.shutdown_at(), clock.max_session());
    }

    #[test]
    fn unrelated_lines_are_ignored() {
        let t0 = MonotonicInstant::now();
        let mut clock = SessionClock::start(t0, &settings(300, 86400, 60));
        let before = clock.shutdown_at();

        assert!(!clock.observe(&ParsedLine::talk("", Some(User::new("Alice")), "hi"), t0));
        assert!(!clock.observe(&ParsedLine::event("", EventKind::Ready), t0));
        assert!(!clock.observe(&ParsedLine::unparsed("noise"), t0));
        assert_eq!(clock.shutdown_at(), before);
        assert_eq!(clock.num_players(), 0);
    }

    #[test]
    fn roster_matches_model_and_clamp_holds() {
        let names = ["Alice", "Bob", "Carol", "Dave"];
        let t0 = MonotonicInstant::now();
        let mut clock = SessionClock::start(t0, &settings(300, 5000, 60));
        let mut model: HashSet<&str> = HashSet::new();

        // Deterministic pseudo-random walk over joins and leaves
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for step in 0..500u64 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let name = names[(seed % names.len() as u64) as usize];
            let now = t0 + Duration::from_secs(step * 13);

            if seed & 0x100 == 0 {
                clock.observe(&join(name), now);
                model.insert(name);
            } else {
                clock.observe(&leave(name), now);
                model.remove(name);
            }

            assert_eq!(clock.num_players(), model.len());
            assert!(clock.shutdown_at() <= clock.max_session());
            if !model.is_empty() {
                assert_eq!(clock.shutdown_at(), clock.max_session());
            }
        }
    }
}
