//! Chat session state: the transcript plus the "agent is composing" flag.
//!
//! The front end owns a [`ChatSession`] and drives it from its event loop: user input goes
//! through [`ChatSession::submit`], socket frames through [`ChatSession::receive_frame`], and
//! [`ChatSession::poll_simulated`] is called periodically so offline echoes show up on time.
//! No I/O happens here; the caller performs the send that [`SubmitAction::Transmit`] asks for.

use crate::normalize;
use crate::transcript::{ChatMessage, Transcript};
use std::time::{Duration, Instant};

/// What the caller has to do after a submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitAction {
    /// Input was blank; nothing was recorded.
    Ignored,
    /// Send this text over the open link.
    Transmit(String),
    /// No link; a canned reply will be appended once `due` has passed.
    Simulated { due: Instant },
}

#[derive(Debug, Clone)]
struct PendingReply {
    due: Instant,
    text: String,
}

pub struct ChatSession {
    transcript: Transcript,
    composing: bool,
    connected: bool,
    fallback_delay: Duration,
    pending: Vec<PendingReply>,
}

impl ChatSession {
    pub fn new(welcome: &str, fallback_delay: Duration) -> Self {
        Self {
            transcript: Transcript::with_welcome(welcome),
            composing: false,
            connected: false,
            fallback_delay,
            pending: Vec::new(),
        }
    }

    /// Session configured from [`crate::config::ChatConfig`].
    pub fn from_config(config: &crate::config::ChatConfig) -> Self {
        Self::new(
            &config.welcome,
            Duration::from_millis(config.fallback_delay_ms),
        )
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// True between a user send and the next agent message.
    pub fn is_composing(&self) -> bool {
        self.composing
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        if self.connected != connected {
            log::debug!("link {}", if connected { "open" } else { "closed" });
        }
        self.connected = connected;
    }

    /// Record a user message. Blank input is ignored entirely.
    pub fn submit(&mut self, input: &str, now: Instant) -> SubmitAction {
        if input.trim().is_empty() {
            return SubmitAction::Ignored;
        }
        let text = input.to_string();
        self.transcript.push(ChatMessage::user(text.clone()));
        self.composing = true;

        if self.connected {
            return SubmitAction::Transmit(text);
        }
        log::warn!("link not open, falling back to simulated reply");
        let due = self.schedule_simulated(&text, now);
        SubmitAction::Simulated { due }
    }

    /// The link dropped between [`SubmitAction::Transmit`] and the actual send. Marks the
    /// session offline and schedules the simulated reply for `text` instead.
    pub fn delivery_failed(&mut self, text: &str, now: Instant) -> Instant {
        self.set_connected(false);
        self.schedule_simulated(text, now)
    }

    fn schedule_simulated(&mut self, text: &str, now: Instant) -> Instant {
        let due = now + self.fallback_delay;
        self.pending.push(PendingReply {
            due,
            text: format!("You said: {}", text),
        });
        due
    }

    /// A quick reply button behaves exactly like typing its label.
    pub fn quick_reply(&mut self, label: &str, now: Instant) -> SubmitAction {
        self.submit(label, now)
    }

    /// Normalize a socket frame and append one agent message per record.
    /// Returns how many messages were appended.
    pub fn receive_frame(&mut self, raw: &str) -> usize {
        log::debug!("raw frame: {}", raw);
        let records = normalize::normalize(raw);
        let count = records.len();
        for record in records {
            self.transcript.push(ChatMessage::from(record));
            self.composing = false;
        }
        count
    }

    /// Append every simulated reply whose due time has passed. Returns how many were appended.
    pub fn poll_simulated(&mut self, now: Instant) -> usize {
        let (ready, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|p| p.due <= now);
        self.pending = waiting;
        let count = ready.len();
        for reply in ready {
            self.transcript.push(ChatMessage::agent(reply.text));
            self.composing = false;
        }
        count
    }

    /// Earliest due time among pending simulated replies.
    pub fn next_simulated_due(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.due).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::CanonicalButton;
    use crate::transcript::Origin;

    fn session() -> ChatSession {
        ChatSession::new("Welcome", Duration::from_secs(2))
    }

    #[test]
    fn blank_input_is_ignored() {
        let mut s = session();
        s.set_connected(true);
        let now = Instant::now();
        assert_eq!(s.submit("", now), SubmitAction::Ignored);
        assert_eq!(s.submit("   \t\n", now), SubmitAction::Ignored);
        assert_eq!(s.transcript().len(), 1);
        assert!(!s.is_composing());
    }

    #[test]
    fn connected_submit_transmits_and_marks_composing() {
        let mut s = session();
        s.set_connected(true);
        let action = s.submit("Draft a reminder", Instant::now());
        assert_eq!(action, SubmitAction::Transmit("Draft a reminder".to_string()));
        assert!(s.is_composing());
        let last = s.transcript().last().cloned();
        assert_eq!(last, Some(ChatMessage::user("Draft a reminder")));
    }

    #[test]
    fn frame_appends_agent_messages_and_clears_composing() {
        let mut s = session();
        s.set_connected(true);
        s.submit("hi", Instant::now());
        let n = s.receive_frame(
            r#"{"content":"one","buttons":[{"type":"quick_reply","text":"More"}]}{"Body":"two"}"#,
        );
        assert_eq!(n, 2);
        assert!(!s.is_composing());
        let msgs = s.transcript().messages();
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[2].origin, Origin::Agent);
        assert_eq!(msgs[2].text, "one");
        assert_eq!(
            msgs[2].buttons,
            vec![CanonicalButton::QuickReply {
                label: "More".to_string()
            }]
        );
        assert_eq!(msgs[3].text, "two");
    }

    #[test]
    fn empty_frame_keeps_composing() {
        let mut s = session();
        s.set_connected(true);
        s.submit("hi", Instant::now());
        assert_eq!(s.receive_frame("  "), 0);
        assert!(s.is_composing());
    }

    #[test]
    fn offline_submit_schedules_simulated_reply() {
        let mut s = session();
        let now = Instant::now();
        let action = s.submit("hello", now);
        assert_eq!(
            action,
            SubmitAction::Simulated {
                due: now + Duration::from_secs(2)
            }
        );
        assert_eq!(s.next_simulated_due(), Some(now + Duration::from_secs(2)));

        assert_eq!(s.poll_simulated(now + Duration::from_millis(1999)), 0);
        assert!(s.is_composing());

        assert_eq!(s.poll_simulated(now + Duration::from_secs(2)), 1);
        assert!(!s.is_composing());
        assert_eq!(
            s.transcript().last().map(|m| m.text.as_str()),
            Some("You said: hello")
        );
        assert_eq!(s.next_simulated_due(), None);
    }

    #[test]
    fn simulated_replies_arrive_in_due_order() {
        let mut s = session();
        let t0 = Instant::now();
        s.submit("first", t0);
        s.submit("second", t0 + Duration::from_secs(1));
        assert_eq!(s.poll_simulated(t0 + Duration::from_millis(2500)), 1);
        assert!(s.is_composing());
        assert_eq!(s.poll_simulated(t0 + Duration::from_secs(3)), 1);
        let texts: Vec<&str> = s
            .transcript()
            .messages()
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(
            texts,
            vec!["Welcome", "first", "second", "You said: first", "You said: second"]
        );
    }

    #[test]
    fn failed_delivery_falls_back_to_simulated_reply() {
        let mut s = session();
        s.set_connected(true);
        let now = Instant::now();
        let SubmitAction::Transmit(text) = s.submit("lost", now) else {
            panic!("expected transmit");
        };
        let due = s.delivery_failed(&text, now);
        assert!(!s.is_connected());
        assert_eq!(due, now + Duration::from_secs(2));
        assert_eq!(s.poll_simulated(due), 1);
        assert_eq!(
            s.transcript().last().map(|m| m.text.as_str()),
            Some("You said: lost")
        );
        assert_eq!(s.transcript().len(), 3);
    }

    #[test]
    fn quick_reply_submits_label() {
        let mut s = session();
        s.set_connected(true);
        assert_eq!(
            s.quick_reply("Yes please", Instant::now()),
            SubmitAction::Transmit("Yes please".to_string())
        );
        assert!(s.transcript().last().map(|m| m.is_user()).unwrap_or(false));
    }
}
