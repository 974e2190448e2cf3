//! Chat transcript: the ordered, append-only list of messages shown in the panel.

use crate::normalize::{CanonicalButton, MessageRecord};
use serde::Serialize;

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    Agent,
}

/// A single transcript entry (origin, text, and any buttons the agent attached).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub origin: Origin,
    pub text: String,
    pub buttons: Vec<CanonicalButton>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::User,
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::Agent,
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.origin == Origin::User
    }

    /// Quick reply labels in display order.
    pub fn quick_replies(&self) -> impl Iterator<Item = &str> {
        self.buttons.iter().filter_map(|b| match b {
            CanonicalButton::QuickReply { label } => Some(label.as_str()),
            CanonicalButton::CallToAction { .. } => None,
        })
    }
}

impl From<MessageRecord> for ChatMessage {
    fn from(record: MessageRecord) -> Self {
        Self {
            origin: Origin::Agent,
            text: record.body,
            buttons: record.buttons,
        }
    }
}

/// Messages in arrival order. Entries are never edited or removed.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transcript that opens with an agent greeting. A blank greeting is skipped.
    pub fn with_welcome(text: &str) -> Self {
        let mut t = Self::new();
        if !text.trim().is_empty() {
            t.push(ChatMessage::agent(text));
        }
        t
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Most recent agent message, if any.
    pub fn last_agent(&self) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| !m.is_user())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_is_first_agent_message() {
        let t = Transcript::with_welcome("Hi there");
        assert_eq!(t.len(), 1);
        assert_eq!(t.messages()[0], ChatMessage::agent("Hi there"));
    }

    #[test]
    fn blank_welcome_is_skipped() {
        assert!(Transcript::with_welcome("  ").is_empty());
    }

    #[test]
    fn push_keeps_order() {
        let mut t = Transcript::new();
        t.push(ChatMessage::user("one"));
        t.push(ChatMessage::agent("two"));
        let texts: Vec<&str> = t.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(t.last().map(|m| m.origin), Some(Origin::Agent));
    }

    #[test]
    fn record_converts_to_agent_message() {
        let record = MessageRecord {
            body: "Pick one".to_string(),
            buttons: vec![
                CanonicalButton::QuickReply {
                    label: "A".to_string(),
                },
                CanonicalButton::CallToAction {
                    label: "Site".to_string(),
                    href: "https://example.com".to_string(),
                },
                CanonicalButton::QuickReply {
                    label: "B".to_string(),
                },
            ],
        };
        let m = ChatMessage::from(record);
        assert_eq!(m.origin, Origin::Agent);
        assert_eq!(m.quick_replies().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn last_agent_skips_user_messages() {
        let mut t = Transcript::with_welcome("hello");
        t.push(ChatMessage::user("q"));
        assert_eq!(t.last_agent().map(|m| m.text.as_str()), Some("hello"));
    }
}
