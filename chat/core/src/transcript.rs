//! Conversation Transcript
//!
//! Ordered user/assistant messages for one chat screen, with the redaction
//! gate that decides how much of each assistant reply an anonymous viewer
//! sees.
//!
//! - Greetings are always shown in full
//! - Authenticated viewers see everything
//! - Otherwise replies longer than the threshold show their first half
//!
//! The gate is applied on every update to the current cumulative content,
//! so a reply can cross the threshold mid-stream. [`Transcript::unlock`]
//! re-expands every truncated entry in place.

use serde::{Deserialize, Serialize};

use crate::format::{format_markdown, normalize_reply, BlockNode};

/// Default preview threshold, in characters
pub const DEFAULT_PREVIEW_THRESHOLD: usize = 50;

/// Who a message is from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The viewer
    User,
    /// The assistant
    Assistant,
}

/// One transcript entry
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Message {
    /// Author
    pub role: Role,
    /// Displayed text (a prefix of `full_content` when truncated)
    pub content: String,
    /// Node tree of `content`
    pub nodes: Vec<BlockNode>,
    /// Whether `content` is a redacted preview
    pub truncated: bool,
    /// Complete text, kept for assistant replies
    pub full_content: Option<String>,
    /// Fixed greeting entry; never truncated
    pub is_greeting: bool,
    /// Still receiving updates
    pub streaming: bool,
}

impl Message {
    /// A user message, shown verbatim
    pub fn user(text: impl Into<String>) -> Self {
        let content = text.into();
        Self {
            role: Role::User,
            nodes: format_markdown(&content),
            content,
            truncated: false,
            full_content: None,
            is_greeting: false,
            streaming: false,
        }
    }

    fn assistant(full: String, is_greeting: bool, gate: &RedactionGate) -> Self {
        let mut message = Self {
            role: Role::Assistant,
            content: String::new(),
            nodes: Vec::new(),
            truncated: false,
            full_content: None,
            is_greeting,
            streaming: false,
        };
        message.set_full(full, gate);
        message
    }

    /// Install new full text and re-apply the gate
    fn set_full(&mut self, full: String, gate: &RedactionGate) {
        let (shown, truncated) = gate.preview(&full, self.is_greeting);
        self.nodes = format_markdown(&shown);
        self.content = shown;
        self.truncated = truncated;
        self.full_content = Some(full);
    }

    /// The complete text, whether or not it is truncated
    #[must_use]
    pub fn full_text(&self) -> &str {
        self.full_content.as_deref().unwrap_or(&self.content)
    }
}

/// Truncation-by-auth-state policy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionGate {
    /// Replies longer than this many characters are cut for anonymous viewers
    pub threshold: usize,
    /// Whether the viewer is signed in
    pub authenticated: bool,
}

impl Default for RedactionGate {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_PREVIEW_THRESHOLD,
            authenticated: false,
        }
    }
}

impl RedactionGate {
    /// Gate with a custom threshold for an anonymous viewer
    #[must_use]
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            threshold,
            authenticated: false,
        }
    }

    /// Displayed form of `full` and whether it was truncated
    #[must_use]
    pub fn preview(&self, full: &str, is_greeting: bool) -> (String, bool) {
        if is_greeting || self.authenticated {
            return (full.to_string(), false);
        }
        let len = full.chars().count();
        if len <= self.threshold {
            return (full.to_string(), false);
        }
        (full.chars().take(len / 2).collect(), true)
    }
}

/// Ordered message list for one screen
#[derive(Clone, Debug, Default, Serialize)]
pub struct Transcript {
    messages: Vec<Message>,
    gate: RedactionGate,
}

impl Transcript {
    /// Empty transcript with the given gate
    #[must_use]
    pub fn new(gate: RedactionGate) -> Self {
        Self {
            messages: Vec::new(),
            gate,
        }
    }

    /// Messages in display order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether there are no messages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The last message, if any
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Current gate
    #[must_use]
    pub fn gate(&self) -> RedactionGate {
        self.gate
    }

    /// Whether the viewer is treated as signed in
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.gate.authenticated
    }

    /// Append a user message
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    /// Append the fixed greeting
    pub fn push_greeting(&mut self, text: &str) {
        let message = Message::assistant(normalize_reply(text), true, &self.gate);
        self.messages.push(message);
    }

    /// Append an assistant reply; returns its index
    pub fn push_assistant(&mut self, text: &str) -> usize {
        let message = Message::assistant(normalize_reply(text), false, &self.gate);
        self.messages.push(message);
        self.messages.len() - 1
    }

    /// Append an assistant entry that will receive streamed updates
    pub fn push_streaming(&mut self, placeholder: &str) -> usize {
        let index = self.push_assistant(placeholder);
        self.messages[index].streaming = true;
        index
    }

    /// Replace the live assistant entry, or append one
    ///
    /// The trailing entry is replaced when it is a non-greeting assistant
    /// message; otherwise a new entry is appended. Returns its index.
    pub fn replace_last_assistant(&mut self, text: &str) -> usize {
        let full = normalize_reply(text);
        let gate = self.gate;
        let live = self
            .messages
            .last()
            .is_some_and(|last| last.role == Role::Assistant && !last.is_greeting);

        if live {
            if let Some(last) = self.messages.last_mut() {
                last.set_full(full, &gate);
            }
        } else {
            self.messages.push(Message::assistant(full, false, &gate));
        }
        self.messages.len() - 1
    }

    /// Mark the trailing assistant entry as settled
    pub fn finish_last_assistant(&mut self) {
        if let Some(last) = self.messages.last_mut() {
            if last.role == Role::Assistant {
                last.streaming = false;
            }
        }
    }

    /// Set the viewer's auth state; signing in re-expands truncated entries
    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.gate.authenticated = authenticated;
        if authenticated {
            self.unlock();
        }
    }

    /// Re-expand every truncated message to its full content
    ///
    /// Order and count of entries are unchanged.
    pub fn unlock(&mut self) {
        self.gate.authenticated = true;
        let gate = self.gate;
        let mut expanded = 0usize;
        for message in self.messages.iter_mut().filter(|m| m.truncated) {
            let full = message.full_text().to_string();
            message.set_full(full, &gate);
            expanded += 1;
        }
        tracing::debug!(expanded, "Transcript unlocked");
    }

    /// Drop every message
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::InlineNode;
    use pretty_assertions::assert_eq;

    fn eighty_chars() -> String {
        "命".repeat(80)
    }

    #[test]
    fn test_short_reply_not_truncated() {
        let mut transcript = Transcript::default();
        transcript.push_assistant("短短的回复");
        let message = transcript.last().unwrap();
        assert!(!message.truncated);
        assert_eq!(message.content, "短短的回复");
        assert_eq!(message.full_content.as_deref(), Some("短短的回复"));
    }

    #[test]
    fn test_exactly_threshold_not_truncated() {
        let mut transcript = Transcript::default();
        transcript.push_assistant(&"a".repeat(50));
        assert!(!transcript.last().unwrap().truncated);
    }

    #[test]
    fn test_eighty_chars_show_forty_when_anonymous() {
        let mut transcript = Transcript::default();
        let full = eighty_chars();
        transcript.push_assistant(&full);

        let message = transcript.last().unwrap();
        assert!(message.truncated);
        assert_eq!(message.content.chars().count(), 40);
        assert!(full.starts_with(&message.content));
        assert_eq!(message.full_content.as_deref(), Some(full.as_str()));
    }

    #[test]
    fn test_odd_length_rounds_down() {
        let gate = RedactionGate::default();
        let (shown, truncated) = gate.preview(&"x".repeat(51), false);
        assert!(truncated);
        assert_eq!(shown.len(), 25);
    }

    #[test]
    fn test_unlock_expands_in_place() {
        let mut transcript = Transcript::default();
        transcript.push_greeting("欢迎");
        transcript.push_user("问题一");
        transcript.push_assistant(&eighty_chars());
        transcript.push_user("问题二");
        transcript.push_assistant(&"运".repeat(60));
        let roles_before: Vec<Role> = transcript.messages().iter().map(|m| m.role).collect();

        transcript.set_authenticated(true);

        let roles_after: Vec<Role> = transcript.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles_before, roles_after);
        assert_eq!(transcript.len(), 5);
        assert!(transcript.messages().iter().all(|m| !m.truncated));
        assert_eq!(transcript.messages()[2].content, eighty_chars());
        assert_eq!(transcript.messages()[4].content.chars().count(), 60);
    }

    #[test]
    fn test_authenticated_viewer_sees_everything() {
        let mut transcript = Transcript::default();
        transcript.set_authenticated(true);
        transcript.push_assistant(&eighty_chars());
        assert!(!transcript.last().unwrap().truncated);
    }

    #[test]
    fn test_greeting_never_truncated() {
        let mut transcript = Transcript::new(RedactionGate::with_threshold(5));
        let greeting = "您好，我是您的命理助手，可以为您解读八字。";
        transcript.push_greeting(greeting);

        let message = transcript.last().unwrap();
        assert!(message.is_greeting);
        assert!(!message.truncated);
        assert_eq!(message.content, greeting);
    }

    #[test]
    fn test_gate_reapplied_as_reply_grows() {
        let mut transcript = Transcript::default();
        transcript.push_user("问");
        let index = transcript.push_streaming("思考中…");

        assert_eq!(transcript.replace_last_assistant(&"a".repeat(30)), index);
        assert!(!transcript.messages()[index].truncated);

        assert_eq!(transcript.replace_last_assistant(&"a".repeat(80)), index);
        assert!(transcript.messages()[index].truncated);
        assert_eq!(transcript.messages()[index].content.len(), 40);
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn test_replace_appends_after_user_or_greeting() {
        let mut transcript = Transcript::default();
        transcript.push_greeting("欢迎");
        transcript.replace_last_assistant("第一条");
        assert_eq!(transcript.len(), 2);
        assert!(transcript.messages()[0].is_greeting);

        transcript.push_user("问");
        transcript.replace_last_assistant("第二条");
        assert_eq!(transcript.len(), 4);
    }

    #[test]
    fn test_nodes_follow_displayed_content() {
        let mut transcript = Transcript::default();
        transcript.push_assistant("# 结论\n**旺**");
        let nodes = &transcript.last().unwrap().nodes;
        assert_eq!(nodes.len(), 2);
        assert_eq!(
            nodes[1],
            BlockNode::Paragraph {
                children: vec![InlineNode::Strong("旺".to_string())]
            }
        );
    }

    #[test]
    fn test_finish_and_clear() {
        let mut transcript = Transcript::default();
        transcript.push_streaming("…");
        assert!(transcript.last().unwrap().streaming);
        transcript.finish_last_assistant();
        assert!(!transcript.last().unwrap().streaming);
        transcript.clear();
        assert!(transcript.is_empty());
    }
}
