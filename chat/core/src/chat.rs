//! Chat Screen State
//!
//! Per-screen state for one conversation view: the transcript, the
//! conversation id, the in-flight guard, and the auto-start-once flag.
//! Surfaces create one [`ChatScreen`] per screen instance, so re-entering a
//! screen starts from fresh state.
//!
//! A turn is `begin_*` (guard, transcript entries, envelope) followed by
//! either a [`StreamingSession`](crate::session::StreamingSession) run with
//! the screen as its observer, or one of the one-shot `apply_*` calls.

use thiserror::Error;

use crate::oneshot::{OneShotError, SendReply, StartReply, NO_RESPONSE};
use crate::protocol::RequestEnvelope;
use crate::quick_ask::{resolve_prompt, QuickTopic};
use crate::session::{SessionError, SessionObserver};
use crate::transcript::{RedactionGate, Transcript};

/// Opening message of every fresh or cleared screen
pub const DEFAULT_GREETING: &str = "你好呀～（微笑）\n\
我不是来剧透你人生的编剧，只是帮你找找藏在命盘里的小彩蛋——可能是你还没发现的潜力，或是未来路上悄悄亮起的路灯（✨）\n\
毕竟你才是人生的主角，我嘛…只是个带地图的导游～（轻松摊手）\n\
准备好一起逛逛你的‘人生剧本杀’了吗？放心，不用怕泄露天机，我今天的‘仙气’储备充足！";

/// Placeholder shown while a reply is pending
pub const DEFAULT_PLACEHOLDER: &str = "思考中…";

/// Shown in place of the placeholder when a turn fails before any text
pub const DEFAULT_FAILURE_NOTICE: &str = "网络似乎有点慢，稍后再试～";

/// Turn-level caller errors
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    /// A turn is already in flight
    #[error("a reply is still loading")]
    TurnInFlight,

    /// A `send` turn needs a conversation
    #[error("no conversation yet; start one first")]
    NoConversation,

    /// Nothing to send
    #[error("message is empty")]
    EmptyMessage,
}

/// Texts and start parameters for a screen
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatSettings {
    /// Greeting entry
    pub greeting: String,
    /// Pending-reply placeholder
    pub placeholder: String,
    /// Failure notice
    pub failure_notice: String,
    /// Knowledge-base directory for `start` turns
    pub kb_index_dir: String,
    /// Knowledge-base passages for `start` turns
    pub kb_topk: u32,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            failure_notice: DEFAULT_FAILURE_NOTICE.to_string(),
            kb_index_dir: String::new(),
            kb_topk: 3,
        }
    }
}

/// One chat screen
#[derive(Debug)]
pub struct ChatScreen {
    transcript: Transcript,
    settings: ChatSettings,
    conversation_id: Option<String>,
    loading: bool,
    auto_start_pending: bool,
    received_text: bool,
    last_error: Option<String>,
}

impl Default for ChatScreen {
    fn default() -> Self {
        Self::new(ChatSettings::default(), RedactionGate::default())
    }
}

impl ChatScreen {
    /// Fresh screen showing the greeting
    #[must_use]
    pub fn new(settings: ChatSettings, gate: RedactionGate) -> Self {
        let mut transcript = Transcript::new(gate);
        transcript.push_greeting(&settings.greeting);
        Self {
            transcript,
            settings,
            conversation_id: None,
            loading: false,
            auto_start_pending: true,
            received_text: false,
            last_error: None,
        }
    }

    /// Resume an existing conversation
    #[must_use]
    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// The transcript
    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Current conversation id
    #[must_use]
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Whether a turn is in flight
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Description of the last failed turn, if the latest turn failed
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns `true` exactly once per screen, for the automatic first turn
    pub fn take_auto_start(&mut self) -> bool {
        std::mem::take(&mut self.auto_start_pending)
    }

    /// Viewer signed in (or out); signing in reveals truncated replies
    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.transcript.set_authenticated(authenticated);
    }

    /// Begin a `start` turn from a chart payload
    ///
    /// # Errors
    ///
    /// `ChatError::TurnInFlight` while another turn is loading.
    pub fn begin_start(&mut self, paipan: serde_json::Value) -> Result<RequestEnvelope, ChatError> {
        self.guard()?;
        self.open_turn();
        Ok(RequestEnvelope::start(
            paipan,
            self.settings.kb_index_dir.clone(),
            self.settings.kb_topk,
        ))
    }

    /// Begin a `send` turn with the viewer's message
    ///
    /// # Errors
    ///
    /// `EmptyMessage` for blank input, `TurnInFlight` while loading,
    /// `NoConversation` before a conversation exists.
    pub fn begin_send(&mut self, message: &str) -> Result<RequestEnvelope, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        self.begin_labelled_send(message, message)
    }

    /// Begin a canned quick-ask turn
    ///
    /// # Errors
    ///
    /// As [`ChatScreen::begin_send`], minus `EmptyMessage`.
    pub fn begin_quick_ask(&mut self, topic: QuickTopic) -> Result<RequestEnvelope, ChatError> {
        self.begin_labelled_send(topic.label(), topic.prompt())
    }

    /// Begin a quick-ask turn from a button key and label; unknown keys
    /// send the label itself
    ///
    /// # Errors
    ///
    /// As [`ChatScreen::begin_quick_ask`].
    pub fn begin_quick_ask_key(&mut self, key: &str, label: &str) -> Result<RequestEnvelope, ChatError> {
        let prompt = resolve_prompt(key, label);
        self.begin_labelled_send(label, &prompt)
    }

    fn begin_labelled_send(&mut self, label: &str, prompt: &str) -> Result<RequestEnvelope, ChatError> {
        let conversation_id = self
            .conversation_id
            .clone()
            .ok_or(ChatError::NoConversation)?;
        self.guard()?;
        self.transcript.push_user(label);
        self.open_turn();
        Ok(RequestEnvelope::send(conversation_id, prompt))
    }

    fn guard(&self) -> Result<(), ChatError> {
        if self.loading {
            return Err(ChatError::TurnInFlight);
        }
        Ok(())
    }

    fn open_turn(&mut self) {
        self.loading = true;
        self.received_text = false;
        self.last_error = None;
        self.transcript.push_streaming(&self.settings.placeholder);
    }

    fn close_turn(&mut self) {
        self.transcript.finish_last_assistant();
        self.loading = false;
    }

    /// Settle a one-shot `start`
    pub fn apply_start_reply(&mut self, reply: StartReply) {
        tracing::debug!(conversation_id = %reply.conversation_id, "Conversation started");
        self.conversation_id = Some(reply.conversation_id);
        self.transcript.replace_last_assistant(&reply.reply);
        self.close_turn();
    }

    /// Settle a one-shot `send`
    pub fn apply_send_reply(&mut self, reply: SendReply) {
        self.transcript.replace_last_assistant(&reply.reply);
        self.close_turn();
    }

    /// Settle a failed one-shot call
    pub fn apply_one_shot_failure(&mut self, error: &OneShotError) {
        tracing::warn!(error = %error, "One-shot turn failed");
        self.transcript.replace_last_assistant(&self.settings.failure_notice);
        self.last_error = Some(error.to_string());
        self.close_turn();
    }

    /// Clear the conversation: transcript back to the greeting, id forgotten,
    /// in-flight guard released
    ///
    /// Cancel a running session before clearing; its later callbacks would
    /// otherwise land in the fresh transcript.
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.transcript.push_greeting(&self.settings.greeting);
        self.conversation_id = None;
        self.last_error = None;
        self.loading = false;
        self.received_text = false;
    }
}

impl SessionObserver for ChatScreen {
    fn on_meta(&mut self, conversation_id: &str) {
        self.conversation_id = Some(conversation_id.to_string());
    }

    fn on_reply_updated(&mut self, reply: &str) {
        self.received_text = true;
        self.transcript.replace_last_assistant(reply);
    }

    fn on_finished(&mut self) {
        if !self.received_text {
            self.transcript.replace_last_assistant(NO_RESPONSE);
        }
        self.close_turn();
    }

    fn on_failed(&mut self, error: &SessionError) {
        // Partial text already shown stays in place.
        if !self.received_text {
            self.transcript
                .replace_last_assistant(&self.settings.failure_notice);
        }
        self.last_error = Some(error.to_string());
        self.close_turn();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Role;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn contents(screen: &ChatScreen) -> Vec<(Role, String)> {
        screen
            .transcript()
            .messages()
            .iter()
            .map(|m| (m.role, m.content.clone()))
            .collect()
    }

    #[test]
    fn test_fresh_screen_shows_greeting() {
        let screen = ChatScreen::default();
        let first = screen.transcript().last().unwrap();
        assert!(first.is_greeting);
        assert!(!first.truncated);
        assert!(first.content.starts_with("你好呀～"));
        assert!(!screen.is_loading());
    }

    #[test]
    fn test_auto_start_only_once_per_screen() {
        let mut screen = ChatScreen::default();
        assert!(screen.take_auto_start());
        assert!(!screen.take_auto_start());

        let mut reentered = ChatScreen::default();
        assert!(reentered.take_auto_start());
    }

    #[test]
    fn test_send_requires_conversation() {
        let mut screen = ChatScreen::default();
        assert_eq!(screen.begin_send("你好"), Err(ChatError::NoConversation));
        assert_eq!(screen.transcript().len(), 1);
    }

    #[test]
    fn test_blank_message_rejected() {
        let mut screen = ChatScreen::default().with_conversation("c-1");
        assert_eq!(screen.begin_send("   "), Err(ChatError::EmptyMessage));
    }

    #[test]
    fn test_second_turn_while_loading() {
        let mut screen = ChatScreen::default().with_conversation("c-1");
        let envelope = screen.begin_send(" 今年如何 ").unwrap();
        assert_eq!(envelope, RequestEnvelope::send("c-1", "今年如何"));
        assert!(screen.is_loading());
        assert_eq!(screen.begin_send("再问"), Err(ChatError::TurnInFlight));
        assert_eq!(screen.transcript().len(), 3);
    }

    #[test]
    fn test_streamed_turn() {
        let mut screen = ChatScreen::default();
        let envelope = screen.begin_start(json!({"mingpan": {}})).unwrap();
        assert_eq!(envelope.action(), "start");

        screen.on_meta("c-7");
        screen.on_reply_updated("命盘");
        screen.on_reply_updated("命盘解读完成");
        screen.on_finished();

        assert_eq!(screen.conversation_id(), Some("c-7"));
        assert!(!screen.is_loading());
        let last = screen.transcript().last().unwrap();
        assert_eq!(last.content, "命盘解读完成");
        assert!(!last.streaming);
        assert_eq!(screen.transcript().len(), 2);
    }

    #[test]
    fn test_failure_before_text_shows_notice() {
        let mut screen = ChatScreen::default().with_conversation("c-1");
        screen.begin_send("问").unwrap();
        screen.on_failed(&SessionError::Server("boom".into()));

        assert_eq!(
            screen.transcript().last().unwrap().content,
            DEFAULT_FAILURE_NOTICE
        );
        assert_eq!(screen.last_error(), Some("server error: boom"));
        assert!(!screen.is_loading());
    }

    #[test]
    fn test_failure_after_text_keeps_partial() {
        let mut screen = ChatScreen::default().with_conversation("c-1");
        screen.begin_send("问").unwrap();
        screen.on_reply_updated("一半的回答");
        screen.on_failed(&SessionError::Cancelled);
        assert_eq!(screen.transcript().last().unwrap().content, "一半的回答");
    }

    #[test]
    fn test_quick_ask_shows_label_sends_prompt() {
        let mut screen = ChatScreen::default().with_conversation("c-1");
        let envelope = screen.begin_quick_ask(QuickTopic::Health).unwrap();

        assert_eq!(
            envelope,
            RequestEnvelope::send("c-1", QuickTopic::Health.prompt())
        );
        assert_eq!(
            contents(&screen)[1],
            (Role::User, QuickTopic::Health.label().to_string())
        );
        assert_eq!(
            contents(&screen)[2],
            (Role::Assistant, DEFAULT_PLACEHOLDER.to_string())
        );
    }

    #[test]
    fn test_quick_ask_unknown_key_sends_label() {
        let mut screen = ChatScreen::default().with_conversation("c-1");
        let envelope = screen.begin_quick_ask_key("mystery", "随便聊聊").unwrap();
        assert_eq!(envelope, RequestEnvelope::send("c-1", "随便聊聊"));
    }

    #[test]
    fn test_one_shot_start_sets_conversation() {
        let mut screen = ChatScreen::default();
        screen.begin_start(json!({})).unwrap();
        screen.apply_start_reply(StartReply {
            conversation_id: "c-3".into(),
            reply: "\n\n开场解读".into(),
        });

        assert_eq!(screen.conversation_id(), Some("c-3"));
        assert_eq!(screen.transcript().last().unwrap().content, "开场解读");
        assert!(!screen.is_loading());
    }

    #[test]
    fn test_one_shot_failure_shows_notice() {
        let mut screen = ChatScreen::default().with_conversation("c-1");
        screen.begin_send("问").unwrap();
        screen.apply_one_shot_failure(&OneShotError::Status {
            status: 500,
            body: "oops".into(),
        });
        assert_eq!(
            screen.transcript().last().unwrap().content,
            DEFAULT_FAILURE_NOTICE
        );
        assert_eq!(screen.last_error(), Some("HTTP 500: oops"));
    }

    #[test]
    fn test_clear_restores_greeting_and_forgets_conversation() {
        let mut screen = ChatScreen::default().with_conversation("c-1");
        screen.begin_send("问").unwrap();
        screen.on_reply_updated("答");
        screen.on_finished();

        screen.clear();
        assert_eq!(screen.transcript().len(), 1);
        assert!(screen.transcript().messages()[0].is_greeting);
        assert_eq!(screen.conversation_id(), None);
    }

    #[test]
    fn test_clear_releases_in_flight_turn() {
        let mut screen = ChatScreen::default().with_conversation("c-1");
        screen.begin_send("问").unwrap();
        assert!(screen.is_loading());

        screen.clear();
        assert!(!screen.is_loading());

        let mut screen = screen.with_conversation("c-2");
        assert!(screen.begin_send("再问").is_ok());
        assert_eq!(screen.transcript().len(), 3);
    }

    #[test]
    fn test_finished_without_text() {
        let mut screen = ChatScreen::default().with_conversation("c-1");
        screen.begin_send("问").unwrap();
        screen.on_finished();
        assert_eq!(screen.transcript().last().unwrap().content, NO_RESPONSE);
    }

    #[test]
    fn test_sign_in_reveals_reply() {
        let mut screen = ChatScreen::default().with_conversation("c-1");
        screen.begin_send("问").unwrap();
        screen.on_reply_updated(&"解".repeat(80));
        screen.on_finished();
        assert!(screen.transcript().last().unwrap().truncated);

        screen.set_authenticated(true);
        let last = screen.transcript().last().unwrap();
        assert!(!last.truncated);
        assert_eq!(last.content.chars().count(), 80);
    }
}
