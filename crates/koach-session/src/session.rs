//! Per-conversation state and the turn reconciler

use std::collections::BTreeSet;

use futures::StreamExt;
use koach_api::{ChatMessage, ChatRequest, ProfileSnapshot, ReplyEvent, Role};

use crate::{
    error::{Error, Result},
    transport::CoachTransport,
};

/// State of one conversation. Single writer (the turn in progress), no
/// globals; discarded when the UI session ends.
pub struct Session {
    /// Opaque conversation identifier, generated once
    pub session_id: String,
    /// Canonical user id
    pub user_id: String,
    /// Agent confirmed by the backend on the last streamed reply
    pub current_agent_id: Option<String>,
    /// Conversation transcript, append-only during a turn
    pub messages: Vec<ChatMessage>,
    /// Last transport-level failure, kept for display
    pub last_error: Option<String>,
    /// Most recent profile fetch, kept for the next diff
    pub profile: Option<ProfileSnapshot>,
}

impl Session {
    /// Start a conversation for a user
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            current_agent_id: None,
            messages: Vec::new(),
            last_error: None,
            profile: None,
        }
    }

    /// Run one turn: append the user message, submit the stripped
    /// transcript, and stream the reply. `on_fragment` is called with each
    /// display fragment as it arrives.
    ///
    /// A transport-level failure (non-2xx, connection error, or a stream
    /// that dies mid-reply) is stored in `last_error` and not raised; the
    /// transcript keeps the user message and gains no assistant message.
    /// Any other failure propagates.
    pub async fn send_with_handler<F>(
        &mut self,
        transport: &dyn CoachTransport,
        text: impl Into<String>,
        selected_agent: Option<&str>,
        mut on_fragment: F,
    ) -> Result<()>
    where
        F: FnMut(&str),
    {
        self.last_error = None;
        self.messages.push(ChatMessage::user(text));

        let request = ChatRequest {
            user_id: self.user_id.clone(),
            messages: self.outbound_messages(),
            stream: true,
            session_id: self.session_id.clone(),
            previous_agent_id: self.current_agent_id.clone(),
            agent_id: selected_agent.map(ToString::to_string),
        };

        let mut reply = match transport.stream_chat(&request).await {
            Ok(stream) => stream,
            Err(e) if e.is_transport() => {
                tracing::warn!(error = %e, "chat request failed");
                self.last_error = Some(e.to_string());
                return Ok(());
            }
            Err(e) => return Err(Error::Api(e)),
        };

        while let Some(event) = reply.next().await {
            match event {
                ReplyEvent::Fragment { text } => on_fragment(&text),
                ReplyEvent::Done { agent_id, text } => {
                    let content = if text.is_empty() {
                        // Zero-fragment reply: no header was streamed, so
                        // fold one in here. The decoder's fallback agent id
                        // only applies when no agent was ever confirmed.
                        let agent = self.current_agent_id.clone().unwrap_or(agent_id);
                        format!("{agent}: ")
                    } else {
                        self.current_agent_id = Some(agent_id);
                        text
                    };
                    self.messages.push(ChatMessage::assistant(content));
                }
                ReplyEvent::Error { message } => {
                    tracing::warn!(error = %message, "reply stream failed");
                    self.last_error = Some(message);
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    /// The transcript as sent upstream: assistant contents with the
    /// client-added `"{agent_id}: "` display prefix stripped
    pub fn outbound_messages(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .map(|message| match message.role {
                Role::Assistant => {
                    ChatMessage::assistant(strip_agent_prefix(&message.content))
                }
                Role::User => message.clone(),
            })
            .collect()
    }

    /// Swap in a fresh profile snapshot and return the names of fields
    /// that newly gained a value since the previous one. The first fetch
    /// of a session has no previous snapshot and reports nothing.
    pub fn refresh_profile(&mut self, snapshot: ProfileSnapshot) -> BTreeSet<String> {
        let updated = match &self.profile {
            Some(previous) => snapshot.newly_completed(previous),
            None => BTreeSet::new(),
        };
        self.profile = Some(snapshot);
        updated
    }
}

/// Strip the leading `"{agent_id}: "` display prefix from an assistant
/// message: everything after the first `": "`, or the whole content when
/// there is no separator.
pub fn strip_agent_prefix(content: &str) -> &str {
    content
        .split_once(": ")
        .map_or(content, |(_, rest)| rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use koach_api::ReplyEventStream;
    use std::sync::Mutex;

    /// Transport that replays a scripted reply and records the request
    struct ScriptedTransport {
        events: Vec<ReplyEvent>,
        seen: Mutex<Option<ChatRequest>>,
    }

    impl ScriptedTransport {
        fn new(events: Vec<ReplyEvent>) -> Self {
            Self {
                events,
                seen: Mutex::new(None),
            }
        }

        fn request(&self) -> ChatRequest {
            self.seen.lock().unwrap().clone().unwrap()
        }
    }

    #[async_trait]
    impl CoachTransport for ScriptedTransport {
        async fn stream_chat(
            &self,
            request: &ChatRequest,
        ) -> koach_api::Result<ReplyEventStream> {
            *self.seen.lock().unwrap() = Some(request.clone());
            Ok(Box::pin(stream::iter(self.events.clone())))
        }
    }

    /// Transport that always fails with a given API error
    struct FailingTransport(u16, &'static str);

    #[async_trait]
    impl CoachTransport for FailingTransport {
        async fn stream_chat(
            &self,
            _request: &ChatRequest,
        ) -> koach_api::Result<ReplyEventStream> {
            Err(koach_api::Error::api(self.0, self.1))
        }
    }

    fn scripted_reply(agent: &str, pieces: &[&str]) -> Vec<ReplyEvent> {
        let mut events = vec![ReplyEvent::Fragment {
            text: format!("{agent}: "),
        }];
        let mut text = format!("{agent}: ");
        for piece in pieces {
            events.push(ReplyEvent::Fragment {
                text: piece.to_string(),
            });
            text.push_str(piece);
        }
        events.push(ReplyEvent::Done {
            agent_id: agent.to_string(),
            text,
        });
        events
    }

    // -- strip_agent_prefix --

    #[test]
    fn test_strip_removes_display_prefix() {
        assert_eq!(strip_agent_prefix("Coach: hello"), "hello");
    }

    #[test]
    fn test_strip_without_separator_is_identity() {
        assert_eq!(strip_agent_prefix("hello"), "hello");
    }

    #[test]
    fn test_strip_only_first_separator() {
        assert_eq!(strip_agent_prefix("Coach: note: remember"), "note: remember");
    }

    // -- turns --

    #[tokio::test]
    async fn test_turn_appends_both_messages() {
        let transport = ScriptedTransport::new(scripted_reply("Coach", &["Hel", "lo"]));
        let mut session = Session::new("user-1");
        let mut rendered = String::new();

        session
            .send_with_handler(&transport, "hi", None, |fragment| {
                rendered.push_str(fragment);
            })
            .await
            .unwrap();

        assert_eq!(rendered, "Coach: Hello");
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, "Coach: Hello");
        assert_eq!(session.current_agent_id.as_deref(), Some("Coach"));
        assert!(session.last_error.is_none());
    }

    #[tokio::test]
    async fn test_outbound_transcript_is_stripped() {
        let transport = ScriptedTransport::new(scripted_reply("Coach", &["Sure"]));
        let mut session = Session::new("user-1");
        session.messages.push(ChatMessage::user("hi"));
        session.messages.push(ChatMessage::assistant("Coach: hello"));

        session
            .send_with_handler(&transport, "thanks", None, |_| {})
            .await
            .unwrap();

        let request = transport.request();
        assert_eq!(request.messages[1].content, "hello");
        assert_eq!(request.messages[2].content, "thanks");
        assert!(request.stream);
        assert_eq!(request.user_id, "user-1");
        assert_eq!(request.session_id, session.session_id);
    }

    #[tokio::test]
    async fn test_agent_selection_and_previous_agent() {
        let transport = ScriptedTransport::new(scripted_reply("Interviewer", &["Ok"]));
        let mut session = Session::new("user-1");
        session.current_agent_id = Some("Coach".to_string());

        session
            .send_with_handler(&transport, "switch", Some("Interviewer"), |_| {})
            .await
            .unwrap();

        let request = transport.request();
        assert_eq!(request.previous_agent_id.as_deref(), Some("Coach"));
        assert_eq!(request.agent_id.as_deref(), Some("Interviewer"));
        // Backend-confirmed agent wins once streaming has started.
        assert_eq!(session.current_agent_id.as_deref(), Some("Interviewer"));
    }

    #[tokio::test]
    async fn test_transport_error_is_stored_not_raised() {
        let transport = FailingTransport(500, r#"overloaded"#);
        let mut session = Session::new("user-1");

        let mut called = false;
        session
            .send_with_handler(&transport, "hi", None, |_| called = true)
            .await
            .unwrap();

        assert!(!called);
        let error = session.last_error.as_deref().unwrap();
        assert!(error.contains("overloaded"), "{error}");
        // The user message survives; no assistant message is appended.
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_mid_stream_error_is_stored() {
        let transport = ScriptedTransport::new(vec![
            ReplyEvent::Fragment {
                text: "Coach: ".to_string(),
            },
            ReplyEvent::Error {
                message: "stream error: connection reset".to_string(),
            },
        ]);
        let mut session = Session::new("user-1");

        session
            .send_with_handler(&transport, "hi", None, |_| {})
            .await
            .unwrap();

        assert!(session.last_error.as_deref().unwrap().contains("connection reset"));
        assert_eq!(session.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_reply_appends_empty_assistant_message() {
        let transport = ScriptedTransport::new(vec![ReplyEvent::Done {
            agent_id: koach_api::DEFAULT_AGENT_ID.to_string(),
            text: String::new(),
        }]);
        let mut session = Session::new("user-1");

        session
            .send_with_handler(&transport, "hi", None, |_| {})
            .await
            .unwrap();

        assert_eq!(session.messages[1].content, "Default: ");
        // The decoder's fallback never overwrites a confirmed agent.
        assert_eq!(session.current_agent_id, None);
    }

    #[tokio::test]
    async fn test_empty_reply_keeps_confirmed_agent() {
        let transport = ScriptedTransport::new(vec![ReplyEvent::Done {
            agent_id: koach_api::DEFAULT_AGENT_ID.to_string(),
            text: String::new(),
        }]);
        let mut session = Session::new("user-1");
        session.current_agent_id = Some("Coach".to_string());

        session
            .send_with_handler(&transport, "hi", None, |_| {})
            .await
            .unwrap();

        assert_eq!(session.messages[1].content, "Coach: ");
        assert_eq!(session.current_agent_id.as_deref(), Some("Coach"));
    }

    // -- profile refresh --

    #[tokio::test]
    async fn test_profile_refresh_reports_new_fields_once() {
        let mut session = Session::new("user-1");

        let first: ProfileSnapshot =
            serde_json::from_str(r#"{"vision":null,"mission":"m"}"#).unwrap();
        assert!(session.refresh_profile(first).is_empty());

        let second: ProfileSnapshot =
            serde_json::from_str(r#"{"vision":"v","mission":"m"}"#).unwrap();
        let updated = session.refresh_profile(second);
        assert_eq!(updated, BTreeSet::from(["vision".to_string()]));

        // Same snapshot again: nothing newly appeared.
        let third: ProfileSnapshot =
            serde_json::from_str(r#"{"vision":"v","mission":"m"}"#).unwrap();
        assert!(session.refresh_profile(third).is_empty());
    }
}
