//! Plain-text transcript export

use koach_api::{ChatMessage, Role};

/// Render a transcript for download: one line per message, `C:` for the
/// user and `B:` for the assistant. Pure and synchronous.
pub fn format_transcript(messages: &[ChatMessage]) -> String {
    let mut text = String::new();
    for message in messages {
        let prefix = match message.role {
            Role::User => "C",
            Role::Assistant => "B",
        };
        text.push_str(prefix);
        text.push_str(": ");
        text.push_str(&message.content);
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_alternating_roles() {
        let messages = vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("Coach: hello"),
            ChatMessage::user("bye"),
        ];
        assert_eq!(
            format_transcript(&messages),
            "C: hi\nB: Coach: hello\nC: bye\n"
        );
    }

    #[test]
    fn test_format_empty_transcript() {
        assert_eq!(format_transcript(&[]), "");
    }
}
