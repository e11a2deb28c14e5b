//! Message formatting for terminal display.

use chrono::{TimeZone, Utc};

use crate::protocol::{CHANNELS, MessagePayload};

/// Message formatter for client display.
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format a chat message as `[HH:MM:SS] name: text`, with the role
    /// tag appended when present.
    pub fn format_message(message: &MessagePayload) -> String {
        let role_tag = message
            .role
            .as_deref()
            .map(|role| format!(" [{}]", role))
            .unwrap_or_default();
        format!(
            "\n[{}] {}{}: {}\n",
            format_time(message.timestamp),
            message.sender_name,
            role_tag,
            message.text
        )
    }

    /// Typing notice for a peer, identified by connection id. Ids are
    /// opaque uuids, so show only a short prefix.
    pub fn format_typing(connection_id: &str) -> String {
        format!("\n· {} is typing...\n", short_id(connection_id))
    }

    pub fn format_stop_typing(connection_id: &str) -> String {
        format!("\n· {} stopped typing\n", short_id(connection_id))
    }

    /// Notice shown after switching rooms.
    pub fn format_room_change(room: &str) -> String {
        format!("\n-- now in #{} --\n", room)
    }

    pub fn format_room_left(room: &str) -> String {
        format!("\n-- left #{} (join a room to chat) --\n", room)
    }

    /// The advisory channel list shown by `/rooms`.
    pub fn format_channels() -> String {
        let mut output = String::from("\nChannels:\n");
        for channel in CHANNELS {
            output.push_str(&format!("  #{}\n", channel));
        }
        output.push_str("Use /join <room> to switch.\n");
        output
    }
}

fn format_time(timestamp_millis: i64) -> String {
    match Utc.timestamp_millis_opt(timestamp_millis).single() {
        Some(dt) => dt.format("%H:%M:%S").to_string(),
        None => "??:??:??".to_string(),
    }
}

fn short_id(connection_id: &str) -> String {
    connection_id.chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> MessagePayload {
        MessagePayload {
            id: "m-1".to_string(),
            text: "hello there".to_string(),
            sender_id: "user-1".to_string(),
            sender_name: "Alice".to_string(),
            timestamp: 1700000000000,
            room: "general".to_string(),
            role: None,
        }
    }

    #[test]
    fn test_format_message_shows_name_and_text() {
        // given:
        let message = sample_message();

        // when:
        let formatted = MessageFormatter::format_message(&message);

        // then:
        assert!(formatted.contains("Alice: hello there"));
        assert!(!formatted.contains("RECRUITER"));
    }

    #[test]
    fn test_format_message_includes_role_tag() {
        // given:
        let mut message = sample_message();
        message.role = Some("RECRUITER".to_string());

        // when:
        let formatted = MessageFormatter::format_message(&message);

        // then:
        assert!(formatted.contains("Alice [RECRUITER]: hello there"));
    }

    #[test]
    fn test_format_typing_shortens_connection_id() {
        // given:
        let id = "6f7a1f1e-1234-5678-9abc-def012345678";

        // when:
        let formatted = MessageFormatter::format_typing(id);

        // then:
        assert!(formatted.contains("6f7a1f1e"));
        assert!(!formatted.contains("def012345678"));
    }

    #[test]
    fn test_format_channels_lists_all_advisory_channels() {
        // when:
        let formatted = MessageFormatter::format_channels();

        // then:
        for channel in CHANNELS {
            assert!(formatted.contains(&format!("#{}", channel)));
        }
    }
}
