//! Conversation history management for the document agent (spec §4.7 step
//! 5: "Conversation history is prepended as prior turns, truncated to
//! `MAX_HISTORY_TURNS`").
//!
//! Grounded on the teacher's `legalis-llm/src/conversation.rs` `Role`/
//! `Message` pair, narrowed to the core's plain `(query, answer)` turn
//! representation (`contractos_core::session::ReasoningSession::conversation_history`)
//! rather than the teacher's full metadata-bearing message log.

use contractos_core::session::truncate_history;

use crate::provider::Message;

/// Converts a session's `(query, answer)` turn history into alternating
/// user/assistant messages, truncated to the most recent `max_turns`.
pub fn history_to_messages(history: &[(String, String)], max_turns: usize) -> Vec<Message> {
    truncate_history(history, max_turns)
        .into_iter()
        .flat_map(|(query, answer)| [Message::user(query), Message::assistant(answer)])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_each_turn_into_a_user_assistant_pair() {
        let history = vec![("who is the buyer?".to_string(), "Alpha Corp".to_string())];
        let messages = history_to_messages(&history, 10);
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn truncates_to_max_turns_before_converting() {
        let history: Vec<(String, String)> = (0..20).map(|i| (format!("q{i}"), format!("a{i}"))).collect();
        let messages = history_to_messages(&history, 3);
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0].content, "q17");
    }
}
