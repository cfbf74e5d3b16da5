//! Prompt assembly for a tutoring turn.
//!
//! Produces the ordered message list sent to the generation provider:
//! one system entry, a window of recent thread history, then the
//! current question wrapped in a context-aware template.

use coursepilot_core::chat::{ChatMessage, Sender};
use coursepilot_core::provider::PromptMessage;

/// The marker the model must prepend to answers not grounded in course
/// material. The classifier looks for it case-insensitively.
pub const OUTSIDE_MARKER: &str = "[Outside Course Material]";

/// How many prior thread messages are carried into the prompt.
///
/// A fixed count, not token-aware: six very long messages can still
/// produce an oversized prompt. Known limitation.
pub const HISTORY_WINDOW: usize = 6;

/// The default tutoring policy, used when no override is supplied.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI tutor. Your primary goal is to help students understand course material.

IMPORTANT RULES:
1. Always base your answers on the provided course materials when available.
2. If you cite information from course materials, reference the specific source (e.g., \"According to Lecture 3, page 12...\").
3. If you cannot answer from course materials, you may provide general knowledge BUT you must clearly label it by starting with \"[Outside Course Material]\".
4. Never fabricate citations or make up page numbers.
5. Be encouraging and supportive to students.
6. If a student seems confused, break down concepts into smaller parts.";

/// Assemble the outgoing prompt.
///
/// `history` is the prior thread messages in chronological order; only
/// the last [`HISTORY_WINDOW`] are included, with their original roles.
/// `context` is the formatted passage block ("" when retrieval found
/// nothing), which selects between the grounded and ungrounded user
/// templates.
pub fn build(
    user_text: &str,
    context: &str,
    history: &[ChatMessage],
    system_override: Option<&str>,
) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(history.len().min(HISTORY_WINDOW) + 2);

    messages.push(PromptMessage::system(
        system_override.unwrap_or(DEFAULT_SYSTEM_PROMPT),
    ));

    let start = history.len().saturating_sub(HISTORY_WINDOW);
    for msg in &history[start..] {
        messages.push(match msg.sender {
            Sender::User => PromptMessage::user(&*msg.text),
            Sender::Assistant => PromptMessage::assistant(&*msg.text),
        });
    }

    let user_content = if context.is_empty() {
        format!(
            "Student question: {user_text}\n\n\
             Note: No relevant course materials were found for this question. \
             If you can answer from general knowledge, please clearly label your \
             response as \"{OUTSIDE_MARKER}\"."
        )
    } else {
        format!(
            "Based on the following course materials:\n\n\
             {context}\n\n\
             Student question: {user_text}\n\n\
             Please answer based on the course materials above. If the materials \
             don't contain relevant information, you may provide general knowledge \
             but clearly label it as \"{OUTSIDE_MARKER}\"."
        )
    };
    messages.push(PromptMessage::user(user_content));

    messages
}
