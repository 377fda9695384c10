//! Prompt assembly for the retrieval-augmented path.
//!
//! Message order is fixed: the system instruction, then up to
//! [`HISTORY_WINDOW`] prior turns in chronological order, then one user turn
//! carrying the retrieved context and the question.

use crate::completion::ChatMessage;
use crate::models::{Chunk, ConversationTurn, TurnRole};

/// Maximum number of prior turns sent with a question.
pub const HISTORY_WINDOW: usize = 6;

/// System instruction naming the allowed topics and the hard prohibitions.
pub fn system_instruction(school_name: &str) -> String {
    format!(
        "You are a helpful AI counselor for {school_name}. You ONLY answer questions \
that are directly related to {school_name}: courses offered at the school, graduation \
requirements, school policies, schedules, clubs, athletics, events, counselors, college \
preparation guidance, and general school-related guidance.\n\
\n\
RULES:\n\
- Do not answer general knowledge questions.\n\
- Do not solve homework problems or test questions, or provide answers to assignments.\n\
- Do not answer questions about topics outside of {school_name}.\n\
- Only use information from the provided context.\n\
- Never include links or URLs in your answer; relevant links are added separately.\n\
- If the question is not about the school, politely redirect to school-related topics.\n\
\n\
Be friendly, professional, and accurate. If the context does not contain enough \
information, say so politely and suggest who at the school could help. Be encouraging \
and supportive of students' academic goals."
    )
}

/// The last [`HISTORY_WINDOW`] turns, minus a trailing user turn that
/// repeats `question` (trimmed, case-insensitive).
pub fn trim_history<'a>(history: &'a [ConversationTurn], question: &str) -> &'a [ConversationTurn] {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let recent = &history[start..];
    match recent.last() {
        Some(last)
            if last.role == TurnRole::User
                && last.content.trim().to_lowercase() == question.trim().to_lowercase() =>
        {
            &recent[..recent.len() - 1]
        }
        _ => recent,
    }
}

/// Retrieved chunk texts joined by blank lines.
pub fn build_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Full message list for the completion call.
pub fn assemble_messages(
    school_name: &str,
    history: &[ConversationTurn],
    chunks: &[Chunk],
    question: &str,
) -> Vec<ChatMessage> {
    let trimmed = trim_history(history, question);
    let mut messages = Vec::with_capacity(trimmed.len() + 2);
    messages.push(ChatMessage::system(system_instruction(school_name)));
    messages.extend(trimmed.iter().map(ChatMessage::from));
    messages.push(ChatMessage::user(format!(
        "School documents:\n{}\n\nStudent question: {}\n\nAnswer using only the school documents above.",
        build_context(chunks),
        question.trim()
    )));
    messages
}
