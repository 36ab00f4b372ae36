//! Prompt assembly for the study assistant.

use super::{ChatMessage, ChatRole, ChatTurn};
use crate::catalog::Module;

const PERSONA: &str = "You are the TutorHub study assistant for university students. \
Explain concepts step by step and check understanding with short questions. \
Do not hand over complete solutions to assessed coursework; guide the student instead. \
If a question needs a human, suggest requesting a tutor.";

/// System prompt, optionally scoped to a module.
pub fn system_prompt(module: Option<&Module>) -> String {
    match module {
        Some(m) => format!(
            "{} The student is asking about {} ({}).",
            PERSONA, m.code, m.title
        ),
        None => PERSONA.to_string(),
    }
}

/// System turn followed by the last `max_history` stored turns.
pub fn build_prompt(module: Option<&Module>, history: &[ChatMessage], max_history: usize) -> Vec<ChatTurn> {
    let skip = history.len().saturating_sub(max_history.max(1));
    let mut turns = Vec::with_capacity(history.len() - skip + 1);
    turns.push(ChatTurn::new(ChatRole::System, system_prompt(module)));
    turns.extend(
        history[skip..]
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| ChatTurn::new(m.role, m.content.clone())),
    );
    turns
}

/// Conversation title from the first question.
pub fn title_from(text: &str) -> String {
    const MAX: usize = 60;
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() <= MAX {
        line.to_string()
    } else {
        let cut: String = line.chars().take(MAX - 3).collect();
        format!("{}...", cut.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stored(role: ChatRole, content: &str) -> ChatMessage {
        ChatMessage {
            id: content.to_string(),
            conversation_id: "c".into(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_history_is_truncated_to_latest() {
        let history: Vec<ChatMessage> = (0..5)
            .map(|i| stored(if i % 2 == 0 { ChatRole::User } else { ChatRole::Assistant }, &format!("t{}", i)))
            .collect();
        let turns = build_prompt(None, &history, 2);
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, ChatRole::System);
        assert_eq!(turns[1].content, "t3");
        assert_eq!(turns[2].content, "t4");
    }

    #[test]
    fn test_module_context() {
        let module = Module {
            id: "m".into(),
            code: "COMP2001".into(),
            title: "Algorithms".into(),
            description: String::new(),
            created_at: Utc::now(),
        };
        assert!(system_prompt(Some(&module)).contains("COMP2001 (Algorithms)"));
        assert!(!system_prompt(None).contains("asking about"));
    }

    #[test]
    fn test_title_from() {
        assert_eq!(title_from("What is Big-O?\nMore detail"), "What is Big-O?");
        let long = title_from(&"word ".repeat(30));
        assert!(long.ends_with("..."));
        assert!(long.chars().count() <= 60);
    }
}
