//! Prompt construction for the interviewer model.
//!
//! [`build_prompt`] is a pure function of the interview title, its skills and
//! the ordered message history. Identical inputs always produce an identical
//! [`Prompt`].

use crate::store::{InterviewTitle, InterviewWithMessages, Message, MessageRole};

use serde::Serialize;

/// Sent in place of history when the candidate has not spoken yet.
const OPENING_INSTRUCTION: &str =
    "The candidate has just joined. Greet them briefly and ask your first interview question.";

/// One chat turn in provider wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    pub role: &'static str,
    pub content: String,
}

/// Full conversation context handed to the response generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub messages: Vec<PromptMessage>,
}

impl Prompt {
    /// Number of history turns after the system message.
    pub fn turns(&self) -> usize {
        self.messages.len().saturating_sub(1)
    }
}

pub fn build_prompt(title: InterviewTitle, skills: &[String], history: &[Message]) -> Prompt {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(PromptMessage {
        role: "system",
        content: system_message(title, skills),
    });

    if history.is_empty() {
        messages.push(PromptMessage {
            role: "user",
            content: OPENING_INSTRUCTION.to_string(),
        });
    } else {
        messages.extend(history.iter().map(|message| PromptMessage {
            role: message.role.as_str(),
            content: message.content.clone(),
        }));
    }

    Prompt { messages }
}

/// Convenience wrapper over a freshly read interview.
pub fn prompt_for(interview: &InterviewWithMessages) -> Prompt {
    build_prompt(
        interview.interview.title,
        &interview.interview.skills,
        &interview.messages,
    )
}

fn system_message(title: InterviewTitle, skills: &[String]) -> String {
    format!(
        "You are an experienced interviewer conducting a spoken mock interview for a {role} position.\n\
         Assess the candidate on these skills, in this order of priority: {skills}.\n\
         Ask exactly one question at a time and wait for the candidate's answer before moving on.\n\
         Follow up on vague or incomplete answers. Keep each reply short and conversational, \
         since it will be read aloud. Do not use markdown, lists or code blocks.",
        role = title.display_name(),
        skills = skills.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn message(role: MessageRole, content: &str) -> Message {
        Message {
            id: format!("{}-{}", role, content.len()),
            interview_id: "interview-1".to_string(),
            role,
            content: content.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        }
    }

    fn skills() -> Vec<String> {
        vec!["SQL".to_string(), "Communication".to_string()]
    }

    #[test]
    fn test_system_message_names_role_and_skills_in_order() {
        let prompt = build_prompt(InterviewTitle::SystemArchitect, &skills(), &[]);
        let system = &prompt.messages[0];
        assert_eq!(system.role, "system");
        assert!(system.content.contains("System Architect"));
        assert!(system.content.contains("SQL, Communication"));
        assert!(system.content.contains("one question at a time"));
    }

    #[test]
    fn test_empty_history_gets_opening_instruction() {
        let prompt = build_prompt(InterviewTitle::BackendDeveloper, &skills(), &[]);
        assert_eq!(prompt.messages.len(), 2);
        assert_eq!(prompt.messages[1].role, "user");
        assert_eq!(prompt.messages[1].content, OPENING_INSTRUCTION);
    }

    #[test]
    fn test_history_is_kept_in_order_with_roles() {
        let history = vec![
            message(MessageRole::User, "Hello"),
            message(MessageRole::Assistant, "Tell me about indexes."),
            message(MessageRole::System, "Candidate reconnected."),
            message(MessageRole::User, "A B-tree keeps keys sorted."),
        ];
        let prompt = build_prompt(InterviewTitle::SystemArchitect, &skills(), &history);

        assert_eq!(prompt.turns(), 4);
        let roles: Vec<_> = prompt.messages.iter().skip(1).map(|m| m.role).collect();
        assert_eq!(roles, vec!["user", "assistant", "system", "user"]);
        assert_eq!(prompt.messages[4].content, "A B-tree keeps keys sorted.");
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let history = vec![message(MessageRole::User, "Hello")];
        let first = build_prompt(InterviewTitle::DataScientist, &skills(), &history);
        let second = build_prompt(InterviewTitle::DataScientist, &skills(), &history);
        assert_eq!(first, second);
    }
}
