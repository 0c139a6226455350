//! Turn classification

use crate::error::Result;
use crate::protocol::FileSet;
use serde::{Deserialize, Serialize};

/// Words that signal the user wants code built or changed (English and Vietnamese)
const CODE_INTENT_KEYWORDS: &[&str] = &[
    "build", "create", "make", "generate", "code", "app", "component", "website", "page",
    "feature", "implement", "develop", "tạo", "xây dựng", "add", "thêm", "update", "cập nhật",
    "change", "thay đổi", "modify", "sửa", "improve", "cải thiện", "style", "css", "design",
    "đẹp",
];

/// Reply for turns that neither ask for code nor follow up on existing code
pub const GUIDANCE_REPLY: &str = "Hello! I'm here to help you build web applications. You can ask me to create components, apps, or features. For example: 'Build a todo app' or 'Create a counter component'.";

/// What a user turn asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    /// Small talk; answered without contacting any agent
    Conversational,
    /// First generation for this session
    NewProject,
    /// Change to files the session already holds
    FollowUp,
}

/// Case-insensitive keyword match
pub fn has_code_intent(utterance: &str) -> bool {
    let lower = utterance.to_lowercase();
    CODE_INTENT_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Classify a turn given whether the session already has files
pub fn classify(utterance: &str, has_files: bool) -> TurnKind {
    if has_files {
        TurnKind::FollowUp
    } else if has_code_intent(utterance) {
        TurnKind::NewProject
    } else {
        TurnKind::Conversational
    }
}

/// Analyst input for a follow-up turn: prior task, current files, new request
pub fn compose_followup_context(task: &str, files: &FileSet, utterance: &str) -> Result<String> {
    let files_json = serde_json::to_string_pretty(files)?;
    Ok(format!(
        "Previous task: {}\nCurrent code files:\n{}\n\nNew request: {}\n\nPlease modify the existing code to fulfill this new request.",
        task, files_json, utterance
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_case_insensitive() {
        assert!(has_code_intent("BUILD a todo list"));
        assert!(has_code_intent("Could you Design a landing page?"));
        assert!(has_code_intent("Tạo một ứng dụng"));
        assert!(!has_code_intent("hello there"));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("hi!", false), TurnKind::Conversational);
        assert_eq!(classify("Create a counter", false), TurnKind::NewProject);
        assert_eq!(classify("hi!", true), TurnKind::FollowUp);
        assert_eq!(classify("make it blue", true), TurnKind::FollowUp);
    }

    #[test]
    fn test_followup_context_embeds_state() {
        let mut files = FileSet::new();
        files.insert("/App.js".into(), "export default App".into());
        let context = compose_followup_context("todo app", &files, "add a footer").unwrap();
        assert!(context.contains("Previous task: todo app"));
        assert!(context.contains("/App.js"));
        assert!(context.contains("export default App"));
        assert!(context.contains("New request: add a footer"));
    }
}
