//! Per-connection session state

use crate::protocol::FileSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One entry in the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Mutable state of one client connection across turns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Stable for the connection's lifetime
    conversation_id: String,
    /// Latest complete artifact set
    current_files: FileSet,
    /// Append-only
    conversation_history: Vec<ChatMessage>,
    /// Task from the turn that first generated code
    current_task: String,
}

impl SessionContext {
    /// Fresh context with a generated conversation ID
    pub fn new() -> Self {
        Self::with_conversation_id(format!("conv_{}", Uuid::new_v4()))
    }

    /// Fresh context with a known conversation ID
    pub fn with_conversation_id(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            current_files: FileSet::new(),
            conversation_history: Vec::new(),
            current_task: String::new(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn current_files(&self) -> &FileSet {
        &self.current_files
    }

    pub fn conversation_history(&self) -> &[ChatMessage] {
        &self.conversation_history
    }

    pub fn current_task(&self) -> &str {
        &self.current_task
    }

    /// Whether a previous turn already produced code
    pub fn has_files(&self) -> bool {
        !self.current_files.is_empty()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.conversation_history.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.conversation_history.push(ChatMessage::assistant(content));
    }

    /// Replace the artifact set wholesale
    pub fn replace_files(&mut self, files: FileSet) {
        self.current_files = files;
    }

    /// Commit the result of a first generation: files and the task they implement
    pub fn commit_generation(&mut self, files: FileSet, task: impl Into<String>) {
        self.current_files = files;
        self.current_task = task.into();
    }

    /// Drop files, history and task; the conversation ID stays
    pub fn reset(&mut self) {
        self.current_files.clear();
        self.conversation_history.clear();
        self.current_task.clear();
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
