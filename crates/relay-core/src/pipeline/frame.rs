//! Client-facing frames
//!
//! Client to server: `{ "content": "..." }`.
//! Server to client: `{ "role", "content", "agent", "files"? }`, emitted as
//! progress happens.

use crate::protocol::FileSet;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Agent label on frames that come from the orchestrator itself
pub const SYSTEM_AGENT: &str = "System";

/// One user utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMessage {
    pub content: String,
}

/// Role of a server to client frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameRole {
    Assistant,
    System,
}

/// A progress frame sent to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFrame {
    pub role: FrameRole,
    pub content: String,
    pub agent: String,
    /// Present only when the frame carries an updated artifact set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<FileSet>,
}

impl ClientFrame {
    pub fn assistant(agent: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: FrameRole::Assistant,
            content: content.into(),
            agent: agent.into(),
            files: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: FrameRole::System,
            content: content.into(),
            agent: SYSTEM_AGENT.to_string(),
            files: None,
        }
    }

    /// Frame reporting a failed turn
    pub fn error(reason: impl std::fmt::Display) -> Self {
        Self::system(format!("Error: {}", reason))
    }

    pub fn with_files(mut self, files: FileSet) -> Self {
        self.files = Some(files);
        self
    }
}

/// Where a pipeline run streams its frames
pub type FrameSender = mpsc::Sender<ClientFrame>;
