//! Agent-to-agent protocol
//!
//! - [`Envelope`]: the Request / Response / Notification message and its wire format
//! - [`AgentAction`]: closed, typed action sets per agent
//! - Typed results returned by each agent

mod action;
mod envelope;
mod types;

pub use action::{AgentAction, AnalystAction, DeveloperAction, TesterAction};
pub use envelope::{
    Envelope, EnvelopeContent, EnvelopeKind, JsonMap, NotificationContent, RequestContent,
    ResponseContent, META_CONVERSATION_ID, META_PARENT_MESSAGE_ID, META_REQUEST_ID,
};
pub use types::{
    decode_result, AgentRole, AnalysisResult, CodeResult, FileSet, TestReport, TestStatus,
};
