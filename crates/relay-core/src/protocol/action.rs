//! Typed agent actions
//!
//! Each agent accepts a closed set of actions. On the wire an action is the
//! `action` / `parameters` pair inside a request envelope's content.

use super::envelope::{Envelope, JsonMap};
use super::types::{AgentRole, FileSet};
use crate::error::{RelayError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A closed set of actions understood by one agent
pub trait AgentAction: Serialize + DeserializeOwned + Sized {
    /// Agent that handles these actions
    const AGENT: AgentRole;

    /// Every action name in the set
    const ACTIONS: &'static [&'static str];

    /// Wire name of this action
    fn name(&self) -> &'static str;

    /// Build a request envelope addressed to [`Self::AGENT`]
    fn into_request(self, from: &str) -> Result<Envelope> {
        let name = self.name();
        let parameters = match serde_json::to_value(&self)? {
            Value::Object(mut tagged) => match tagged.remove("parameters") {
                Some(Value::Object(parameters)) => parameters,
                _ => JsonMap::new(),
            },
            _ => JsonMap::new(),
        };
        Ok(Envelope::request(from, Self::AGENT.as_str(), name, parameters))
    }

    /// Decode an incoming request on the agent side.
    ///
    /// An action outside [`Self::ACTIONS`] is [`RelayError::UnknownAction`];
    /// parameters that do not fit the action are [`RelayError::MalformedEnvelope`].
    fn from_request(envelope: &Envelope) -> Result<Self> {
        let request = envelope.as_request().ok_or_else(|| {
            RelayError::malformed(format!("expected a request, got a {}", envelope.kind()))
        })?;

        if !Self::ACTIONS.contains(&request.action.as_str()) {
            return Err(RelayError::UnknownAction {
                agent: Self::AGENT.as_str().to_string(),
                action: request.action.clone(),
            });
        }

        let tagged = serde_json::json!({
            "action": request.action,
            "parameters": request.parameters,
        });
        serde_json::from_value(tagged).map_err(|e| {
            RelayError::malformed(format!("invalid parameters for {}: {}", request.action, e))
        })
    }
}

/// Actions handled by the Analyst
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "parameters", rename_all = "snake_case")]
pub enum AnalystAction {
    AnalyzeRequest { user_request: String },
}

impl AgentAction for AnalystAction {
    const AGENT: AgentRole = AgentRole::Analyst;
    const ACTIONS: &'static [&'static str] = &["analyze_request"];

    fn name(&self) -> &'static str {
        match self {
            AnalystAction::AnalyzeRequest { .. } => "analyze_request",
        }
    }
}

/// Actions handled by the Developer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "parameters", rename_all = "snake_case")]
pub enum DeveloperAction {
    /// Build a new project from scratch
    GenerateCode { task: String },
    /// Change an existing project
    ModifyCode {
        current_files: FileSet,
        modification_request: String,
        task_context: String,
    },
    /// Repair files given the tester's errors
    FixBug { files: FileSet, errors: Vec<String> },
}

impl AgentAction for DeveloperAction {
    const AGENT: AgentRole = AgentRole::Developer;
    const ACTIONS: &'static [&'static str] = &["generate_code", "modify_code", "fix_bug"];

    fn name(&self) -> &'static str {
        match self {
            DeveloperAction::GenerateCode { .. } => "generate_code",
            DeveloperAction::ModifyCode { .. } => "modify_code",
            DeveloperAction::FixBug { .. } => "fix_bug",
        }
    }
}

/// Actions handled by the Tester
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "parameters", rename_all = "snake_case")]
pub enum TesterAction {
    TestCode { files: FileSet },
}

impl AgentAction for TesterAction {
    const AGENT: AgentRole = AgentRole::Tester;
    const ACTIONS: &'static [&'static str] = &["test_code"];

    fn name(&self) -> &'static str {
        match self {
            TesterAction::TestCode { .. } => "test_code",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_into_request_shape() {
        let mut files = FileSet::new();
        files.insert("/App.js".into(), "code".into());
        let envelope = DeveloperAction::FixBug {
            files,
            errors: vec!["e1".into()],
        }
        .into_request("Orchestrator")
        .unwrap();

        assert_eq!(envelope.to_agent, "Developer");
        let request = envelope.as_request().unwrap();
        assert_eq!(request.action, "fix_bug");
        assert_eq!(
            Value::Object(request.parameters.clone()),
            json!({ "files": { "/App.js": "code" }, "errors": ["e1"] })
        );
    }

    #[test]
    fn test_from_request_roundtrip() {
        let action = AnalystAction::AnalyzeRequest {
            user_request: "Build a todo app".into(),
        };
        let envelope = action.clone().into_request("Orchestrator").unwrap();
        assert_eq!(AnalystAction::from_request(&envelope).unwrap(), action);
    }

    #[test]
    fn test_unknown_action() {
        let envelope = Envelope::request("Orchestrator", "Tester", "deploy", JsonMap::new());
        let err = TesterAction::from_request(&envelope).unwrap_err();
        match err {
            RelayError::UnknownAction { agent, action } => {
                assert_eq!(agent, "Tester");
                assert_eq!(action, "deploy");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_parameters() {
        let envelope = Envelope::request("Orchestrator", "Developer", "generate_code", JsonMap::new());
        let err = DeveloperAction::from_request(&envelope).unwrap_err();
        assert!(matches!(err, RelayError::MalformedEnvelope(_)));
    }

    #[test]
    fn test_from_request_rejects_response() {
        let envelope = Envelope::response("Tester", "Orchestrator", "success", None, None);
        assert!(TesterAction::from_request(&envelope).is_err());
    }

    #[test]
    fn test_action_names_cover_variants() {
        let names: Vec<_> = [
            DeveloperAction::GenerateCode { task: String::new() },
            DeveloperAction::ModifyCode {
                current_files: FileSet::new(),
                modification_request: String::new(),
                task_context: String::new(),
            },
            DeveloperAction::FixBug {
                files: FileSet::new(),
                errors: Vec::new(),
            },
        ]
        .iter()
        .map(|a| a.name())
        .collect();
        assert_eq!(names, DeveloperAction::ACTIONS.to_vec());
    }
}
