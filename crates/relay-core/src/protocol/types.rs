//! Agent roles and typed agent results

use super::envelope::Envelope;
use crate::error::{RelayError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Generated artifact set: file path to file content
pub type FileSet = BTreeMap<String, String>;

/// Agent roles in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    /// The pipeline itself, as the sender of every request
    Orchestrator,
    /// Turns a user utterance into a development task
    Analyst,
    /// Generates, modifies and fixes code
    Developer,
    /// Verifies generated code
    Tester,
}

impl AgentRole {
    /// Logical name used in envelopes and the agent registry
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Orchestrator => "Orchestrator",
            AgentRole::Analyst => "Analyst",
            AgentRole::Developer => "Developer",
            AgentRole::Tester => "Tester",
        }
    }

    /// Agents the orchestrator calls out to
    pub fn workers() -> [AgentRole; 3] {
        [AgentRole::Analyst, AgentRole::Developer, AgentRole::Tester]
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "orchestrator" => Ok(AgentRole::Orchestrator),
            "analyst" => Ok(AgentRole::Analyst),
            "developer" => Ok(AgentRole::Developer),
            "tester" => Ok(AgentRole::Tester),
            _ => Err(format!("Unknown agent role: {}", s)),
        }
    }
}

/// Analyst output for `analyze_request`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Reply shown to the user
    pub message: String,
    /// Development task handed to the Developer
    pub task: String,
    pub status: String,
}

/// Developer output for `generate_code`, `modify_code` and `fix_bug`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeResult {
    /// The complete current file set
    pub files: FileSet,
    pub status: String,
}

/// Verdict of a test run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
        }
    }
}

/// Tester output for `test_code`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub status: TestStatus,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub tests_run: u32,
    #[serde(default)]
    pub tests_passed: u32,
    #[serde(default)]
    pub tests_failed: u32,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

/// Decode an agent's response body into its typed result.
///
/// Agents may answer with the bare domain object or with a Response envelope
/// whose `content.result` holds it. A body carrying `error`, or a Response
/// with status `error`, is reported as [`RelayError::AgentFailure`].
pub fn decode_result<T: DeserializeOwned>(agent: &str, body: Value) -> Result<T> {
    let payload = unwrap_body(agent, body)?;
    serde_json::from_value(payload).map_err(|e| RelayError::malformed_response(agent, e.to_string()))
}

fn unwrap_body(agent: &str, body: Value) -> Result<Value> {
    if body.get("type").and_then(Value::as_str) == Some("response") {
        let envelope = Envelope::from_value(body)?;
        let response = envelope
            .as_response()
            .ok_or_else(|| RelayError::malformed_response(agent, "expected a response envelope"))?;
        if response.status == "error" {
            let message = response
                .error
                .clone()
                .unwrap_or_else(|| "unspecified error".to_string());
            return Err(RelayError::agent_failure(agent, message));
        }
        return response
            .result
            .clone()
            .ok_or_else(|| RelayError::malformed_response(agent, "response envelope has no result"));
    }

    if let Some(message) = body.get("error").and_then(Value::as_str) {
        return Err(RelayError::agent_failure(agent, message));
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_bare_result() {
        let report: TestReport = decode_result(
            "Tester",
            json!({ "status": "failed", "errors": ["e1"], "tests_run": 1, "tests_passed": 0, "tests_failed": 1 }),
        )
        .unwrap();
        assert_eq!(report.status, TestStatus::Failed);
        assert_eq!(report.errors, vec!["e1".to_string()]);
    }

    #[test]
    fn test_decode_counters_default() {
        let report: TestReport =
            decode_result("Tester", json!({ "status": "passed", "errors": [] })).unwrap();
        assert!(report.passed());
        assert_eq!(report.tests_run, 0);
    }

    #[test]
    fn test_decode_wrapped_response() {
        let envelope = Envelope::response(
            "Developer",
            "Orchestrator",
            "success",
            Some(json!({ "files": { "/App.js": "fixed" }, "status": "fixed" })),
            None,
        );
        let result: CodeResult =
            decode_result("Developer", envelope.to_value().unwrap()).unwrap();
        assert_eq!(result.files.get("/App.js").map(String::as_str), Some("fixed"));
    }

    #[test]
    fn test_decode_error_body() {
        let err = decode_result::<CodeResult>("Developer", json!({ "error": "Unknown action: x" }))
            .unwrap_err();
        assert!(matches!(err, RelayError::AgentFailure { .. }));

        let envelope = Envelope::response(
            "Developer",
            "Orchestrator",
            "error",
            None,
            Some("boom".into()),
        );
        let err = decode_result::<CodeResult>("Developer", envelope.to_value().unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_decode_missing_keys() {
        let err = decode_result::<AnalysisResult>("Analyst", json!({ "message": "hi" }))
            .unwrap_err();
        assert!(matches!(err, RelayError::MalformedResponse { .. }));
    }

    #[test]
    fn test_unknown_test_status_rejected() {
        let err = decode_result::<TestReport>("Tester", json!({ "status": "flaky" })).unwrap_err();
        assert!(matches!(err, RelayError::MalformedResponse { .. }));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("tester".parse::<AgentRole>().unwrap(), AgentRole::Tester);
        assert_eq!(AgentRole::Analyst.as_str(), "Analyst");
        assert!("qa".parse::<AgentRole>().is_err());
    }
}
