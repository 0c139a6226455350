//! Pipeline stages and the per-turn run record

use super::intent::TurnKind;
use crate::protocol::TestStatus;
use serde::{Deserialize, Serialize};

/// Fix/retest cycles allowed per turn
pub const MAX_FIX_ATTEMPTS: u32 = 1;

/// Pipeline state machine stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Analyzing,
    Generating,
    Modifying,
    Testing,
    TestFailed,
    Fixing,
    Retesting,
    Reporting,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    /// Legal forward transitions. `Failed` is reachable from every non-terminal stage.
    pub fn can_transition_to(&self, next: Stage) -> bool {
        use Stage::*;
        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Idle, Analyzing)
                | (Idle, Done)
                | (Analyzing, Generating)
                | (Analyzing, Modifying)
                | (Generating, Testing)
                | (Modifying, Testing)
                | (Testing, TestFailed)
                | (Testing, Reporting)
                | (TestFailed, Fixing)
                | (Fixing, Retesting)
                | (Retesting, Reporting)
                | (Reporting, Done)
        )
    }
}

/// Transient record of one turn's execution
#[derive(Debug, Clone)]
pub struct PipelineRun {
    kind: TurnKind,
    stage: Stage,
    fix_attempts: u32,
    verdict: Option<TestStatus>,
    trace: Vec<Stage>,
}

impl PipelineRun {
    pub fn new(kind: TurnKind) -> Self {
        Self {
            kind,
            stage: Stage::Idle,
            fix_attempts: 0,
            verdict: None,
            trace: vec![Stage::Idle],
        }
    }

    pub fn kind(&self) -> TurnKind {
        self.kind
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn fix_attempts(&self) -> u32 {
        self.fix_attempts
    }

    /// Whether another fix/retest cycle is allowed
    pub fn can_fix(&self) -> bool {
        self.fix_attempts < MAX_FIX_ATTEMPTS
    }

    /// Move to `next`, recording it in the trace
    pub fn advance(&mut self, next: Stage) {
        debug_assert!(
            self.stage.can_transition_to(next),
            "illegal pipeline transition {:?} -> {:?}",
            self.stage,
            next
        );
        tracing::debug!(from = ?self.stage, to = ?next, "Pipeline transition");
        if next == Stage::Fixing {
            self.fix_attempts += 1;
        }
        self.stage = next;
        self.trace.push(next);
    }

    /// Absorb into `Failed` unless already terminal
    pub fn fail(&mut self) {
        if !self.stage.is_terminal() {
            self.advance(Stage::Failed);
        }
    }

    pub fn record_verdict(&mut self, verdict: TestStatus) {
        self.verdict = Some(verdict);
    }

    /// Finish the run
    pub fn into_report(self, error: Option<String>) -> TurnReport {
        TurnReport {
            kind: self.kind,
            final_stage: self.stage,
            stages: self.trace,
            verdict: self.verdict,
            fix_attempts: self.fix_attempts,
            error,
        }
    }
}

/// Summary of a finished turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReport {
    pub kind: TurnKind,
    /// `Done` or `Failed`
    pub final_stage: Stage,
    /// Every stage visited, in order
    pub stages: Vec<Stage>,
    /// Last test verdict, if testing ran to completion
    pub verdict: Option<TestStatus>,
    pub fix_attempts: u32,
    pub error: Option<String>,
}

impl TurnReport {
    pub fn succeeded(&self) -> bool {
        self.final_stage == Stage::Done
    }
}
