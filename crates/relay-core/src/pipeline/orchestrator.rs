//! Orchestrator pipeline
//!
//! Drives one user turn through Analyst, Developer and Tester, streaming
//! progress frames to the client as each hop completes. The session context
//! is only written after the stage that produced the new value succeeded, so
//! a failed turn leaves the last committed files and task in place.

use super::frame::{ClientFrame, FrameSender};
use super::intent::{classify, compose_followup_context, TurnKind, GUIDANCE_REPLY};
use super::stage::{PipelineRun, Stage, TurnReport};
use crate::error::{RelayError, Result};
use crate::protocol::{
    decode_result, AgentAction, AgentRole, AnalysisResult, AnalystAction, CodeResult,
    DeveloperAction, TestReport, TesterAction,
};
use crate::registry::AgentRegistry;
use crate::session::SessionContext;
use crate::transport::SharedTransport;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Runs pipeline turns against the registered agents
#[derive(Clone)]
pub struct Orchestrator {
    transport: SharedTransport,
    registry: Arc<AgentRegistry>,
}

impl Orchestrator {
    pub fn new(transport: SharedTransport, registry: Arc<AgentRegistry>) -> Self {
        Self {
            transport,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }

    /// Run one turn on `ctx`.
    ///
    /// Never fails: transport and agent errors end the run in
    /// [`Stage::Failed`] and are reported to the client as an error frame.
    /// A cancelled run stops issuing agent calls and sends nothing further.
    pub async fn run_turn(
        &self,
        ctx: &mut SessionContext,
        utterance: &str,
        frames: &FrameSender,
        cancel: &CancellationToken,
    ) -> TurnReport {
        let kind = classify(utterance, ctx.has_files());
        let mut run = PipelineRun::new(kind);
        info!(
            conversation_id = %ctx.conversation_id(),
            kind = ?kind,
            "Turn started"
        );
        ctx.push_user(utterance);

        let outcome = match kind {
            TurnKind::Conversational => {
                emit(
                    frames,
                    ClientFrame::assistant(AgentRole::Analyst.as_str(), GUIDANCE_REPLY),
                )
                .await;
                ctx.push_assistant(GUIDANCE_REPLY);
                run.advance(Stage::Done);
                Ok(())
            }
            TurnKind::NewProject | TurnKind::FollowUp => {
                self.drive(&mut run, ctx, utterance, frames, cancel).await
            }
        };

        let error = match outcome {
            Ok(()) => None,
            Err(RelayError::Cancelled) => {
                info!(
                    conversation_id = %ctx.conversation_id(),
                    stage = ?run.stage(),
                    "Turn cancelled"
                );
                run.fail();
                None
            }
            Err(e) => {
                error!(
                    conversation_id = %ctx.conversation_id(),
                    stage = ?run.stage(),
                    "Turn failed: {}",
                    e
                );
                run.fail();
                emit(frames, ClientFrame::error(&e)).await;
                Some(e.to_string())
            }
        };

        let report = run.into_report(error);
        info!(
            conversation_id = %ctx.conversation_id(),
            stage = ?report.final_stage,
            verdict = ?report.verdict,
            "Turn finished"
        );
        report
    }

    async fn drive(
        &self,
        run: &mut PipelineRun,
        ctx: &mut SessionContext,
        utterance: &str,
        frames: &FrameSender,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let conversation_id = ctx.conversation_id().to_string();
        let is_followup = run.kind() == TurnKind::FollowUp;

        // Analysis
        run.advance(Stage::Analyzing);
        emit(
            frames,
            ClientFrame::assistant(
                AgentRole::Analyst.as_str(),
                format!("Analyzing your request: {}", utterance),
            ),
        )
        .await;

        let user_request = if is_followup {
            compose_followup_context(ctx.current_task(), ctx.current_files(), utterance)?
        } else {
            utterance.to_string()
        };
        let analysis: AnalysisResult = self
            .call(
                AnalystAction::AnalyzeRequest { user_request },
                &conversation_id,
                frames,
                cancel,
            )
            .await?;
        emit(
            frames,
            ClientFrame::assistant(AgentRole::Analyst.as_str(), analysis.message.clone()),
        )
        .await;
        ctx.push_assistant(analysis.message.clone());

        // Generation or modification
        let developer = AgentRole::Developer.as_str();
        if is_followup {
            run.advance(Stage::Modifying);
            emit(frames, ClientFrame::assistant(developer, "Modifying code...")).await;
            let action = DeveloperAction::ModifyCode {
                current_files: ctx.current_files().clone(),
                modification_request: utterance.to_string(),
                task_context: analysis.task.clone(),
            };
            let code: CodeResult = self.call(action, &conversation_id, frames, cancel).await?;
            ctx.replace_files(code.files);
            emit(
                frames,
                ClientFrame::assistant(developer, "Code updated! Check the preview.")
                    .with_files(ctx.current_files().clone()),
            )
            .await;
        } else {
            run.advance(Stage::Generating);
            emit(
                frames,
                ClientFrame::assistant(developer, "Starting code generation..."),
            )
            .await;
            let action = DeveloperAction::GenerateCode {
                task: analysis.task.clone(),
            };
            let code: CodeResult = self.call(action, &conversation_id, frames, cancel).await?;
            ctx.commit_generation(code.files, analysis.task);
            emit(
                frames,
                ClientFrame::assistant(
                    developer,
                    "Code generated successfully! Check the preview panel.",
                )
                .with_files(ctx.current_files().clone()),
            )
            .await;
        }

        // Testing
        let tester = AgentRole::Tester.as_str();
        run.advance(Stage::Testing);
        emit(frames, ClientFrame::assistant(tester, "Running tests...")).await;
        let mut report: TestReport = self
            .call(
                TesterAction::TestCode {
                    files: ctx.current_files().clone(),
                },
                &conversation_id,
                frames,
                cancel,
            )
            .await?;

        // One remediation cycle at most
        if !report.passed() && run.can_fix() {
            run.advance(Stage::TestFailed);
            emit(
                frames,
                ClientFrame::assistant(tester, "Tests failed. Requesting fixes..."),
            )
            .await;

            run.advance(Stage::Fixing);
            let action = DeveloperAction::FixBug {
                files: ctx.current_files().clone(),
                errors: report.errors.clone(),
            };
            let fixed: CodeResult = self.call(action, &conversation_id, frames, cancel).await?;
            ctx.replace_files(fixed.files);
            emit(
                frames,
                ClientFrame::assistant(developer, "Bug fixed! Re-running tests...")
                    .with_files(ctx.current_files().clone()),
            )
            .await;

            run.advance(Stage::Retesting);
            report = self
                .call(
                    TesterAction::TestCode {
                        files: ctx.current_files().clone(),
                    },
                    &conversation_id,
                    frames,
                    cancel,
                )
                .await?;
        }

        // Reporting
        run.advance(Stage::Reporting);
        run.record_verdict(report.status);
        let verdict = verdict_message(&report, run.fix_attempts());
        emit(frames, ClientFrame::assistant(tester, verdict.clone())).await;
        ctx.push_assistant(verdict);
        run.advance(Stage::Done);
        Ok(())
    }

    /// One hop: resolve the agent, send the request, decode the typed result
    async fn call<A, R>(
        &self,
        action: A,
        conversation_id: &str,
        frames: &FrameSender,
        cancel: &CancellationToken,
    ) -> Result<R>
    where
        A: AgentAction + Send,
        R: DeserializeOwned,
    {
        let agent = A::AGENT.as_str();
        let action_name = action.name();
        let address = self.registry.resolve(agent)?;
        let envelope = action
            .into_request(AgentRole::Orchestrator.as_str())?
            .with_conversation_id(conversation_id);

        info!(
            conversation_id = %conversation_id,
            "Orchestrator -> {}: {}",
            agent,
            action_name
        );

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RelayError::Cancelled),
            body = self.transport.send(&envelope, &address) => body?,
        };

        emit(
            frames,
            ClientFrame::system(format!(
                "A2A: Orchestrator → {} ({})",
                agent, action_name
            )),
        )
        .await;

        decode_result(agent, body)
    }
}

/// Final client message for the last test verdict
pub fn verdict_message(report: &TestReport, fix_attempts: u32) -> String {
    if report.passed() {
        "All tests passed! Your application is ready.".to_string()
    } else if fix_attempts > 0 {
        format!(
            "Tests are still failing after one fix attempt: {}",
            report.errors.join("; ")
        )
    } else {
        format!("Tests failed: {}", report.errors.join("; "))
    }
}

async fn emit(frames: &FrameSender, frame: ClientFrame) {
    debug!(agent = %frame.agent, "Frame: {}", frame.content);
    if frames.send(frame).await.is_err() {
        debug!("Frame receiver closed");
    }
}
