//! Orchestrator pipeline
//!
//! One user turn runs through the stages in [`Stage`]: analysis, generation or
//! modification, testing and at most one fix/retest cycle. Progress reaches the
//! client as [`ClientFrame`]s.

mod frame;
mod intent;
mod orchestrator;
mod stage;

pub use frame::{ClientFrame, ClientMessage, FrameRole, FrameSender, SYSTEM_AGENT};
pub use intent::{classify, compose_followup_context, has_code_intent, TurnKind, GUIDANCE_REPLY};
pub use orchestrator::{verdict_message, Orchestrator};
pub use stage::{PipelineRun, Stage, TurnReport, MAX_FIX_ATTEMPTS};
