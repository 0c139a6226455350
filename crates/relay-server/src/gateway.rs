//! Session gateway
//!
//! One task set per WebSocket connection:
//! - a writer draining progress frames into the socket,
//! - a turn worker running one pipeline turn at a time under the session's run lock,
//! - the reader loop on the connection's own task, queueing utterances for the worker.
//!
//! The reader never waits on the worker or the writer, so a Close frame is seen
//! even while the inbox is full. Closing the socket cancels the connection
//! token, which stops the in-flight turn at its next agent call and releases
//! the session.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use relay_core::pipeline::FrameSender;
use relay_core::{ClientFrame, ClientMessage, Orchestrator, SharedSession};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

/// Frames buffered per connection before a slow client applies backpressure
const FRAME_BUFFER: usize = 64;

/// Utterances queued behind the running turn
const INBOX_BUFFER: usize = 16;

pub const RESET_NOTICE: &str =
    "An unexpected error occurred while processing your request. The session has been reset.";

/// Reason sent back when an utterance arrives with the inbox full
pub const BUSY_REASON: &str = "Still working on earlier messages; this one was dropped";

/// Drive one client connection until it closes
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (session_id, session) = state.sessions.create();
    let cancel = CancellationToken::new();
    let (mut sink, mut stream) = socket.split();
    let (frame_tx, mut frame_rx) = mpsc::channel::<ClientFrame>(FRAME_BUFFER);
    let (inbox_tx, inbox_rx) = mpsc::channel::<String>(INBOX_BUFFER);

    let conversation_id = session.lock().await.conversation_id().to_string();
    tracing::info!(
        "WebSocket connected: session {} ({})",
        session_id,
        conversation_id
    );

    let writer = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Dropping unserializable frame: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let worker = tokio::spawn(turn_worker(
        state.orchestrator.clone(),
        session.clone(),
        inbox_rx,
        frame_tx.clone(),
        cancel.clone(),
    ));

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                tracing::debug!("Received: {}", text);
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(message) => match inbox_tx.try_send(message.content) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            tracing::warn!("Inbox full for session {}", session_id);
                            notify(&frame_tx, ClientFrame::error(BUSY_REASON));
                        }
                        Err(TrySendError::Closed(_)) => break,
                    },
                    Err(e) => {
                        notify(&frame_tx, ClientFrame::error(format!("Invalid message: {}", e)));
                    }
                }
            }
            Ok(Message::Close(_)) => {
                tracing::info!("WebSocket closed: session {}", session_id);
                break;
            }
            Err(e) => {
                tracing::error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    cancel.cancel();
    drop(inbox_tx);
    if let Err(e) = worker.await {
        tracing::error!("Turn worker for session {} ended abnormally: {}", session_id, e);
    }
    drop(frame_tx);
    let _ = writer.await;

    state.sessions.remove(session_id);
    if let Some(local) = &state.local {
        local.forget_conversation(&conversation_id);
    }
    tracing::info!("Session {} released", session_id);
}

/// Queue a frame from the reader without waiting on a slow client
fn notify(frames: &FrameSender, frame: ClientFrame) {
    if let Err(TrySendError::Full(_)) = frames.try_send(frame) {
        tracing::debug!("Frame buffer full; dropping reader notice");
    }
}

/// Run queued turns one at a time until the connection is cancelled
async fn turn_worker(
    orchestrator: Orchestrator,
    session: SharedSession,
    mut inbox: mpsc::Receiver<String>,
    frames: FrameSender,
    cancel: CancellationToken,
) {
    loop {
        let utterance = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = inbox.recv() => match next {
                Some(utterance) => utterance,
                None => break,
            },
        };

        let mut guard = session.clone().lock_owned().await;
        if cancel.is_cancelled() {
            break;
        }
        let turn = {
            let orchestrator = orchestrator.clone();
            let frames = frames.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                orchestrator
                    .run_turn(&mut guard, &utterance, &frames, &cancel)
                    .await
            })
        };

        match turn.await {
            Ok(report) => {
                tracing::debug!(
                    stage = ?report.final_stage,
                    fix_attempts = report.fix_attempts,
                    "Turn complete"
                );
            }
            Err(e) if e.is_panic() => {
                tracing::error!("Turn panicked; resetting session");
                session.lock().await.reset();
                let _ = frames.send(ClientFrame::system(RESET_NOTICE)).await;
            }
            Err(e) => {
                tracing::warn!("Turn aborted: {}", e);
                break;
            }
        }
    }
}
