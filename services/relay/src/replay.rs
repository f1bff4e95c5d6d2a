//! Offline replay of recorded realtime sessions.
//!
//! A recording is a JSON Lines file with one server event per line. Each line is
//! fed through a fresh interpreter exactly as the live bridge would; outbound
//! events are captured instead of sent.

use anyhow::{Context, Result};
use std::{path::Path, sync::Arc};
use switchboard_core::{
    ClientEvent, CoordinatorConfig, EventInterpreter, InMemoryEventLog, InMemoryTranscript,
    RecordingSink, SessionState, TranscriptItem,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::info;

/// What a replay produced.
#[derive(Debug)]
pub struct ReplayReport {
    pub events_read: usize,
    pub outbound: Vec<ClientEvent>,
    pub transcript: Vec<TranscriptItem>,
    pub selected_agent: String,
}

/// Feeds every non-blank line of `input` to `interpreter`, then waits for the
/// tool calls they started. Returns the number of events fed.
pub async fn feed_lines<R>(interpreter: &EventInterpreter, input: R) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut count = 0;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        interpreter.handle_text(line).await;
        count += 1;
    }
    interpreter.drain().await;
    Ok(count)
}

pub async fn replay_file(
    path: &Path,
    session: Arc<SessionState>,
    config: CoordinatorConfig,
) -> Result<ReplayReport> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open recording {}", path.display()))?;

    let transcript = Arc::new(InMemoryTranscript::new());
    let sink = Arc::new(RecordingSink::new());
    let interpreter = EventInterpreter::new(
        session.clone(),
        transcript.clone(),
        sink.clone(),
        Arc::new(InMemoryEventLog::new()),
        config,
    );

    let events_read = feed_lines(&interpreter, BufReader::new(file)).await?;
    info!(path = %path.display(), events_read, "Replay finished");

    Ok(ReplayReport {
        events_read,
        outbound: sink.events().await,
        transcript: interpreter.transcript().snapshot().await,
        selected_agent: session.selected_agent(),
    })
}
