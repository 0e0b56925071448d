//! # JSON Lines Console
//!
//! Drives a context from a line-oriented stream, one JSON object per line.
//!
//! ## Input
//!
//! ```text
//! {"command": "requestAdmission", "payload": {"name": "Sam"}}
//! {"command": "snapshot"}
//! ```
//!
//! Besides the session commands, `snapshot`, `resync`, `flush` and
//! `metrics` are answered by the console itself.
//!
//! ## Output
//!
//! Every session event is written as `{"type": "event", "data": {...}}`.
//! Control commands answer with `snapshot`, `metrics` or `error` lines.
//! At end of input the console waits for queued commands and writes the
//! events they produced before returning.

use cp_02_session_model::Session;
use cp_04_context_bridge::{BridgeError, ContextBridge};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_bus::{EventFilter, SessionEvent};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Console failures. Bad input lines are reported inline, not here.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("console I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot encode output line: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct InputLine {
    command: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum OutputLine<'a> {
    Event { data: &'a SessionEvent },
    Snapshot { session: &'a Session },
    Metrics { text: String },
    Error { message: String },
}

/// Run the console until `reader` reaches end of input.
///
/// # Errors
///
/// Returns an error only when reading or writing the streams fails.
pub async fn run_console<R, W>(
    bridge: &ContextBridge,
    reader: R,
    mut writer: W,
) -> Result<(), ConsoleError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut events = bridge.subscribe(EventFilter::all());
    info!("[runtime] Console ready");

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => handle_line(bridge, line.trim(), &mut writer).await?,
                None => break,
            },
            Some(event) = events.recv() => {
                write_line(&mut writer, &OutputLine::Event { data: &event }).await?;
            }
        }
    }

    debug!("[runtime] Console input closed, draining");
    if bridge.flush().await.is_ok() {
        while let Ok(Some(event)) = events.try_recv() {
            write_line(&mut writer, &OutputLine::Event { data: &event }).await?;
        }
    }
    writer.flush().await?;
    Ok(())
}

async fn handle_line<W>(bridge: &ContextBridge, line: &str, writer: &mut W) -> Result<(), ConsoleError>
where
    W: AsyncWrite + Unpin,
{
    if line.is_empty() {
        return Ok(());
    }

    let input: InputLine = match serde_json::from_str(line) {
        Ok(input) => input,
        Err(e) => {
            let message = format!("unreadable line: {}", e);
            return write_line(writer, &OutputLine::Error { message }).await;
        }
    };

    match input.command.as_str() {
        "snapshot" => {
            let session = bridge.snapshot();
            write_line(writer, &OutputLine::Snapshot { session: &session }).await
        }
        "resync" => match bridge.engine().resync() {
            Ok(()) => Ok(()),
            Err(e) => report(writer, BridgeError::from(e)).await,
        },
        "flush" => match bridge.flush().await {
            Ok(()) => Ok(()),
            Err(e) => report(writer, e).await,
        },
        "metrics" => match poll_telemetry::encode_metrics() {
            Ok(text) => write_line(writer, &OutputLine::Metrics { text }).await,
            Err(e) => {
                let message = e.to_string();
                write_line(writer, &OutputLine::Error { message }).await
            }
        },
        name => match ContextBridge::parse_command(name, input.payload) {
            Ok(command) => match bridge.submit(command) {
                Ok(()) => Ok(()),
                Err(e) => report(writer, e).await,
            },
            Err(e) => report(writer, e).await,
        },
    }
}

async fn report<W>(writer: &mut W, error: BridgeError) -> Result<(), ConsoleError>
where
    W: AsyncWrite + Unpin,
{
    let message = error.to_string();
    write_line(writer, &OutputLine::Error { message }).await
}

async fn write_line<W>(writer: &mut W, line: &OutputLine<'_>) -> Result<(), ConsoleError>
where
    W: AsyncWrite + Unpin,
{
    let mut encoded = serde_json::to_vec(line)?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    Ok(())
}
