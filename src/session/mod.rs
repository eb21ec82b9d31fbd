//! Session drivers
//!
//! The interactive chat loop and the scripted demo, plus the reply streaming
//! they share.

mod console;
mod demo;
mod input;
mod interactive;
mod render;

#[cfg(test)]
mod testing;

pub use console::*;
pub use demo::*;
pub use input::*;
pub use interactive::*;
pub use render::*;

use std::io::Write;
use thiserror::Error;
use tokio::io::AsyncBufRead;
use tracing::{debug, info, warn};

use crate::agent::{AgentClient, AgentError, AgentResult, PermissionDecision, ReplyEvent};

/// Message sent back when the user refuses a tool
pub const DENIED_MESSAGE: &str = "User denied permission";

/// Errors that end a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Print the reply in flight until it finishes
///
/// Permission requests are put to the user. The first Ctrl-C asks the
/// runtime to interrupt; the reply is still drained to its end.
pub async fn stream_reply<R, W>(
    client: &mut AgentClient,
    console: &mut Console<R, W>,
    style: RenderStyle,
) -> SessionResult<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut interrupted = false;

    loop {
        let event = tokio::select! {
            event = client.next_event() => event?,
            _ = console.interrupted(), if !interrupted => {
                interrupted = true;
                console.println("⏹ Interrupting...")?;
                client.interrupt().await?;
                continue;
            }
        };

        let Some(event) = event else {
            break;
        };

        match event {
            ReplyEvent::PermissionRequest {
                request_id,
                tool_name,
                input,
            } => {
                let decision = ask_permission(console, &tool_name, input).await?;
                client.respond_permission(&request_id, decision).await?;
            }
            event => {
                if let ReplyEvent::ToolUse { name, input, .. } = &event {
                    debug!(tool = %name, %input, "Tool invoked");
                }
                if let Some(text) = render_event(&event, style) {
                    console.println(&text)?;
                }
            }
        }
    }

    Ok(())
}

/// Combine a driver's result with the outcome of closing its session
///
/// A driver failure wins; a close failure after it is only logged.
pub fn settle(result: SessionResult<()>, closed: AgentResult<()>) -> SessionResult<()> {
    match (result, closed) {
        (Err(e), Err(close_error)) => {
            warn!("Failed to close agent session: {}", close_error);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), closed) => Ok(closed?),
    }
}

/// Ask whether `tool_name` may run with `input`
async fn ask_permission<R, W>(
    console: &mut Console<R, W>,
    tool_name: &str,
    input: serde_json::Value,
) -> SessionResult<PermissionDecision>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    console.println(&format!("🔐 {} requested with {}", tool_name, input))?;
    let answer = console
        .read_line(&format!("🔐 Allow {}? [y/N] ", tool_name))
        .await?;

    let allowed = answer.as_deref().map(is_affirmative).unwrap_or(false);
    info!(tool = %tool_name, allowed, "Permission decision");

    Ok(if allowed {
        PermissionDecision::Allow {
            updated_input: input,
        }
    } else {
        PermissionDecision::Deny {
            message: DENIED_MESSAGE.to_string(),
        }
    })
}
