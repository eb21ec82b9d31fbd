//! Scripted demo session
//!
//! Replays the configured demo queries instead of reading from the terminal.

use std::io::Write;
use tokio::io::AsyncBufRead;
use tracing::debug;

use super::{separator, settle, stream_reply, Console, RenderStyle, SessionResult};
use crate::agent::AgentClient;
use crate::config::{AgentOptions, SessionSettings};

/// Connect to the agent and replay the demo queries
pub async fn run_demo<R, W>(
    options: &AgentOptions,
    settings: &SessionSettings,
    console: &mut Console<R, W>,
) -> SessionResult<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    console.println("🎓 Learning Assistant - Demo Mode\n")?;

    let mut client = AgentClient::connect(options).await?;
    let result = replay(&mut client, settings, console).await;
    settle(result, client.disconnect().await)
}

/// Send each demo query in turn, pausing between them
pub async fn replay<R, W>(
    client: &mut AgentClient,
    settings: &SessionSettings,
    console: &mut Console<R, W>,
) -> SessionResult<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let total = settings.demo_queries.len();

    for (i, query) in settings.demo_queries.iter().enumerate() {
        let number = i + 1;
        console.println(&format!("\n{}", separator()))?;
        console.println(&format!("Demo Query {}: {}", number, query))?;
        console.println(&separator())?;

        debug!(query = number, total, "Sending demo query");
        client.query(query).await?;
        stream_reply(client, console, RenderStyle::Demo).await?;

        if number < total {
            tokio::time::sleep(settings.demo_pause).await;
        }
    }

    Ok(())
}
