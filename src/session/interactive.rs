//! Interactive chat session
//!
//! Greets the agent with the opening prompt, then relays lines typed at the
//! terminal until the user leaves.

use std::io::Write;
use tokio::io::AsyncBufRead;
use tracing::{debug, info};

use super::{
    classify, separator, settle, stream_reply, Console, InputAction, RenderStyle, SessionResult,
};
use crate::agent::AgentClient;
use crate::config::{AgentOptions, SessionSettings};

/// Prompt shown before each user line
pub const USER_PROMPT: &str = "You: ";

/// Print the startup banner and command hints
pub fn print_banner<R, W>(console: &mut Console<R, W>) -> SessionResult<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    console.println("🎓 Learning Assistant Agent Started!\n")?;
    console.println("Available commands:")?;
    console.println("  - 'Save notes about [topic]': Save learning notes")?;
    console.println("  - 'What did I learn about [topic]?': Query your knowledge base")?;
    console.println("  - 'Quiz me on [topic]': Generate a quiz")?;
    console.println("  - 'exit': Quit the assistant\n")?;
    Ok(())
}

/// Connect to the agent and run the interactive session
pub async fn run_interactive<R, W>(
    options: &AgentOptions,
    settings: &SessionSettings,
    console: &mut Console<R, W>,
) -> SessionResult<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    print_banner(console)?;

    let mut client = AgentClient::connect(options).await?;
    let result = chat(&mut client, settings, console).await;
    settle(result, client.disconnect().await)
}

/// Run the greeting and chat loop on an open client
pub async fn chat<R, W>(
    client: &mut AgentClient,
    settings: &SessionSettings,
    console: &mut Console<R, W>,
) -> SessionResult<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    client.query(&settings.initial_prompt).await?;
    stream_reply(client, console, RenderStyle::Greeting).await?;

    console.println(&format!("\n{}", separator()))?;
    console.println("💬 You can now chat with your learning assistant!")?;
    console.println("Type 'exit' to quit\n")?;

    let mut turns = 0usize;
    loop {
        let action = match console.read_line(USER_PROMPT).await? {
            Some(line) => classify(&line),
            None => InputAction::Exit,
        };

        match action {
            InputAction::Exit => {
                console.println(&format!(
                    "\n👋 Happy learning! Your notes are saved in '{}'",
                    settings.notes_dir
                ))?;
                break;
            }
            InputAction::Skip => continue,
            InputAction::Send(prompt) => {
                turns += 1;
                debug!(turn = turns, "Forwarding user message");
                client.query(&prompt).await?;
                console.blank()?;
                stream_reply(client, console, RenderStyle::Chat).await?;
                console.blank()?;
            }
        }
    }

    info!(client = %client.id(), turns, "Chat ended");
    Ok(())
}
