//! Reply rendering
//!
//! Turns reply events into the lines printed to the terminal. Each driver
//! phase has its own style.

use crate::agent::ReplyEvent;

/// Width of the `=` separator lines
pub const SEPARATOR_WIDTH: usize = 60;

/// Output style for a streamed reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStyle {
    /// Reply to the opening prompt of an interactive session
    Greeting,
    /// Replies inside the chat loop
    Chat,
    /// Replies in demo mode
    Demo,
}

/// Text to print for `event`, or `None` when it is not shown
pub fn render_event(event: &ReplyEvent, style: RenderStyle) -> Option<String> {
    match event {
        ReplyEvent::Text(content) => Some(match style {
            RenderStyle::Greeting => format!("\n🤖 Assistant: {}\n", content),
            RenderStyle::Chat => format!("🤖 {}", content),
            RenderStyle::Demo => format!("\n🤖 {}\n", content),
        }),
        ReplyEvent::ToolUse { name, .. } => Some(match style {
            RenderStyle::Greeting | RenderStyle::Chat => format!("🔧 Using tool: {}", name),
            RenderStyle::Demo => format!("🔧 Using: {}", name),
        }),
        ReplyEvent::ToolResult {
            error: Some(error), ..
        } if style == RenderStyle::Greeting => Some(format!("❌ Tool error: {}", error)),
        ReplyEvent::ToolResult { .. } => None,
        ReplyEvent::Finished(summary) if summary.is_error => Some(format!(
            "❌ Agent error: {}",
            summary
                .result
                .as_deref()
                .filter(|r| !r.is_empty())
                .unwrap_or(summary.subtype.as_str())
        )),
        ReplyEvent::Finished(_) => None,
        // Prompted for separately
        ReplyEvent::PermissionRequest { .. } => None,
    }
}

/// A line of `=` characters
pub fn separator() -> String {
    "=".repeat(SEPARATOR_WIDTH)
}
