//! Stream-json message definitions
//!
//! Defines the line-delimited JSON messages exchanged with the agent runtime
//! over its stdin and stdout, and the reply events derived from them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Session name used for every user message
pub const DEFAULT_SESSION_ID: &str = "default";

/// Maximum bytes of a wire line written to logs
pub const MAX_LOGGED_LINE: usize = 500;

// ============================================================================
// Error Types
// ============================================================================

/// Protocol-related errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

// ============================================================================
// Outgoing Messages
// ============================================================================

/// Messages written to the runtime's stdin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    /// A user turn
    User {
        message: UserTurn,
        parent_tool_use_id: Option<String>,
        session_id: String,
    },

    /// A request the runtime must acknowledge
    ControlRequest {
        request_id: String,
        request: ControlRequest,
    },

    /// Our answer to a request from the runtime
    ControlResponse { response: ControlResponse },
}

/// Body of an outgoing user turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserTurn {
    pub role: String,
    pub content: String,
}

/// Control requests we send
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum ControlRequest {
    /// Open the control channel
    Initialize {
        #[serde(default)]
        hooks: Option<Value>,
    },
    /// Stop the reply in progress
    Interrupt,
}

/// Control response envelope, in both directions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum ControlResponse {
    Success {
        request_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<Value>,
    },
    Error {
        request_id: String,
        error: String,
    },
}

impl ControlResponse {
    /// Request this response answers
    pub fn request_id(&self) -> &str {
        match self {
            ControlResponse::Success { request_id, .. } => request_id,
            ControlResponse::Error { request_id, .. } => request_id,
        }
    }
}

/// Answer to a tool permission request
#[derive(Debug, Clone, PartialEq)]
pub enum PermissionDecision {
    /// Run the tool with the given input
    Allow { updated_input: Value },
    /// Refuse, telling the model why
    Deny { message: String },
}

impl PermissionDecision {
    fn to_value(&self) -> Value {
        match self {
            PermissionDecision::Allow { updated_input } => serde_json::json!({
                "behavior": "allow",
                "updatedInput": updated_input,
            }),
            PermissionDecision::Deny { message } => serde_json::json!({
                "behavior": "deny",
                "message": message,
            }),
        }
    }
}

impl OutgoingMessage {
    /// A user prompt in the default session
    pub fn user(prompt: impl Into<String>) -> Self {
        OutgoingMessage::User {
            message: UserTurn {
                role: "user".to_string(),
                content: prompt.into(),
            },
            parent_tool_use_id: None,
            session_id: DEFAULT_SESSION_ID.to_string(),
        }
    }

    /// A control request with the given id
    pub fn control(request_id: impl Into<String>, request: ControlRequest) -> Self {
        OutgoingMessage::ControlRequest {
            request_id: request_id.into(),
            request,
        }
    }

    /// Answer a permission request
    pub fn permission(request_id: impl Into<String>, decision: &PermissionDecision) -> Self {
        OutgoingMessage::ControlResponse {
            response: ControlResponse::Success {
                request_id: request_id.into(),
                response: Some(decision.to_value()),
            },
        }
    }

    /// Reject a control request we cannot serve
    pub fn control_error(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        OutgoingMessage::ControlResponse {
            response: ControlResponse::Error {
                request_id: request_id.into(),
                error: error.into(),
            },
        }
    }

    /// Serialize to a single JSON line (without the newline)
    pub fn to_line(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Incoming Messages
// ============================================================================

/// Messages read from the runtime's stdout
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingMessage {
    /// Session metadata such as the init banner
    System {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },

    /// Model output
    Assistant { message: ContentMessage },

    /// Echoed user turns, carrying tool results
    User { message: UserContentMessage },

    /// End of a reply
    Result(ResultSummary),

    /// Partial message deltas
    StreamEvent,

    /// A request from the runtime, such as a tool permission check
    ControlRequest {
        request_id: String,
        request: IncomingControlRequest,
    },

    /// The runtime's answer to one of our control requests
    ControlResponse { response: ControlResponse },

    #[serde(other)]
    Unknown,
}

impl IncomingMessage {
    /// Parse a single stdout line
    pub fn from_line(line: &str) -> ProtocolResult<Self> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ProtocolError::InvalidMessage("empty line".to_string()));
        }
        Ok(serde_json::from_str(line)?)
    }
}

/// Assistant message payload
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ContentMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

/// User message payload; content is either plain text or blocks
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UserContentMessage {
    pub content: UserContent,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum UserContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A block of message content
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Option<Value>,
        #[serde(default)]
        is_error: Option<bool>,
    },
    #[serde(other)]
    Other,
}

/// Control requests the runtime sends us
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum IncomingControlRequest {
    CanUseTool {
        tool_name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Unsupported,
}

/// Terminal message of a reply
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResultSummary {
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    #[serde(default)]
    pub result: Option<String>,
}

// ============================================================================
// Reply Events
// ============================================================================

/// One renderable step of a streamed reply
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyEvent {
    /// Text written by the model
    Text(String),
    /// The model invoked a tool
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    /// A tool finished; `error` is set when it failed
    ToolResult {
        tool_use_id: String,
        error: Option<String>,
    },
    /// The runtime asks whether a tool may run
    PermissionRequest {
        request_id: String,
        tool_name: String,
        input: Value,
    },
    /// The reply is complete
    Finished(ResultSummary),
}

impl ContentBlock {
    /// Reply event for this block, if it is one the user sees
    pub fn into_event(self) -> Option<ReplyEvent> {
        match self {
            ContentBlock::Text { text } => Some(ReplyEvent::Text(text)),
            ContentBlock::ToolUse { id, name, input } => {
                Some(ReplyEvent::ToolUse { id, name, input })
            }
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                let error = if is_error.unwrap_or(false) {
                    Some(tool_result_text(content.as_ref()))
                } else {
                    None
                };
                Some(ReplyEvent::ToolResult { tool_use_id, error })
            }
            ContentBlock::Thinking { .. } | ContentBlock::Other => None,
        }
    }
}

/// Flatten tool result content into display text
pub fn tool_result_text(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => "unknown error".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(blocks)) => {
            let texts: Vec<&str> = blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect();
            if texts.is_empty() {
                Value::Array(blocks.clone()).to_string()
            } else {
                texts.join("\n")
            }
        }
        Some(other) => other.to_string(),
    }
}

/// Shorten a wire line for logging
pub fn truncate_for_log(line: &str) -> String {
    if line.len() <= MAX_LOGGED_LINE {
        return line.to_string();
    }
    let mut end = MAX_LOGGED_LINE;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes total)", &line[..end], line.len())
}
