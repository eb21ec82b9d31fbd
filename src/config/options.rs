//! Agent client options
//!
//! Static configuration of the agent session and its translation into
//! command-line arguments for the agent runtime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::prompts;

/// Model used when nothing else is configured
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Agent runtime executable looked up on PATH
pub const DEFAULT_CLI_PATH: &str = "claude";

/// Deadline for the initialize handshake
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(60);

/// Coarse tool capability granted to the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Reading, writing and searching files in the working directory
    Filesystem,
    /// Searching and fetching web pages
    WebSearch,
    /// Running shell commands
    Bash,
}

impl Capability {
    /// Runtime tool names covered by this capability
    pub fn tool_names(self) -> &'static [&'static str] {
        match self {
            Capability::Filesystem => &["Read", "Write", "Edit", "Glob", "Grep"],
            Capability::WebSearch => &["WebSearch", "WebFetch"],
            Capability::Bash => &["Bash"],
        }
    }
}

/// How the runtime asks for approval before using tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// File writes and commands need confirmation
    #[default]
    Default,
    /// File edits are accepted without asking
    AcceptEdits,
    /// Read-only planning
    Plan,
    /// Nothing is asked
    BypassPermissions,
}

impl PermissionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::Plan => "plan",
            PermissionMode::BypassPermissions => "bypassPermissions",
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(PermissionMode::Default),
            "acceptEdits" => Ok(PermissionMode::AcceptEdits),
            "plan" => Ok(PermissionMode::Plan),
            "bypassPermissions" => Ok(PermissionMode::BypassPermissions),
            other => Err(format!(
                "unknown permission mode '{}' (expected default, acceptEdits, plan or bypassPermissions)",
                other
            )),
        }
    }
}

/// Configuration for opening an agent session
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Model identifier
    pub model: String,
    /// System prompt defining the assistant persona
    pub system_prompt: String,
    /// Tool capabilities granted to the agent
    pub allowed_tools: Vec<Capability>,
    /// Directory the runtime operates in
    pub working_directory: PathBuf,
    /// Tool approval policy
    pub permission_mode: PermissionMode,
    /// Optional cap on agentic turns per reply
    pub max_turns: Option<u32>,
    /// Path or name of the runtime executable
    pub cli_path: String,
    /// Deadline for control handshakes
    pub control_timeout: Duration,
}

impl AgentOptions {
    /// Create options with the learning-assistant defaults
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: prompts::system_prompt(prompts::DEFAULT_NOTES_DIR),
            allowed_tools: vec![
                Capability::Filesystem,
                Capability::WebSearch,
                Capability::Bash,
            ],
            working_directory: working_directory.into(),
            permission_mode: PermissionMode::Default,
            max_turns: None,
            cli_path: DEFAULT_CLI_PATH.to_string(),
            control_timeout: DEFAULT_CONTROL_TIMEOUT,
        }
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the permission mode
    pub fn with_permission_mode(mut self, mode: PermissionMode) -> Self {
        self.permission_mode = mode;
        self
    }

    /// Runtime tool names for the allowed capabilities, deduplicated in order
    pub fn tool_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::new();
        for capability in &self.allowed_tools {
            for name in capability.tool_names() {
                if !names.contains(name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Arguments passed to the runtime executable
    pub fn cli_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "--output-format",
            "stream-json",
            "--verbose",
            "--input-format",
            "stream-json",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        args.push("--system-prompt".to_string());
        args.push(self.system_prompt.clone());

        let tools = self.tool_names();
        if !tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(tools.join(","));
        }

        args.push("--model".to_string());
        args.push(self.model.clone());

        args.push("--permission-mode".to_string());
        args.push(self.permission_mode.to_string());

        // Tool approvals come back to us as control requests
        args.push("--permission-prompt-tool".to_string());
        args.push("stdio".to_string());

        if let Some(turns) = self.max_turns {
            args.push("--max-turns".to_string());
            args.push(turns.to_string());
        }

        args
    }
}
