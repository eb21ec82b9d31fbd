//! Agent session client
//!
//! Owns one conversation with the agent runtime: sends prompts, yields the
//! events of each streamed reply, and answers the runtime's control requests.

use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::process::{AgentProcess, ProcessError};
use super::protocol::{
    truncate_for_log, ContentBlock, ControlRequest, ControlResponse, IncomingControlRequest,
    IncomingMessage, OutgoingMessage, PermissionDecision, ProtocolError, ReplyEvent, UserContent,
};
use crate::config::AgentOptions;

/// How long disconnect waits for a clean exit before killing
const DISCONNECT_GRACE: Duration = Duration::from_secs(5);

/// Errors that can occur during agent session operations
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Failed to start agent runtime: {0}")]
    Process(#[from] ProcessError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Agent runtime closed the connection")]
    Disconnected,

    #[error("No response to {0} within {1:?}")]
    Timeout(&'static str, Duration),

    #[error("Agent rejected {request}: {message}")]
    ControlRejected { request: String, message: String },

    #[error("A reply is already in progress")]
    ReplyInProgress,
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// A connected agent session
pub struct AgentClient {
    /// Identifies this connection in logs and request ids
    id: Uuid,
    tx: mpsc::Sender<String>,
    rx: mpsc::Receiver<String>,
    /// The runtime process, absent for in-memory connections
    process: Option<AgentProcess>,
    /// Counter for control request ids
    request_counter: u64,
    /// Events decoded but not yet handed out
    pending: VecDeque<ReplyEvent>,
    /// Whether a reply is streaming
    in_flight: bool,
}

impl AgentClient {
    /// Spawn the runtime described by `options` and complete the handshake
    pub async fn connect(options: &AgentOptions) -> AgentResult<Self> {
        let mut process = AgentProcess::spawn(
            &options.cli_path,
            &options.cli_args(),
            &options.working_directory,
            None,
        )?;

        let tx = process.stdin()?;
        let rx = process
            .take_stdout()
            .ok_or(ProcessError::StdioUnavailable("stdout"))?;

        let mut client = Self::from_channels(tx, rx);
        let process_id = process.id();
        client.process = Some(process);

        info!(
            client = %client.id,
            process = %process_id,
            model = %options.model,
            permission_mode = %options.permission_mode,
            "Connecting to agent runtime"
        );
        client.initialize(options.control_timeout).await?;
        Ok(client)
    }

    /// Build a client over raw line channels
    pub fn from_channels(tx: mpsc::Sender<String>, rx: mpsc::Receiver<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
            rx,
            process: None,
            request_counter: 0,
            pending: VecDeque::new(),
            in_flight: false,
        }
    }

    /// Get the connection ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether a reply is currently streaming
    #[cfg(test)]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Open the control channel and wait for the runtime's acknowledgement
    pub async fn initialize(&mut self, timeout: Duration) -> AgentResult<()> {
        let request_id = self
            .send_control(ControlRequest::Initialize { hooks: None })
            .await?;

        let response = tokio::time::timeout(timeout, self.wait_control_response(&request_id))
            .await
            .map_err(|_| AgentError::Timeout("initialize", timeout))??;

        match response {
            ControlResponse::Success { response, .. } => {
                debug!(client = %self.id, ?response, "Agent runtime initialized");
                Ok(())
            }
            ControlResponse::Error { error, .. } => Err(AgentError::ControlRejected {
                request: "initialize".to_string(),
                message: error,
            }),
        }
    }

    /// Send a prompt; its reply is read with `next_event`
    pub async fn query(&mut self, prompt: &str) -> AgentResult<()> {
        if self.in_flight {
            return Err(AgentError::ReplyInProgress);
        }
        debug!(client = %self.id, "Sending prompt ({} chars)", prompt.chars().count());
        self.send(OutgoingMessage::user(prompt)).await?;
        self.in_flight = true;
        Ok(())
    }

    /// Next event of the reply in flight, `None` once it has finished
    pub async fn next_event(&mut self) -> AgentResult<Option<ReplyEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                if matches!(event, ReplyEvent::Finished(_)) {
                    self.in_flight = false;
                }
                return Ok(Some(event));
            }

            if !self.in_flight {
                return Ok(None);
            }

            let Some(line) = self.rx.recv().await else {
                self.in_flight = false;
                return Err(AgentError::Disconnected);
            };

            match IncomingMessage::from_line(&line) {
                Ok(message) => self.handle_message(message).await?,
                Err(e) => {
                    warn!(
                        client = %self.id,
                        "Skipping malformed line: {} ({})",
                        truncate_for_log(&line),
                        e
                    );
                }
            }
        }
    }

    /// Answer a permission request surfaced as `ReplyEvent::PermissionRequest`
    pub async fn respond_permission(
        &mut self,
        request_id: &str,
        decision: PermissionDecision,
    ) -> AgentResult<()> {
        debug!(client = %self.id, request_id = %request_id, ?decision, "Answering permission request");
        self.send(OutgoingMessage::permission(request_id, &decision))
            .await
    }

    /// Ask the runtime to stop the reply in progress
    pub async fn interrupt(&mut self) -> AgentResult<()> {
        info!(client = %self.id, "Interrupting reply");
        self.send_control(ControlRequest::Interrupt).await?;
        Ok(())
    }

    /// Close the session and stop the runtime
    pub async fn disconnect(self) -> AgentResult<()> {
        let Self {
            id, tx, process, ..
        } = self;
        // Dropping the last sender closes the runtime's stdin
        drop(tx);

        if let Some(mut process) = process {
            process.close_stdin();
            match process.wait_for_exit(DISCONNECT_GRACE).await {
                Some(exit) => {
                    debug!(client = %id, code = ?exit.exit_code, "Agent runtime exited");
                }
                None => {
                    warn!(client = %id, "Agent runtime did not exit, killing it");
                    process.kill().await?;
                }
            }
        }
        Ok(())
    }

    async fn handle_message(&mut self, message: IncomingMessage) -> AgentResult<()> {
        match message {
            IncomingMessage::Assistant { message } => {
                self.queue_blocks(message.content);
            }
            IncomingMessage::User { message } => {
                // Only tool results; text here is a prompt, not reply output
                if let UserContent::Blocks(blocks) = message.content {
                    self.queue_blocks(
                        blocks
                            .into_iter()
                            .filter(|block| matches!(block, ContentBlock::ToolResult { .. }))
                            .collect(),
                    );
                }
            }
            IncomingMessage::Result(summary) => {
                debug!(
                    client = %self.id,
                    turns = summary.num_turns,
                    duration_ms = summary.duration_ms,
                    cost_usd = ?summary.total_cost_usd,
                    is_error = summary.is_error,
                    "Reply finished"
                );
                self.pending.push_back(ReplyEvent::Finished(summary));
            }
            IncomingMessage::ControlRequest {
                request_id,
                request,
            } => match request {
                IncomingControlRequest::CanUseTool { tool_name, input } => {
                    self.pending.push_back(ReplyEvent::PermissionRequest {
                        request_id,
                        tool_name,
                        input,
                    });
                }
                IncomingControlRequest::Unsupported => {
                    warn!(client = %self.id, request_id = %request_id, "Rejecting unsupported control request");
                    self.send(OutgoingMessage::control_error(
                        request_id,
                        "unsupported control request",
                    ))
                    .await?;
                }
            },
            IncomingMessage::ControlResponse { response } => {
                if let ControlResponse::Error { request_id, error } = &response {
                    warn!(client = %self.id, request_id = %request_id, "Control request failed: {}", error);
                } else {
                    debug!(client = %self.id, request_id = response.request_id(), "Control request acknowledged");
                }
            }
            IncomingMessage::System { subtype, model } => {
                debug!(client = %self.id, ?subtype, ?model, "System message");
            }
            IncomingMessage::StreamEvent | IncomingMessage::Unknown => {}
        }
        Ok(())
    }

    fn queue_blocks(&mut self, blocks: Vec<ContentBlock>) {
        self.pending
            .extend(blocks.into_iter().filter_map(ContentBlock::into_event));
    }

    /// Read lines until the response to `request_id` arrives
    async fn wait_control_response(&mut self, request_id: &str) -> AgentResult<ControlResponse> {
        while let Some(line) = self.rx.recv().await {
            match IncomingMessage::from_line(&line) {
                Ok(IncomingMessage::ControlResponse { response })
                    if response.request_id() == request_id =>
                {
                    return Ok(response);
                }
                Ok(other) => {
                    debug!(client = %self.id, ?other, "Ignoring message during handshake");
                }
                Err(e) => {
                    warn!(client = %self.id, "Skipping malformed line: {}", e);
                }
            }
        }
        Err(AgentError::Disconnected)
    }

    async fn send_control(&mut self, request: ControlRequest) -> AgentResult<String> {
        let request_id = self.next_request_id();
        self.send(OutgoingMessage::control(request_id.clone(), request))
            .await?;
        Ok(request_id)
    }

    fn next_request_id(&mut self) -> String {
        self.request_counter += 1;
        let suffix = Uuid::new_v4().simple().to_string();
        format!("req_{}_{}", self.request_counter, &suffix[..8])
    }

    async fn send(&self, message: OutgoingMessage) -> AgentResult<()> {
        let line = message.to_line()?;
        self.tx
            .send(line)
            .await
            .map_err(|_| AgentError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    /// Client wired to in-memory channels standing in for the runtime
    struct FakeRuntime {
        /// Lines the client wrote
        sent: mpsc::Receiver<String>,
        /// Lines the runtime writes back
        reply: mpsc::Sender<String>,
    }

    impl FakeRuntime {
        fn pair() -> (AgentClient, FakeRuntime) {
            let (to_runtime, sent) = mpsc::channel(64);
            let (reply, from_runtime) = mpsc::channel(64);
            (
                AgentClient::from_channels(to_runtime, from_runtime),
                FakeRuntime { sent, reply },
            )
        }

        async fn emit(&self, value: Value) {
            self.reply.send(value.to_string()).await.unwrap();
        }

        async fn next_sent(&mut self) -> Value {
            let line = self.sent.recv().await.unwrap();
            serde_json::from_str(&line).unwrap()
        }
    }

    fn result_message() -> Value {
        json!({"type": "result", "subtype": "success", "is_error": false,
               "num_turns": 1, "duration_ms": 10, "result": "ok"})
    }

    async fn collect_reply(client: &mut AgentClient) -> Vec<ReplyEvent> {
        let mut events = Vec::new();
        while let Some(event) = client.next_event().await.unwrap() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_next_event_without_query() {
        let (mut client, _runtime) = FakeRuntime::pair();
        assert!(!client.is_in_flight());
        assert!(client.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_sends_user_message() {
        let (mut client, mut runtime) = FakeRuntime::pair();
        client.query("What is ownership?").await.unwrap();
        assert!(client.is_in_flight());

        let sent = runtime.next_sent().await;
        assert_eq!(sent["type"], "user");
        assert_eq!(sent["message"]["content"], "What is ownership?");
        assert_eq!(sent["session_id"], "default");
    }

    #[tokio::test]
    async fn test_query_rejected_while_in_flight() {
        let (mut client, _runtime) = FakeRuntime::pair();
        client.query("one").await.unwrap();
        assert!(matches!(
            client.query("two").await,
            Err(AgentError::ReplyInProgress)
        ));
    }

    #[tokio::test]
    async fn test_reply_events_in_order() {
        let (mut client, runtime) = FakeRuntime::pair();
        client.query("Save notes about lifetimes").await.unwrap();

        runtime.emit(json!({"type": "system", "subtype": "init", "model": "m"})).await;
        runtime
            .emit(json!({"type": "assistant", "message": {"content": [
                {"type": "text", "text": "Creating the folder."},
                {"type": "tool_use", "id": "tu1", "name": "Bash", "input": {"command": "mkdir notes"}}
            ]}}))
            .await;
        runtime
            .emit(json!({"type": "user", "message": {"content": [
                {"type": "tool_result", "tool_use_id": "tu1", "content": "mkdir: exists", "is_error": true}
            ]}}))
            .await;
        runtime
            .emit(json!({"type": "assistant", "message": {"content": [
                {"type": "text", "text": "Done."}
            ]}}))
            .await;
        runtime.emit(result_message()).await;

        let events = collect_reply(&mut client).await;
        assert_eq!(events.len(), 5);
        assert_eq!(events[0], ReplyEvent::Text("Creating the folder.".to_string()));
        assert!(matches!(&events[1], ReplyEvent::ToolUse { name, .. } if name == "Bash"));
        assert_eq!(
            events[2],
            ReplyEvent::ToolResult {
                tool_use_id: "tu1".to_string(),
                error: Some("mkdir: exists".to_string()),
            }
        );
        assert_eq!(events[3], ReplyEvent::Text("Done.".to_string()));
        assert!(matches!(&events[4], ReplyEvent::Finished(s) if s.result.as_deref() == Some("ok")));
        assert!(!client.is_in_flight());
    }

    #[tokio::test]
    async fn test_user_text_blocks_not_rendered_as_reply() {
        let (mut client, runtime) = FakeRuntime::pair();
        client.query("Research lifetimes").await.unwrap();

        runtime
            .emit(json!({"type": "user", "message": {"content": [
                {"type": "text", "text": "Sub-task: summarize the lifetimes chapter"},
                {"type": "tool_result", "tool_use_id": "tu9", "content": "ok", "is_error": false}
            ]}}))
            .await;
        runtime.emit(result_message()).await;

        let events = collect_reply(&mut client).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ReplyEvent::ToolResult { tool_use_id, .. } if tool_use_id == "tu9"));
        assert!(matches!(&events[1], ReplyEvent::Finished(_)));
    }

    #[tokio::test]
    async fn test_malformed_lines_skipped() {
        let (mut client, runtime) = FakeRuntime::pair();
        client.query("hi").await.unwrap();

        runtime.reply.send("garbage {".to_string()).await.unwrap();
        runtime
            .emit(json!({"type": "assistant", "message": {"content": [{"type": "text", "text": "Hello"}]}}))
            .await;
        runtime.emit(result_message()).await;

        let events = collect_reply(&mut client).await;
        assert_eq!(events[0], ReplyEvent::Text("Hello".to_string()));
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_disconnect_mid_reply() {
        let (mut client, runtime) = FakeRuntime::pair();
        client.query("hi").await.unwrap();
        drop(runtime);

        assert!(matches!(
            client.next_event().await,
            Err(AgentError::Disconnected)
        ));
        assert!(!client.is_in_flight());
    }

    #[tokio::test]
    async fn test_permission_request_roundtrip() {
        let (mut client, mut runtime) = FakeRuntime::pair();
        client.query("Save a note").await.unwrap();
        let _ = runtime.next_sent().await;

        runtime
            .emit(json!({"type": "control_request", "request_id": "perm-7", "request": {
                "subtype": "can_use_tool", "tool_name": "Write", "input": {"file_path": "a.md"}}}))
            .await;

        let event = client.next_event().await.unwrap().unwrap();
        let ReplyEvent::PermissionRequest {
            request_id,
            tool_name,
            input,
        } = event
        else {
            panic!("Expected permission request");
        };
        assert_eq!(tool_name, "Write");

        client
            .respond_permission(&request_id, PermissionDecision::Allow { updated_input: input })
            .await
            .unwrap();

        let sent = runtime.next_sent().await;
        assert_eq!(sent["type"], "control_response");
        assert_eq!(sent["response"]["request_id"], "perm-7");
        assert_eq!(sent["response"]["response"]["behavior"], "allow");
        assert_eq!(sent["response"]["response"]["updatedInput"]["file_path"], "a.md");
    }

    #[tokio::test]
    async fn test_unsupported_control_request_rejected() {
        let (mut client, mut runtime) = FakeRuntime::pair();
        client.query("hi").await.unwrap();
        let _ = runtime.next_sent().await;

        runtime
            .emit(json!({"type": "control_request", "request_id": "r1", "request": {"subtype": "hook_callback"}}))
            .await;
        runtime.emit(result_message()).await;

        let events = collect_reply(&mut client).await;
        assert_eq!(events.len(), 1);

        let sent = runtime.next_sent().await;
        assert_eq!(sent["response"]["subtype"], "error");
        assert_eq!(sent["response"]["request_id"], "r1");
    }

    #[tokio::test]
    async fn test_interrupt_sends_control_request() {
        let (mut client, mut runtime) = FakeRuntime::pair();
        client.interrupt().await.unwrap();
        client.interrupt().await.unwrap();

        let first = runtime.next_sent().await;
        assert_eq!(first["type"], "control_request");
        assert_eq!(first["request"]["subtype"], "interrupt");
        let first_id = first["request_id"].as_str().unwrap().to_string();
        assert!(first_id.starts_with("req_1_"));
        assert_eq!(first_id.len(), "req_1_".len() + 8);

        let second = runtime.next_sent().await;
        assert!(second["request_id"].as_str().unwrap().starts_with("req_2_"));
    }

    #[tokio::test]
    async fn test_initialize_handshake() {
        let (mut client, mut runtime) = FakeRuntime::pair();

        let handle = tokio::spawn(async move {
            let request = runtime.next_sent().await;
            assert_eq!(request["request"]["subtype"], "initialize");
            let request_id = request["request_id"].as_str().unwrap().to_string();
            runtime.emit(json!({"type": "system", "subtype": "init"})).await;
            runtime
                .emit(json!({"type": "control_response", "response": {
                    "subtype": "success", "request_id": request_id, "response": {"commands": []}}}))
                .await;
            runtime
        });

        client.initialize(Duration::from_secs(2)).await.unwrap();
        let _runtime = handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_initialize_rejected() {
        let (mut client, mut runtime) = FakeRuntime::pair();

        let handle = tokio::spawn(async move {
            let request = runtime.next_sent().await;
            let request_id = request["request_id"].as_str().unwrap().to_string();
            runtime
                .emit(json!({"type": "control_response", "response": {
                    "subtype": "error", "request_id": request_id, "error": "bad version"}}))
                .await;
            runtime
        });

        let result = client.initialize(Duration::from_secs(2)).await;
        assert!(matches!(result, Err(AgentError::ControlRejected { .. })));
        let _runtime = handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_initialize_timeout() {
        let (mut client, _runtime) = FakeRuntime::pair();
        let result = client.initialize(Duration::from_millis(50)).await;
        assert!(matches!(result, Err(AgentError::Timeout("initialize", _))));
    }

    #[tokio::test]
    async fn test_disconnect_without_process() {
        let (client, _runtime) = FakeRuntime::pair();
        client.disconnect().await.unwrap();
    }
}
