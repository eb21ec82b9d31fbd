//! Test doubles for driving sessions without a real runtime

use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::Console;
use crate::agent::AgentClient;

/// Runtime stand-in that answers each user message with the next script
pub struct ScriptedRuntime {
    replies: Vec<Vec<Value>>,
}

impl ScriptedRuntime {
    pub fn new(replies: Vec<Vec<Value>>) -> Self {
        Self { replies }
    }

    /// Run the script; the handle yields every message the client sent
    pub fn spawn(self) -> (AgentClient, JoinHandle<Vec<Value>>) {
        let (to_runtime, mut sent) = mpsc::channel::<String>(64);
        let (reply, from_runtime) = mpsc::channel::<String>(64);
        let client = AgentClient::from_channels(to_runtime, from_runtime);

        let handle = tokio::spawn(async move {
            let mut replies = self.replies.into_iter();
            let mut received = Vec::new();

            while let Some(line) = sent.recv().await {
                let message: Value = serde_json::from_str(&line).unwrap();
                let is_user = message["type"] == "user";
                received.push(message);

                if is_user {
                    let script = replies.next().unwrap_or_else(|| vec![Self::finished()]);
                    for value in script {
                        if reply.send(value.to_string()).await.is_err() {
                            break;
                        }
                    }
                }
            }
            received
        });

        (client, handle)
    }

    /// Runtime driven step by step from the test body
    pub fn manual() -> (AgentClient, ManualRuntime) {
        let (to_runtime, sent) = mpsc::channel(64);
        let (reply, from_runtime) = mpsc::channel(64);
        (
            AgentClient::from_channels(to_runtime, from_runtime),
            ManualRuntime { sent, reply },
        )
    }

    pub fn text(text: &str) -> Value {
        json!({"type": "assistant", "message": {"content": [{"type": "text", "text": text}]}})
    }

    pub fn tool_use(name: &str) -> Value {
        json!({"type": "assistant", "message": {"content": [
            {"type": "tool_use", "id": format!("tu-{}", name), "name": name, "input": {}}
        ]}})
    }

    pub fn tool_error(error: &str) -> Value {
        json!({"type": "user", "message": {"content": [
            {"type": "tool_result", "tool_use_id": "tu", "content": error, "is_error": true}
        ]}})
    }

    pub fn permission(request_id: &str, tool_name: &str, input: Value) -> Value {
        json!({"type": "control_request", "request_id": request_id, "request": {
            "subtype": "can_use_tool", "tool_name": tool_name, "input": input}})
    }

    pub fn finished() -> Value {
        json!({"type": "result", "subtype": "success", "is_error": false,
               "num_turns": 1, "duration_ms": 5, "result": ""})
    }
}

pub struct ManualRuntime {
    sent: mpsc::Receiver<String>,
    reply: mpsc::Sender<String>,
}

impl ManualRuntime {
    pub async fn emit(&self, value: Value) {
        self.reply.send(value.to_string()).await.unwrap();
    }

    pub async fn next_sent(&mut self) -> Value {
        let line = self.sent.recv().await.unwrap();
        serde_json::from_str(&line).unwrap()
    }

    pub fn try_next_sent(&mut self) -> Option<Value> {
        self.sent
            .try_recv()
            .ok()
            .map(|line| serde_json::from_str(&line).unwrap())
    }
}

/// Console over a fixed input buffer, capturing output
pub fn console_with_input(
    input: &'static [u8],
) -> (Console<&'static [u8], Vec<u8>>, broadcast::Sender<()>) {
    let (tx, rx) = broadcast::channel(4);
    (Console::new(input, Vec::new(), rx), tx)
}
