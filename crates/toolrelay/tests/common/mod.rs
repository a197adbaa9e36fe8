//! Shared fakes for toolrelay integration tests: a scripted model service and
//! in-memory tool backends.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use toolrelay::provider::{ModelError, ModelReply, ModelService};
use toolrelay::{
    BackendError, ChatMessage, Conversation, ProposedCall, ToolBackend, ToolInfo, ToolSpec,
};

/// Model service that replays canned replies and records what it was sent.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelReply, ModelError>>>,
    completions: Mutex<VecDeque<Result<String, ModelError>>>,
    inferred: Mutex<Vec<Conversation>>,
    completed: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, reply: ModelReply) -> Self {
        self.replies.lock().unwrap().push_back(Ok(reply));
        self
    }

    pub fn reply_err(self, error: ModelError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn completion(self, text: &str) -> Self {
        self.completions.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn completion_err(self, error: ModelError) -> Self {
        self.completions.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn infer_count(&self) -> usize {
        self.inferred.lock().unwrap().len()
    }

    pub fn complete_count(&self) -> usize {
        self.completed.lock().unwrap().len()
    }

    pub fn inferred(&self) -> Vec<Conversation> {
        self.inferred.lock().unwrap().clone()
    }

    pub fn completed(&self) -> Vec<Vec<ChatMessage>> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelService for ScriptedModel {
    async fn infer(
        &self,
        conversation: &Conversation,
        _tools: &[ToolSpec],
    ) -> Result<ModelReply, ModelError> {
        self.inferred.lock().unwrap().push(conversation.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Request("script exhausted".into())))
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        self.completed.lock().unwrap().push(messages.to_vec());
        self.completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Request("script exhausted".into())))
    }
}

pub fn call(id: &str, name: &str, arguments: Value) -> ProposedCall {
    ProposedCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}

pub fn tool_calls(calls: Vec<ProposedCall>) -> ModelReply {
    ModelReply::ToolCalls {
        content: None,
        calls,
    }
}

type Handler = Box<dyn Fn(&str, &Value) -> Result<Value, BackendError> + Send + Sync>;

/// In-memory backend with a fixed tool list and a pluggable handler.
pub struct FakeBackend {
    name: String,
    tools: Vec<ToolInfo>,
    handler: Handler,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, Value)>>,
}

impl FakeBackend {
    pub fn new(
        name: &str,
        tools: Vec<ToolInfo>,
        handler: impl Fn(&str, &Value) -> Result<Value, BackendError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            tools,
            handler: Box::new(handler),
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before every call; combine with a short invoker timeout.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<(String, Value)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolBackend for FakeBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>, BackendError> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((tool.to_string(), arguments.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(tool, &arguments)
    }
}

/// Backend whose tool listing always fails.
pub struct UnreachableBackend(pub String);

#[async_trait]
impl ToolBackend for UnreachableBackend {
    fn name(&self) -> &str {
        &self.0
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>, BackendError> {
        Err(BackendError::Transport("connection refused".into()))
    }

    async fn call_tool(&self, tool: &str, _arguments: Value) -> Result<Value, BackendError> {
        Err(BackendError::UnknownTool(tool.to_string()))
    }
}

pub fn tool(name: &str, schema: Value) -> ToolInfo {
    ToolInfo {
        name: name.to_string(),
        description: Some(format!("{} tool", name)),
        input_schema: schema,
    }
}

pub fn two_ints() -> Value {
    json!({
        "type": "object",
        "properties": {
            "a": {"type": "integer"},
            "b": {"type": "integer"}
        },
        "required": ["a", "b"]
    })
}

pub fn one_string(param: &str) -> Value {
    json!({
        "type": "object",
        "properties": { param: {"type": "string"} },
        "required": [param]
    })
}

/// Math backend serving `add` and `multiple` over integer arguments.
pub fn math_backend() -> Arc<FakeBackend> {
    Arc::new(FakeBackend::new(
        "math",
        vec![tool("add", two_ints()), tool("multiple", two_ints())],
        |tool, args| {
            let a = args["a"].as_i64().unwrap_or_default();
            let b = args["b"].as_i64().unwrap_or_default();
            match tool {
                "add" => Ok(json!(a + b)),
                "multiple" => Ok(json!(a * b)),
                other => Err(BackendError::UnknownTool(other.to_string())),
            }
        },
    ))
}
