use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::ToolBackend;
use crate::error::ErrorKind;

/// Declared type of a tool parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    /// No type declared; anything goes.
    Any,
    /// `anyOf` or a JSON type array with more than one non-null member.
    Union(Vec<ParamType>),
}

impl ParamType {
    pub fn from_json_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Integer => f.write_str("integer"),
            Self::Number => f.write_str("number"),
            Self::Boolean => f.write_str("boolean"),
            Self::Array => f.write_str("array"),
            Self::Object => f.write_str("object"),
            Self::Any => f.write_str("any"),
            Self::Union(members) => {
                let names: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                f.write_str(&names.join(" | "))
            }
        }
    }
}

/// One parameter as declared by a tool's input schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub ty: ParamType,
    pub required: bool,
    /// `null` is an acceptable value.
    pub nullable: bool,
    pub default: Option<Value>,
}

/// A callable tool, immutable after discovery.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: Option<String>,
    /// Parameters in schema declaration order.
    pub params: Vec<(String, ParamSpec)>,
    /// Raw input schema, forwarded to the model untouched.
    pub input_schema: Value,
    pub backend: Arc<dyn ToolBackend>,
}

impl ToolDescriptor {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, p)| p)
    }

    /// Model-facing view of this tool.
    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema.clone(),
        }
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("backend", &self.backend.name())
            .finish()
    }
}

/// Tool definition as handed to the model service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

/// A tool call before validation.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub tool_name: String,
    /// Usually an object; a JSON string holding an object is also accepted.
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// What a successful tool call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    Text(String),
    Structured(Value),
}

impl ToolPayload {
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(Value::String(s)) => s.clone(),
            Self::Structured(value) => value.to_string(),
        }
    }
}

impl From<Value> for ToolPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s),
            other => Self::Structured(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallResult {
    Success(ToolPayload),
    Failure { kind: ErrorKind, message: String },
}

impl ToolCallResult {
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Text fed back to the model as the tool-result message.
    pub fn to_model_text(&self) -> String {
        match self {
            Self::Success(payload) => payload.as_text(),
            Self::Failure { kind, message } => match kind {
                ErrorKind::NotFound => format!("Tool error: {}. Use only the listed tools.", message),
                ErrorKind::Validation => format!("Tool error: invalid arguments. {}", message),
                ErrorKind::Domain => format!("Tool error: {}", message),
                ErrorKind::BackendUnavailable => {
                    format!("Tool error: the tool is unavailable right now ({})", message)
                }
            },
        }
    }
}

/// Outcome of the routing heuristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Let the model pick tools.
    Delegate,
    /// Invoke `tool` with its primary argument set to `argument`.
    ForceTool { tool: String, argument: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// A tool call proposed by the model. `arguments` is the raw JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ProposedCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ProposedCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::plain(Role::Assistant, content)
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::plain(Role::Tool, content)
        }
    }
}

/// Append-only message history for one agent run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the history and return it with `message` appended.
    pub fn appended(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_is_append_only() {
        let conv = Conversation::new()
            .appended(ChatMessage::system("rules"))
            .appended(ChatMessage::user("hi"));
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[0].role, Role::System);
        assert_eq!(conv.last().map(|m| m.content.as_str()), Some("hi"));
    }

    #[test]
    fn test_payload_text() {
        assert_eq!(ToolPayload::from(serde_json::json!("8")).as_text(), "8");
        assert_eq!(ToolPayload::from(serde_json::json!(96)).as_text(), "96");
        assert_eq!(
            ToolPayload::Structured(serde_json::json!({"a": 1})).as_text(),
            r#"{"a":1}"#
        );
    }

    #[test]
    fn test_failure_text_is_readable() {
        let result = ToolCallResult::failure(ErrorKind::Domain, "Division by zero is not allowed.");
        assert_eq!(
            result.to_model_text(),
            "Tool error: Division by zero is not allowed."
        );
    }

    #[test]
    fn test_union_display() {
        let ty = ParamType::Union(vec![ParamType::Boolean, ParamType::Integer]);
        assert_eq!(ty.to_string(), "boolean | integer");
    }
}
