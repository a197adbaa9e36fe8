//! Model service: the `ModelService` seam and its OpenAI-compatible
//! implementation.

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall,
    FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::types::{ChatMessage, Conversation, ProposedCall, Role, ToolSpec};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// What the model wants to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    ToolCalls {
        /// Text the model emitted alongside the calls, if any.
        content: Option<String>,
        calls: Vec<ProposedCall>,
    },
    Text(String),
}

/// A chat model that can propose tool calls.
#[async_trait]
pub trait ModelService: Send + Sync {
    /// One inference over the full history with `tools` enabled.
    async fn infer(
        &self,
        conversation: &Conversation,
        tools: &[ToolSpec],
    ) -> Result<ModelReply, ModelError>;

    /// Plain completion with tools disabled.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other,
}

/// Parsed first choice of a chat completion.
#[derive(Debug, Clone)]
pub struct ChatCompletionResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ProposedCall>,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let defaults = relayconf::ModelConfig::default();
        Self {
            model: defaults.model,
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }
}

/// Chat completions against any OpenAI-compatible endpoint (Groq by default).
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    generation: GenerationConfig,
}

impl OpenAiProvider {
    pub fn new(config: &relayconf::ModelConfig) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ModelError::Request(format!("Failed to build HTTP client: {}", e)))?;

        let openai_config = OpenAIConfig::new()
            .with_api_base(config.base_url.trim_end_matches('/'))
            .with_api_key(config.api_key.clone().unwrap_or_default());

        Ok(Self {
            client: Client::with_config(openai_config).with_http_client(http),
            generation: GenerationConfig {
                model: config.model.clone(),
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
        })
    }

    pub fn convert_tools(tools: &[ToolSpec]) -> Vec<ChatCompletionTool> {
        tools
            .iter()
            .map(|tool| ChatCompletionTool {
                r#type: ChatCompletionToolType::Function,
                function: FunctionObject {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: Some(tool.parameters.clone()),
                    strict: None,
                },
            })
            .collect()
    }

    pub fn convert_messages(
        messages: &[ChatMessage],
    ) -> Result<Vec<ChatCompletionRequestMessage>, ModelError> {
        messages.iter().map(convert_message).collect()
    }

    #[tracing::instrument(
        skip(self, messages, tools),
        fields(model = %self.generation.model, messages = messages.len())
    )]
    pub async fn chat(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: Option<Vec<ChatCompletionTool>>,
    ) -> Result<ChatCompletionResponse, ModelError> {
        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(&self.generation.model)
            .messages(messages)
            .temperature(self.generation.temperature)
            .max_completion_tokens(self.generation.max_tokens);

        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            request.tools(tools);
        }

        let request = request
            .build()
            .map_err(|e| ModelError::Request(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("no choices in response".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ProposedCall {
                id: if tc.id.is_empty() {
                    uuid::Uuid::new_v4().to_string()
                } else {
                    tc.id
                },
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let finish_reason = match choice.finish_reason {
            Some(async_openai::types::FinishReason::Stop) => FinishReason::Stop,
            Some(async_openai::types::FinishReason::Length) => FinishReason::Length,
            Some(async_openai::types::FinishReason::ToolCalls) => FinishReason::ToolCalls,
            Some(async_openai::types::FinishReason::ContentFilter) => FinishReason::ContentFilter,
            _ => FinishReason::Other,
        };

        Ok(ChatCompletionResponse {
            content: choice.message.content,
            tool_calls,
            finish_reason,
        })
    }
}

fn convert_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage, ModelError> {
    let built: Result<ChatCompletionRequestMessage, async_openai::error::OpenAIError> =
        match message.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(message.content.as_str())
                .build()
                .map(Into::into),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(message.content.as_str())
                .build()
                .map(Into::into),
            Role::Assistant => {
                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                if !message.content.is_empty() || message.tool_calls.is_empty() {
                    args.content(message.content.as_str());
                }
                if !message.tool_calls.is_empty() {
                    args.tool_calls(
                        message
                            .tool_calls
                            .iter()
                            .map(|call| ChatCompletionMessageToolCall {
                                id: call.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: call.name.clone(),
                                    arguments: call.arguments.clone(),
                                },
                            })
                            .collect::<Vec<_>>(),
                    );
                }
                args.build().map(Into::into)
            }
            Role::Tool => ChatCompletionRequestToolMessageArgs::default()
                .content(message.content.as_str())
                .tool_call_id(message.tool_call_id.clone().unwrap_or_default())
                .build()
                .map(Into::into),
        };

    built.map_err(|e| ModelError::Request(format!("Failed to build message: {}", e)))
}

#[async_trait]
impl ModelService for OpenAiProvider {
    async fn infer(
        &self,
        conversation: &Conversation,
        tools: &[ToolSpec],
    ) -> Result<ModelReply, ModelError> {
        let messages = Self::convert_messages(conversation.messages())?;
        let response = self.chat(messages, Some(Self::convert_tools(tools))).await?;

        if !response.tool_calls.is_empty() {
            return Ok(ModelReply::ToolCalls {
                content: response.content.filter(|c| !c.trim().is_empty()),
                calls: response.tool_calls,
            });
        }

        match (response.finish_reason, response.content) {
            (FinishReason::ToolCalls, _) => Err(ModelError::InvalidResponse(
                "tool_calls finish reason but no tool calls".into(),
            )),
            (_, Some(content)) => Ok(ModelReply::Text(content)),
            (reason, None) => Err(ModelError::InvalidResponse(format!(
                "no content (finish reason {:?})",
                reason
            ))),
        }
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let messages = Self::convert_messages(messages)?;
        let response = self.chat(messages, None).await?;
        Ok(response.content.unwrap_or_default())
    }
}
