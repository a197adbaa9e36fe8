use std::time::Duration;

use serde_json::Value;

use crate::error::{RelayError, Result};
use crate::invoker::ToolInvoker;
use crate::prompts;
use crate::provider::{ModelReply, ModelService};
use crate::routing::InstructionPolicy;
use crate::types::{ChatMessage, Conversation, ProposedCall, ToolCallRequest, ToolCallResult};

/// Where the loop is between steps.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    AwaitingModel,
    Invoking(Vec<ProposedCall>),
    Done(String),
}

/// A tool call made during the loop, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub tool: String,
    pub arguments: String,
    pub result: ToolCallResult,
}

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub answer: String,
    pub conversation: Conversation,
    pub turns: u32,
    pub invocations: Vec<Invocation>,
}

/// Tool-augmented loop over the model, bounded by a turn budget.
pub struct AgentLoop<'a> {
    model: &'a dyn ModelService,
    invoker: &'a ToolInvoker,
    policy: &'a InstructionPolicy,
    max_turns: u32,
    tool_timeout: Duration,
}

impl<'a> AgentLoop<'a> {
    pub fn new(
        model: &'a dyn ModelService,
        invoker: &'a ToolInvoker,
        policy: &'a InstructionPolicy,
        max_turns: u32,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            model,
            invoker,
            policy,
            max_turns,
            tool_timeout,
        }
    }

    /// Opening history: the system instruction and the user's query.
    pub fn start(&self, query: &str) -> Conversation {
        let names: Vec<String> = self.invoker.registry().names().into_iter().collect();
        let system = prompts::agent_system_instruction(&names, &self.policy.extra_rules);

        let user = if self.policy.remind_tool_use {
            format!("{} {}", query.trim(), prompts::TOOL_USE_REMINDER)
        } else {
            query.trim().to_string()
        };

        Conversation::new()
            .appended(ChatMessage::system(system))
            .appended(ChatMessage::user(user))
    }

    /// Advance one state. Tool failures are written into the history; only a
    /// model error fails the step.
    pub async fn step(
        &self,
        state: LoopState,
        conversation: Conversation,
        invocations: &mut Vec<Invocation>,
    ) -> Result<(LoopState, Conversation)> {
        match state {
            LoopState::AwaitingModel => {
                let specs = self.invoker.registry().specs();
                match self.model.infer(&conversation, &specs).await? {
                    ModelReply::ToolCalls { content, calls } => {
                        let conversation = conversation.appended(ChatMessage::assistant_with_calls(
                            content.unwrap_or_default(),
                            calls.clone(),
                        ));
                        Ok((LoopState::Invoking(calls), conversation))
                    }
                    ModelReply::Text(text) => {
                        let conversation = conversation.appended(ChatMessage::assistant(text.clone()));
                        Ok((LoopState::Done(text), conversation))
                    }
                }
            }

            LoopState::Invoking(calls) => {
                let mut conversation = conversation;
                for call in calls {
                    let request =
                        ToolCallRequest::new(call.name.clone(), Value::String(call.arguments.clone()));
                    let result = self.invoker.invoke(&request, self.tool_timeout).await;

                    tracing::info!(
                        tool.name = %call.name,
                        success = result.is_success(),
                        "Tool call completed"
                    );

                    conversation = conversation
                        .appended(ChatMessage::tool_result(call.id.clone(), result.to_model_text()));
                    invocations.push(Invocation {
                        tool: call.name,
                        arguments: call.arguments,
                        result,
                    });
                }
                Ok((LoopState::AwaitingModel, conversation))
            }

            done @ LoopState::Done(_) => Ok((done, conversation)),
        }
    }

    /// Run to a final answer or fail with `TurnBudgetExceeded`.
    #[tracing::instrument(skip(self, query), fields(max_turns = self.max_turns))]
    pub async fn run(&self, query: &str) -> Result<AgentOutcome> {
        let mut conversation = self.start(query);
        let mut state = LoopState::AwaitingModel;
        let mut invocations = Vec::new();
        let mut turns = 0;

        loop {
            match &state {
                LoopState::Done(answer) => {
                    return Ok(AgentOutcome {
                        answer: answer.clone(),
                        conversation,
                        turns,
                        invocations,
                    });
                }
                LoopState::AwaitingModel => {
                    if turns >= self.max_turns {
                        tracing::warn!(turns, "Turn budget exhausted");
                        return Err(RelayError::TurnBudgetExceeded(self.max_turns));
                    }
                    turns += 1;
                    tracing::info!(iteration = turns, "Starting agent loop iteration");
                }
                LoopState::Invoking(calls) => {
                    tracing::debug!(calls = calls.len(), "Invoking proposed tools");
                }
            }

            (state, conversation) = self.step(state, conversation, &mut invocations).await?;
        }
    }
}
