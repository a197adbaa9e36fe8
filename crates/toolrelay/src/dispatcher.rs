//! Top-level query handling: forced tool or agent loop, reconciliation, and
//! an ordered list of fallback stages that always ends in an answer.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::agent_loop::AgentLoop;
use crate::builtin::search::strip_links;
use crate::invoker::ToolInvoker;
use crate::prompts;
use crate::provider::ModelService;
use crate::reconcile::Reconciler;
use crate::routing::{InstructionPolicy, QueryRouter, SEARCH_TOOL};
use crate::types::{ChatMessage, ParamType, RoutingDecision, ToolCallRequest, ToolCallResult};

pub const APOLOGY: &str = "Sorry, I had trouble answering that.";

/// Fallback stages, tried in order until one yields an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Run the tool the router forced.
    ForcedTool,
    /// Let the model drive tool use.
    AgentLoop,
    /// Return whatever a forced tool produced, unprocessed.
    RawToolOutput,
    Apology,
}

pub const DEFAULT_STAGES: [Stage; 4] = [
    Stage::ForcedTool,
    Stage::AgentLoop,
    Stage::RawToolOutput,
    Stage::Apology,
];

/// What happened to the forced tool, if one ran.
#[derive(Debug, Clone, PartialEq)]
enum ForcedOutcome {
    Output(String),
    Failed(ToolCallResult),
}

/// Per-query state threaded through the stages.
#[derive(Debug)]
struct Attempt<'q> {
    query: &'q str,
    decision: RoutingDecision,
    forced: Option<ForcedOutcome>,
}

enum StageResult {
    Answer(String),
    Pass,
}

impl Stage {
    fn applies(&self, attempt: &Attempt<'_>) -> bool {
        match self {
            Self::ForcedTool => matches!(attempt.decision, RoutingDecision::ForceTool { .. }),
            Self::AgentLoop => {
                attempt.decision == RoutingDecision::Delegate
                    || matches!(attempt.forced, Some(ForcedOutcome::Failed(_)))
            }
            Self::RawToolOutput => matches!(attempt.forced, Some(ForcedOutcome::Output(_))),
            Self::Apology => true,
        }
    }

    /// Answers from these stages pass through the reconciler.
    fn reconciles(&self) -> bool {
        matches!(self, Self::ForcedTool | Self::AgentLoop)
    }
}

/// Budgets and timeouts for one query.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub max_turns: u32,
    pub tool_timeout: Duration,
    pub forced_tool_timeout: Duration,
    pub summary_max_words: usize,
}

impl DispatchSettings {
    pub fn from_config(config: &relayconf::AgentConfig) -> Self {
        Self {
            max_turns: config.max_turns,
            tool_timeout: Duration::from_millis(config.tool_timeout_ms),
            forced_tool_timeout: Duration::from_millis(config.forced_tool_timeout_ms),
            summary_max_words: config.summary_max_words,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&relayconf::AgentConfig::default())
    }
}

pub struct QueryDispatcher {
    model: Arc<dyn ModelService>,
    invoker: ToolInvoker,
    router: QueryRouter,
    reconciler: Reconciler,
    policy: InstructionPolicy,
    settings: DispatchSettings,
    stages: Vec<Stage>,
}

impl QueryDispatcher {
    pub fn new(
        model: Arc<dyn ModelService>,
        invoker: ToolInvoker,
        policy: InstructionPolicy,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            model,
            invoker,
            router: QueryRouter::new(),
            reconciler: Reconciler::new(),
            policy,
            settings,
            stages: DEFAULT_STAGES.to_vec(),
        }
    }

    /// Replace the fallback order.
    pub fn with_stages(mut self, stages: Vec<Stage>) -> Self {
        self.stages = stages;
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn invoker(&self) -> &ToolInvoker {
        &self.invoker
    }

    /// Routing decision for `query` against the registered tools.
    pub fn route(&self, query: &str) -> RoutingDecision {
        self.router
            .decide(query, &self.invoker.registry().names(), &self.policy)
    }

    /// Answer `query`. Never fails; the last resort is a fixed apology.
    #[tracing::instrument(skip(self))]
    pub async fn answer(&self, query: &str) -> String {
        let mut attempt = Attempt {
            query,
            decision: self.route(query),
            forced: None,
        };
        tracing::info!(decision = ?attempt.decision, "Routed query");

        for stage in &self.stages {
            if !stage.applies(&attempt) {
                continue;
            }

            let answer = match self.run_stage(*stage, &mut attempt).await {
                StageResult::Answer(answer) => answer,
                StageResult::Pass => {
                    tracing::debug!(?stage, "Stage passed");
                    continue;
                }
            };

            let answer = if stage.reconciles() {
                self.reconciler
                    .reconcile(self.model.as_ref(), query, &answer)
                    .await
            } else {
                answer
            };

            if answer.trim().is_empty() {
                tracing::debug!(?stage, "Stage produced an empty answer");
                continue;
            }

            tracing::info!(?stage, "Answered");
            return answer;
        }

        APOLOGY.to_string()
    }

    async fn run_stage(&self, stage: Stage, attempt: &mut Attempt<'_>) -> StageResult {
        match stage {
            Stage::ForcedTool => self.run_forced_tool(attempt).await,
            Stage::AgentLoop => {
                let agent = AgentLoop::new(
                    self.model.as_ref(),
                    &self.invoker,
                    &self.policy,
                    self.settings.max_turns,
                    self.settings.tool_timeout,
                );
                match agent.run(attempt.query).await {
                    Ok(outcome) => StageResult::Answer(outcome.answer),
                    Err(e) => {
                        tracing::warn!(error = %e, "Agent loop failed");
                        StageResult::Pass
                    }
                }
            }
            Stage::RawToolOutput => match &attempt.forced {
                Some(ForcedOutcome::Output(text)) => StageResult::Answer(text.clone()),
                _ => StageResult::Pass,
            },
            Stage::Apology => StageResult::Answer(APOLOGY.to_string()),
        }
    }

    async fn run_forced_tool(&self, attempt: &mut Attempt<'_>) -> StageResult {
        let RoutingDecision::ForceTool { tool, argument } = &attempt.decision else {
            return StageResult::Pass;
        };

        let request = ToolCallRequest::new(tool.clone(), self.primary_arguments(tool, argument));
        let result = self
            .invoker
            .invoke(&request, self.settings.forced_tool_timeout)
            .await;

        let output = match result {
            ToolCallResult::Success(payload) => payload.as_text(),
            ToolCallResult::Failure { kind, message } => {
                tracing::warn!(%tool, %kind, %message, "Forced tool failed");
                attempt.forced = Some(ForcedOutcome::Failed(ToolCallResult::Failure {
                    kind,
                    message,
                }));
                return StageResult::Pass;
            }
        };

        if tool != SEARCH_TOOL {
            return StageResult::Answer(output);
        }

        // Kept for RawToolOutput in case the summary fails or reconciles to nothing
        attempt.forced = Some(ForcedOutcome::Output(output.clone()));

        match self.summarize(attempt.query, &output).await {
            Some(summary) => StageResult::Answer(summary),
            None => StageResult::Pass,
        }
    }

    /// Arguments for a forced call: the extracted text goes into the tool's
    /// primary string parameter.
    fn primary_arguments(&self, tool: &str, argument: &str) -> Value {
        let param = self
            .invoker
            .registry()
            .lookup(tool)
            .ok()
            .and_then(|descriptor| {
                let preferred = ["location", "query"]
                    .into_iter()
                    .find(|name| descriptor.param(name).is_some())
                    .map(str::to_string);
                preferred.or_else(|| {
                    descriptor
                        .params
                        .iter()
                        .find(|(_, spec)| spec.required && spec.ty == ParamType::String)
                        .or_else(|| descriptor.params.first())
                        .map(|(name, _)| name.clone())
                })
            })
            .unwrap_or_else(|| "query".to_string());

        let mut args = Map::new();
        args.insert(param, Value::String(argument.to_string()));
        Value::Object(args)
    }

    /// Condense search output into a short, link-free answer.
    async fn summarize(&self, query: &str, results: &str) -> Option<String> {
        let messages = [
            ChatMessage::system(prompts::summarize_instruction(self.settings.summary_max_words)),
            ChatMessage::user(format!("Request: {}\n\nSearch results:\n{}", query, results)),
        ];

        match self.model.complete(&messages).await {
            Ok(summary) => {
                let cleaned = cap_words(&strip_links(&summary), self.settings.summary_max_words);
                (!cleaned.is_empty()).then_some(cleaned)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Search summary failed");
                None
            }
        }
    }
}

/// Keep at most `max_words` whitespace-separated words.
pub fn cap_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.trim().to_string();
    }
    format!("{}…", words[..max_words].join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_words() {
        assert_eq!(cap_words("one two three", 5), "one two three");
        assert_eq!(cap_words("one two three four", 2), "one two…");
    }

    #[test]
    fn test_stage_predicates() {
        let mut attempt = Attempt {
            query: "q",
            decision: RoutingDecision::Delegate,
            forced: None,
        };
        assert!(!Stage::ForcedTool.applies(&attempt));
        assert!(Stage::AgentLoop.applies(&attempt));
        assert!(!Stage::RawToolOutput.applies(&attempt));
        assert!(Stage::Apology.applies(&attempt));

        attempt.decision = RoutingDecision::ForceTool {
            tool: "web_search".into(),
            argument: "rust".into(),
        };
        assert!(Stage::ForcedTool.applies(&attempt));
        assert!(!Stage::AgentLoop.applies(&attempt));

        attempt.forced = Some(ForcedOutcome::Output("raw".into()));
        assert!(!Stage::AgentLoop.applies(&attempt));
        assert!(Stage::RawToolOutput.applies(&attempt));

        attempt.forced = Some(ForcedOutcome::Failed(ToolCallResult::failure(
            crate::error::ErrorKind::BackendUnavailable,
            "timeout",
        )));
        assert!(Stage::AgentLoop.applies(&attempt));
        assert!(!Stage::RawToolOutput.applies(&attempt));
    }

    #[test]
    fn test_default_order() {
        assert_eq!(
            DEFAULT_STAGES,
            [
                Stage::ForcedTool,
                Stage::AgentLoop,
                Stage::RawToolOutput,
                Stage::Apology
            ]
        );
    }
}
