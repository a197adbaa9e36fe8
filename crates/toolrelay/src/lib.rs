//! toolrelay - answers natural-language queries with an LLM and a set of
//! tools discovered from MCP backends.
//!
//! A query is first checked by a deterministic router that may force a
//! weather or web search tool. Otherwise the model drives a bounded
//! tool-calling loop. Answers that leak tool-call markup are rewritten, and
//! an ordered list of fallback stages guarantees a text answer.

pub mod agent_loop;
pub mod backend;
pub mod builtin;
pub mod dispatcher;
pub mod error;
pub mod invoker;
pub mod prompts;
pub mod provider;
pub mod reconcile;
pub mod registry;
pub mod relay;
pub mod routing;
pub mod schema;
pub mod types;

pub use agent_loop::{AgentLoop, AgentOutcome, Invocation, LoopState};
pub use backend::{BackendError, ToolBackend, ToolInfo};
pub use dispatcher::{DispatchSettings, QueryDispatcher, Stage, APOLOGY, DEFAULT_STAGES};
pub use error::{ErrorKind, RelayError, Result};
pub use invoker::ToolInvoker;
pub use provider::{ModelError, ModelReply, ModelService, OpenAiProvider};
pub use reconcile::Reconciler;
pub use registry::ToolRegistry;
pub use relay::Relay;
pub use routing::{InstructionPolicy, QueryRouter};
pub use types::{
    ChatMessage, Conversation, ParamSpec, ParamType, ProposedCall, Role, RoutingDecision,
    ToolCallRequest, ToolCallResult, ToolDescriptor, ToolPayload, ToolSpec,
};
