//! Removes tool-call markup that leaked into a candidate answer.

use regex::Regex;

use crate::prompts;
use crate::provider::ModelService;
use crate::types::ChatMessage;

/// Fixed signature of leaked tool-call markup.
pub const MARKUP_SIGNATURE: &str = "<function=";

/// True when `text` carries tool-call markup.
pub fn contains_tool_markup(text: &str) -> bool {
    text.contains(MARKUP_SIGNATURE) || text.contains("</function>")
}

pub struct Reconciler {
    markup: Regex,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            markup: Regex::new(r"</?function[^>]*>").unwrap(),
        }
    }

    /// Mechanical fallback: delete the tags, keep everything else.
    pub fn strip_tool_markup(&self, text: &str) -> String {
        self.markup.replace_all(text, "").trim().to_string()
    }

    /// Return `candidate` free of tool-call markup. Clean text comes back
    /// untouched; otherwise one corrective rewrite is requested and the tags
    /// are stripped if that does not produce clean text.
    #[tracing::instrument(skip_all)]
    pub async fn reconcile(&self, model: &dyn ModelService, query: &str, candidate: &str) -> String {
        if !contains_tool_markup(candidate) {
            return candidate.to_string();
        }

        tracing::info!("Answer contains tool-call markup, requesting rewrite");
        let messages = [
            ChatMessage::system(prompts::REWRITE_INSTRUCTION),
            ChatMessage::user(query),
            ChatMessage::assistant(candidate),
        ];

        match model.complete(&messages).await {
            Ok(rewritten) if !rewritten.trim().is_empty() && !contains_tool_markup(&rewritten) => {
                rewritten.trim().to_string()
            }
            Ok(_) => {
                tracing::warn!("Rewrite was empty or still marked up, stripping tags");
                self.strip_tool_markup(candidate)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rewrite failed, stripping tags");
                self.strip_tool_markup(candidate)
            }
        }
    }
}
