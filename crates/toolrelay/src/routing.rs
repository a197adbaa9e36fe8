//! Deterministic routing: decide from the query text alone whether a tool
//! must run before the model is consulted.
//!
//! Models are unreliable at calling the weather tool for weather questions and
//! at searching for anything time-sensitive, so these two families are
//! recognised by pattern and forced. Everything else is delegated.

use std::collections::BTreeSet;

use regex::Regex;

use crate::types::RoutingDecision;

pub const WEATHER_TOOL: &str = "get_weather";
pub const SEARCH_TOOL: &str = "web_search";

/// Knobs for routing and for the agent's system instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionPolicy {
    /// When false every query is delegated to the model.
    pub forced_routing: bool,
    /// Append a "use the tools" reminder to each user message.
    pub remind_tool_use: bool,
    /// Extra rules appended to the system instruction.
    pub extra_rules: Vec<String>,
}

impl Default for InstructionPolicy {
    fn default() -> Self {
        Self {
            forced_routing: true,
            remind_tool_use: true,
            extra_rules: Vec::new(),
        }
    }
}

impl InstructionPolicy {
    pub fn from_config(config: &relayconf::RoutingConfig) -> Self {
        Self {
            forced_routing: config.forced,
            ..Self::default()
        }
    }
}

/// Compiled routing patterns.
pub struct QueryRouter {
    weather_keywords: Regex,
    weather_slots: Vec<Regex>,
    location_strips: Vec<Regex>,
    search_signals: Vec<Regex>,
    topic_strips: Vec<Regex>,
}

impl Default for QueryRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryRouter {
    pub fn new() -> Self {
        let re = |pattern: &str| Regex::new(pattern).unwrap();

        Self {
            weather_keywords: re(
                r"(?i)\b(?:weather|temperature|forecast|conditions|humidity|humid|wind|windy)\b",
            ),
            weather_slots: vec![
                // "is it raining in Paris", "will it be sunny at the coast"
                re(r"(?i)\b(?:is|will)\s+it\s+(?:be\s+)?(?:raining|rain|snowing|snow|sunny|cloudy|foggy|hot|cold|warm|freezing)\b.*\b(?:in|at)\s+\S"),
                // "what's it like outside in Berlin"
                re(r"(?i)\b(?:what(?:'s|’s|\s+is)|how(?:'s|’s|\s+is))\s+it\s+like\s+(?:outside\s+)?in\s+\S"),
            ],
            location_strips: vec![
                re(r"(?i)^(?:hi|hello|hey)\b[,!.\s]*"),
                re(r"(?i)^(?:please\s+)?(?:can|could|would)\s+you\s+(?:please\s+)?"),
                re(r"(?i)^(?:(?:tell|show|give)\s+me\s+|(?:get|check|find)\s+)"),
                re(r"(?i)^(?:what(?:'s|’s|\s+is)|how(?:'s|’s|\s+is)|is\s+it|will\s+it(?:\s+be)?)\s+"),
                re(r"(?i)^(?:the\s+)?(?:current\s+|today'?s\s+)?(?:weather|temperature|forecast|conditions|humidity|wind)(?:\s+(?:like|forecast|conditions|report))?\b\s*"),
                re(r"(?i)^(?:it\s+like\s+(?:outside\s+)?|(?:raining|rain|snowing|snow|sunny|cloudy|foggy|hot|cold|warm|freezing)\b\s*)"),
                re(r"(?i)^(?:right\s+now|now|today|tonight|tomorrow|currently)\s+"),
                re(r"(?i)^(?:in|for|at|near|around|of)\s+"),
                re(r"(?i)\s+(?:right\s+now|now|today|tonight|tomorrow|currently|this\s+(?:morning|afternoon|evening|week|weekend))\s*[?.!]*$"),
                re(r"(?i)\s+(?:weather|forecast|temperature)\s*[?.!]*$"),
                re(r"[\s?.!,]+$"),
            ],
            search_signals: vec![
                re(r"(?i)\b(?:search|find|look\s+up|lookup|google)\b"),
                re(r"(?i)\b(?:news|latest|recent|update|updates|history|timeline|compare|comparison|versus|best|top|pricing|price|documentation|docs|tutorial|guide|release|released|research|benchmark|benchmarks|repository|repo)\b"),
                re(r"\?\s*$"),
            ],
            topic_strips: vec![
                re(r"^(?:please\s+)?(?:(?:can|could|would)\s+you\s+)?(?:please\s+)?"),
                re(r"^(?:search|look\s+up|lookup|google|find)\s+(?:(?:the\s+)?(?:web|internet|online)\s+)?"),
                re(r"^(?:for|about)\s+"),
                re(r"^the\s+"),
                re(r"[\s?.!,]+$"),
            ],
        }
    }

    /// Route `query` given the tools currently registered.
    pub fn decide(
        &self,
        query: &str,
        known_tools: &BTreeSet<String>,
        policy: &InstructionPolicy,
    ) -> RoutingDecision {
        if !policy.forced_routing {
            return RoutingDecision::Delegate;
        }

        if known_tools.contains(WEATHER_TOOL) && self.is_weather_query(query) {
            return RoutingDecision::ForceTool {
                tool: WEATHER_TOOL.to_string(),
                argument: self.extract_location(query),
            };
        }

        if known_tools.contains(SEARCH_TOOL) && self.is_search_query(query) {
            return RoutingDecision::ForceTool {
                tool: SEARCH_TOOL.to_string(),
                argument: self.extract_topic(query),
            };
        }

        RoutingDecision::Delegate
    }

    pub fn is_weather_query(&self, query: &str) -> bool {
        self.weather_keywords.is_match(query) || self.weather_slots.iter().any(|r| r.is_match(query))
    }

    pub fn is_search_query(&self, query: &str) -> bool {
        self.search_signals.iter().any(|r| r.is_match(query))
    }

    /// Location named in a weather query; the whole query if nothing is left.
    pub fn extract_location(&self, query: &str) -> String {
        let location = self
            .location_strips
            .iter()
            .fold(query.trim().to_string(), |acc, r| r.replace(&acc, "").into_owned());

        if location.trim().is_empty() {
            query.trim().to_string()
        } else {
            location.trim().to_string()
        }
    }

    /// Search topic: lowercased query minus search-intent lead-ins.
    pub fn extract_topic(&self, query: &str) -> String {
        let topic = self
            .topic_strips
            .iter()
            .fold(query.trim().to_lowercase(), |acc, r| r.replace(&acc, "").into_owned());

        if topic.trim().is_empty() {
            query.trim().to_string()
        } else {
            topic.trim().to_string()
        }
    }
}
