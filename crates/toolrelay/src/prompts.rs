//! Prompt text sent to the model service.

/// System instruction for the agent loop, naming the exact allowed tools.
pub fn agent_system_instruction(tool_names: &[String], extra_rules: &[String]) -> String {
    let listed = if tool_names.is_empty() {
        "(none)".to_string()
    } else {
        tool_names.join(", ")
    };

    let mut text = format!(
        "You are a strict tool-using agent. You may ONLY use these tools: {listed}. \
         Do NOT call any tool name that is not listed here (for example brave_search, \
         web_search or browser when they are not listed). \
         If a listed tool can answer the user's question, you MUST call it before answering. \
         For any question about weather, temperature, forecast, conditions, humidity, wind \
         or a city's current conditions, call `get_weather` with a `location` argument when it is listed. \
         Never nest tool calls inside another tool's parameters; make sequential calls instead \
         (for example call `add` to get a number, then call `multiple` with that result). \
         Your FINAL answer must be plain natural language with no tool-call tags, XML or function markup."
    );

    for rule in extra_rules {
        text.push(' ');
        text.push_str(rule);
    }

    text
}

/// Appended to each user message when the policy asks for it.
pub const TOOL_USE_REMINDER: &str = "If a tool exists that can answer this question, you MUST call that tool. \
     Do not guess about real-world data when a tool is available.";

/// Corrective instruction used when an answer leaked tool-call markup.
pub const REWRITE_INSTRUCTION: &str = "Rewrite the assistant's last message as a final natural-language answer. \
     Do NOT call tools or include any tool-call markup. \
     If arithmetic is implied, compute it and provide the final number.";

/// Instruction for condensing web search output.
pub fn summarize_instruction(max_words: usize) -> String {
    let min_words = (max_words * 2 / 3).max(1);
    format!(
        "Summarize the search results below to answer the user's request. \
         Write {min_words} to {max_words} words of plain prose. \
         Do not include links, URLs, citations, markdown or tool-call markup. \
         If the results do not answer the request, say so briefly."
    )
}
