//! Prompt text for the aggregation strategies.
//!
//! Every completion call is a fresh two-message conversation: the research
//! helper system message followed by one user prompt built here.

use crate::llm::Message;

/// System message sent with every completion call.
pub const SYSTEM_PROMPT: &str = "You are a scientific research helper. You provide concise and \
     accurate summaries that highlight the most important data.";

/// Separator between partial summaries in the reduce prompt.
pub const SUMMARY_SEPARATOR: &str = "\n\n";

const FOCUS: &str = "Focus on facts related to what the researchers created and why, not on \
     details of the researchers themselves";

/// Prompt for the first chunk of a refine run.
pub fn initial_summary(text: &str) -> String {
    format!(
        "Write a concise summary of the following section of scientific text. {FOCUS}:\n\
         {text}\n\
         CONCISE SUMMARY:"
    )
}

/// Prompt asking the model to revise `current_summary` with `text`, or keep it.
pub fn refine_summary(current_summary: &str, text: &str) -> String {
    format!(
        "Your job is to produce a final summary of a scientific paper.\n\
         We have provided an existing summary up to a certain point: {current_summary}\n\
         We have the opportunity to refine the existing summary (only if needed) with some \
         more context below.\n\
         ------------\n\
         {text}\n\
         ------------\n\
         Given the new context, refine the original summary if needed. \
         If the context isn't useful, return the original summary.\n\
         SUMMARY TEXT:"
    )
}

/// Prompt for one map-phase call.
pub fn page_summary(text: &str) -> String {
    format!(
        "Write a short summary of the following section of scientific text. {FOCUS}:\n\
         {text}\n\
         CONCISE SUMMARY:"
    )
}

/// Prompt for the reduce call over all partial summaries, in order.
pub fn final_summary(partials: &[String]) -> String {
    let joined = partials.join(SUMMARY_SEPARATOR);
    format!(
        "Given the following summaries of scientific text, produce a short summary of no more \
         than 3 paragraphs. Focus on the novel contributions of the authors.\n\
         {joined}\n\
         CONCISE SUMMARY:"
    )
}

/// Wrap a user prompt with the system message.
pub fn research_messages(prompt: String) -> Vec<Message> {
    vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)]
}
