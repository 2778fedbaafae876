//! Fixed instruction templates for the planning and synthesis calls.

use crate::llm::ChatMessage;
use crate::state::Mode;

const PLANNING_SYSTEM: &str = "You are an expert research assistant. Your task is to break down \
a research topic into subtopics and determine how deep each subtopic should be explored.";

const SYNTHESIS_SYSTEM: &str = "You are a research synthesis assistant. Your task is to summarize \
validated notes into a structured, concise report with references.";

pub fn planning_messages(topic: &str, mode: Mode) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(PLANNING_SYSTEM),
        ChatMessage::user(format!(
            "Topic: {topic}\n\
             Mode: {mode}\n\n\
             Instructions:\n\
             - Generate a list of subtopics to research named subtopics\n\
             - Determine depth_required (1=shallow, 3=deep).\n\
             - Indicate if math is needed for understanding.\n\
             - Indicate if sources are required.\n\
             Respond with a single JSON object with the keys subtopics, \
             depth_required, requires_math and requires_sources."
        )),
    ]
}

pub fn synthesis_messages(topic: &str, note_block: &str, source_block: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYNTHESIS_SYSTEM),
        ChatMessage::user(format!(
            "Topic: {topic}\n\
             Validated Notes:\n{note_block}\n\n\
             Sources:\n{source_block}\n\n\
             Instructions:\n\
             - Summarize the notes into clear paragraphs.\n\
             - Keep references at the end.\n\
             - Output should be a single string suitable for a report.\n\
             - If the topic is related to math, include the math formulas and equations."
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planning_template_carries_topic_and_mode() {
        let messages = planning_messages("String Theory", Mode::Deep);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[1].content.contains("Topic: String Theory"));
        assert!(messages[1].content.contains("Mode: deep"));
        assert!(messages[1].content.contains("depth_required"));
    }

    #[test]
    fn synthesis_template_embeds_both_blocks() {
        let messages = synthesis_messages("Topic", "- note one", "- http://src");
        assert!(messages[1].content.contains("- note one"));
        assert!(messages[1].content.contains("- http://src"));
    }
}
