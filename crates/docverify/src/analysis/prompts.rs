//! Prompt templates for the analysis tasks.

use super::AnalysisTask;
use crate::collaborators::ChatRequest;

/// Longest document excerpt placed into a prompt, in characters.
pub const MAX_PROMPT_TEXT_CHARS: usize = 10_000;
const TRUNCATION_MARKER: &str = "\n[...document truncated...]";

const TEMPERATURE: f32 = 0.3;

/// Cuts `text` to [`MAX_PROMPT_TEXT_CHARS`] on a character boundary.
pub fn clip_text(text: &str) -> std::borrow::Cow<'_, str> {
    match text.char_indices().nth(MAX_PROMPT_TEXT_CHARS) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER).into(),
        None => text.into(),
    }
}

/// Builds the completion request for one task over the document text.
pub fn request_for(task: AnalysisTask, text: &str) -> ChatRequest {
    let text = clip_text(text);
    match task {
        AnalysisTask::Fraud => ChatRequest::new(fraud_prompt(&text), 2048, TEMPERATURE),
        AnalysisTask::Spelling => ChatRequest::new(spelling_prompt(&text), 2048, TEMPERATURE),
        AnalysisTask::Classification => {
            ChatRequest::new(classification_prompt(&text), 512, TEMPERATURE)
        }
        AnalysisTask::Summary => ChatRequest::new(summary_prompt(&text), 1024, TEMPERATURE),
    }
}

fn fraud_prompt(text: &str) -> String {
    format!(
        "INSTRUCTIONS: You are an assistant that finds fraudulent or suspicious sentences in \
business documents: scams, illegal requests, one-sided or hidden clauses. Return ONLY those \
sentences, copied verbatim and separated by semicolons (;). If nothing suspicious is found, \
return an empty string.\n\n\
TEXT FOR ANALYSIS:\n{text}\n\n\
RESPONSE FORMAT: sentence1; sentence2; sentence3"
    )
}

fn spelling_prompt(text: &str) -> String {
    format!(
        "INSTRUCTIONS: You are an assistant that finds spelling problems in a text. Return ONLY \
the misspelled words, separated by semicolons (;). If there are no mistakes, return an empty \
string.\n\n\
EXAMPLE:\n\
Input: \"Ппривет, меня зовут Алексей, а вас как завут?\"\n\
Response: \"Ппривет; завут\"\n\n\
TEXT FOR ANALYSIS:\n{text}\n\n\
RESPONSE FORMAT: word1; word2; word3"
    )
}

fn classification_prompt(text: &str) -> String {
    format!(
        "INSTRUCTIONS: You are an assistant that determines the type of a document.\n\
DOCUMENT CATEGORIES: Договор, Соглашение, Акт, Спецификация, or another fitting document \
type. Return ONLY the type name.\n\n\
DOCUMENT:\n{text}\n\n\
RESPONSE FORMAT: a single word or short phrase (for example \"Договор\")"
    )
}

fn summary_prompt(text: &str) -> String {
    format!(
        "INSTRUCTIONS: You are an assistant that summarizes business documents for a reviewer. \
Describe the parties, the subject and the key obligations or amounts in at most five \
sentences, in the language of the document.\n\n\
DOCUMENT:\n{text}\n\n\
RESPONSE FORMAT: SUMMARY as plain text"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_text_keeps_short_text() {
        assert_eq!(clip_text("короткий текст"), "короткий текст");
    }

    #[test]
    fn test_clip_text_cuts_on_char_boundary() {
        let long = "я".repeat(MAX_PROMPT_TEXT_CHARS + 5);
        let clipped = clip_text(&long);
        assert!(clipped.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            clipped.chars().filter(|c| *c == 'я').count(),
            MAX_PROMPT_TEXT_CHARS
        );
    }

    #[test]
    fn test_requests_embed_text_and_limits() {
        let fraud = request_for(AnalysisTask::Fraud, "Оплата наличными.");
        assert!(fraud.prompt.contains("Оплата наличными."));
        assert!(fraud.prompt.contains("semicolons"));
        assert_eq!(fraud.max_tokens, 2048);

        let class = request_for(AnalysisTask::Classification, "Акт приёмки");
        assert_eq!(class.max_tokens, 512);
        assert!(class.prompt.contains("DOCUMENT CATEGORIES"));

        let spelling = request_for(AnalysisTask::Spelling, "текст");
        assert!(spelling.prompt.contains("Ппривет; завут"));
        assert!((spelling.temperature - 0.3).abs() < f32::EPSILON);
    }
}
