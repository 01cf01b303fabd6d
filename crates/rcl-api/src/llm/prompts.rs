//! Prompts for card generation, quiz writing and quiz grading.
//!
//! Every prompt asks for a single JSON object so replies can go through
//! [`super::complete_json`]. User-provided text is embedded as JSON strings.

use serde::Serialize;
use serde_json::json;

use super::CompletionRequest;

/// Longest slice of a card side included in a quiz prompt, in characters
const MAX_SOURCE_SIDE_CHARS: usize = 500;

/// Most cards used as quiz source material
pub const MAX_SOURCE_CARDS: usize = 150;

const CARD_SYSTEM: &str = "You write study flashcards. Each card has a short question or \
cue on the front and a concise, factual answer on the back. Markdown is allowed. \
Reply with a single JSON object and nothing else.";

const QUIZ_SYSTEM: &str = "You write quizzes from a student's flashcards. Questions must be \
answerable from the cards, should rephrase rather than copy the card fronts, and expect a \
short free-text answer. Reply with a single JSON object and nothing else.";

const GRADING_SYSTEM: &str = "You grade short free-text quiz answers. Accept answers that \
are correct in substance even if worded differently, misspelled, or less complete than the \
expected answer. Reject answers that are wrong, vague or contradict the expected answer. \
Feedback is one or two encouraging sentences addressed to the student. Reply with a single \
JSON object and nothing else.";

/// Ask for `count` flashcards about `topic`.
///
/// Expected reply: `{"cards": [{"front": "...", "back": "..."}]}`
pub fn card_generation(topic: &str, count: u32) -> CompletionRequest {
    let prompt = format!(
        "Write exactly {count} flashcards about the topic below.\n\
         Topic: {topic}\n\n\
         Reply format: {{\"cards\": [{{\"front\": string, \"back\": string}}]}}",
        topic = json!(topic),
    );

    CompletionRequest::new(CARD_SYSTEM, prompt)
}

/// A card offered to the model as quiz material
#[derive(Debug, Serialize)]
pub struct SourceCard<'a> {
    pub index: usize,
    pub front: &'a str,
    pub back: &'a str,
}

/// Ask for `count` question/answer pairs drawn from `cards`.
///
/// Expected reply:
/// `{"questions": [{"question": "...", "answer": "...", "card_index": 0}]}`
pub fn quiz_generation(cards: &[SourceCard<'_>], count: u32) -> CompletionRequest {
    let material: Vec<_> = cards
        .iter()
        .take(MAX_SOURCE_CARDS)
        .map(|card| {
            json!({
                "index": card.index,
                "front": truncate(card.front, MAX_SOURCE_SIDE_CHARS),
                "back": truncate(card.back, MAX_SOURCE_SIDE_CHARS),
            })
        })
        .collect();

    let prompt = format!(
        "Write exactly {count} quiz questions from these flashcards:\n{material}\n\n\
         Set card_index to the index of the card each question is based on.\n\
         Reply format: {{\"questions\": [{{\"question\": string, \"answer\": string, \
         \"card_index\": integer}}]}}",
        material = serde_json::Value::Array(material),
    );

    CompletionRequest::new(QUIZ_SYSTEM, prompt)
}

/// One answer waiting for a verdict
#[derive(Debug, Serialize)]
pub struct GradingItem<'a> {
    pub index: usize,
    pub question: &'a str,
    pub expected_answer: &'a str,
    pub student_answer: &'a str,
}

/// Ask for a verdict on every item.
///
/// Expected reply:
/// `{"grades": [{"index": 0, "correct": true, "feedback": "..."}]}`
pub fn grading(items: &[GradingItem<'_>]) -> CompletionRequest {
    let prompt = format!(
        "Grade each student answer below:\n{items}\n\n\
         Return one grade per item, using the same index.\n\
         Reply format: {{\"grades\": [{{\"index\": integer, \"correct\": boolean, \
         \"feedback\": string}}]}}",
        items = json!(items),
    );

    CompletionRequest::new(GRADING_SYSTEM, prompt).with_temperature(0.0)
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
