//! Quiz generation and grading.

use std::collections::HashMap;

use rand::{Rng, seq::SliceRandom};
use rcl_db::models::{Card, NewQuizQuestion, QuestionGrade, QuizQuestion};
use serde::Deserialize;
use sqlx::types::Uuid;

use crate::{
    error::ApiError,
    llm::{
        LanguageModel, LlmError, complete_json,
        prompts::{self, GradingItem, SourceCard},
    },
    normalization::{answers_match, is_blank_answer},
};

/// Longest feedback string kept from the model, in characters
const MAX_FEEDBACK_CHARS: usize = 1000;

const CORRECT_FEEDBACK: &str = "Correct!";
const BLANK_FEEDBACK: &str = "No answer was given.";
const UNGRADED_FEEDBACK: &str = "This answer could not be graded.";

#[derive(Debug, Deserialize)]
struct GeneratedQuiz {
    #[serde(default)]
    questions: Vec<GeneratedQuestion>,
}

#[derive(Debug, Deserialize)]
struct GeneratedQuestion {
    question: String,
    answer: String,
    card_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct GradingReply {
    #[serde(default)]
    grades: Vec<ModelGrade>,
}

#[derive(Debug, Deserialize)]
struct ModelGrade {
    index: usize,
    correct: bool,
    #[serde(default)]
    feedback: String,
}

/// Ask the model for `count` questions based on `cards`.
///
/// Blank questions or answers are dropped and at most `count` are kept. A
/// `card_index` that does not point at one of the cards leaves the question
/// without a source card.
pub async fn generate_questions(
    model: &dyn LanguageModel,
    cards: &[Card],
    count: u32,
) -> Result<Vec<NewQuizQuestion>, ApiError> {
    let picked = pick_source_cards(cards, prompts::MAX_SOURCE_CARDS, &mut rand::thread_rng());
    let sources: Vec<SourceCard<'_>> = picked
        .iter()
        .enumerate()
        .map(|(index, card)| SourceCard {
            index,
            front: &card.front,
            back: &card.back,
        })
        .collect();

    let reply: GeneratedQuiz = complete_json(model, prompts::quiz_generation(&sources, count)).await?;

    let questions: Vec<NewQuizQuestion> = reply
        .questions
        .into_iter()
        .filter(|q| !q.question.trim().is_empty() && !q.answer.trim().is_empty())
        .take(count as usize)
        .map(|q| NewQuizQuestion {
            question: q.question.trim().to_string(),
            expected_answer: q.answer.trim().to_string(),
            source_card_id: q
                .card_index
                .filter(|&i| i < sources.len())
                .map(|i| picked[i].id),
        })
        .collect();

    if questions.is_empty() {
        return Err(LlmError::InvalidResponse("Model returned no usable questions".to_string()).into());
    }

    if questions.len() < count as usize {
        tracing::warn!(
            requested = count,
            received = questions.len(),
            "Model returned fewer quiz questions than requested"
        );
    }

    Ok(questions)
}

/// Choose at most `limit` cards as quiz material.
///
/// Each deck's cards are shuffled, then decks take turns, so every selected
/// deck is represented even when one of them holds more than `limit` cards.
fn pick_source_cards<'a, R: Rng + ?Sized>(
    cards: &'a [Card],
    limit: usize,
    rng: &mut R,
) -> Vec<&'a Card> {
    let mut decks: Vec<Vec<&Card>> = Vec::new();
    let mut slots: HashMap<Uuid, usize> = HashMap::new();
    for card in cards {
        let slot = *slots.entry(card.deck_id).or_insert_with(|| {
            decks.push(Vec::new());
            decks.len() - 1
        });
        decks[slot].push(card);
    }
    for deck in &mut decks {
        deck.shuffle(rng);
    }

    let mut picked = Vec::with_capacity(limit.min(cards.len()));
    let mut round = 0;
    while picked.len() < limit && picked.len() < cards.len() {
        let remaining = limit - picked.len();
        picked.extend(decks.iter().filter_map(|deck| deck.get(round)).copied().take(remaining));
        round += 1;
    }
    picked
}

/// Outcome of the local pass over one answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalGrade {
    Correct,
    Blank,
    /// Needs a verdict from the model
    Undecided,
}

/// Grade an answer without the model when the outcome is obvious.
pub fn grade_locally(answer: &str, expected: &str) -> LocalGrade {
    if is_blank_answer(answer) {
        LocalGrade::Blank
    } else if answers_match(answer, expected) {
        LocalGrade::Correct
    } else {
        LocalGrade::Undecided
    }
}

/// Grade a submission.
///
/// Every question gets a grade; questions without a submitted answer are graded
/// as blank. Answers that cannot be decided locally go to the model in one
/// request, and `model` is only required when there is at least one of them.
pub async fn grade_submission(
    model: Option<&dyn LanguageModel>,
    questions: &[QuizQuestion],
    answers: &HashMap<Uuid, String>,
) -> Result<Vec<QuestionGrade>, ApiError> {
    let mut grades = Vec::with_capacity(questions.len());
    let mut undecided = Vec::new();

    for question in questions {
        let answer = answers.get(&question.id).map(String::as_str).unwrap_or("");

        let (is_correct, feedback) = match grade_locally(answer, &question.expected_answer) {
            LocalGrade::Correct => (true, CORRECT_FEEDBACK),
            LocalGrade::Blank => (false, BLANK_FEEDBACK),
            LocalGrade::Undecided => {
                undecided.push(grades.len());
                (false, UNGRADED_FEEDBACK)
            }
        };

        grades.push(QuestionGrade {
            question_id: question.id,
            user_answer: answer.trim().to_string(),
            is_correct,
            feedback: feedback.to_string(),
        });
    }

    if undecided.is_empty() {
        return Ok(grades);
    }

    let model = model.ok_or_else(|| {
        ApiError::ServiceUnavailable("Language model is not configured".to_string())
    })?;

    let items: Vec<GradingItem<'_>> = undecided
        .iter()
        .enumerate()
        .map(|(index, &slot)| GradingItem {
            index,
            question: &questions[slot].question,
            expected_answer: &questions[slot].expected_answer,
            student_answer: &grades[slot].user_answer,
        })
        .collect();

    let reply: GradingReply = complete_json(model, prompts::grading(&items)).await?;
    drop(items);

    let mut verdicts: HashMap<usize, ModelGrade> =
        reply.grades.into_iter().map(|g| (g.index, g)).collect();

    for (index, &slot) in undecided.iter().enumerate() {
        match verdicts.remove(&index) {
            Some(verdict) => {
                let feedback = verdict.feedback.trim();
                grades[slot].is_correct = verdict.correct;
                if !feedback.is_empty() {
                    grades[slot].feedback = feedback.chars().take(MAX_FEEDBACK_CHARS).collect();
                }
            }
            None => {
                tracing::warn!(question_id = %grades[slot].question_id, "Model skipped an answer");
            }
        }
    }

    Ok(grades)
}

/// Percentage of correct answers, 0 for an empty quiz.
pub fn score_percent(grades: &[QuestionGrade]) -> f64 {
    if grades.is_empty() {
        return 0.0;
    }
    let correct = grades.iter().filter(|g| g.is_correct).count();
    correct as f64 * 100.0 / grades.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionRequest;
    use async_trait::async_trait;
    use chrono::Utc;
    use rand::{SeedableRng, rngs::StdRng};
    use std::sync::Mutex;

    /// Replays canned replies and records the prompts it was given
    struct CannedModel {
        replies: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedModel {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(request.prompt);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| LlmError::InvalidResponse("no canned reply left".to_string()))
        }
    }

    fn card(front: &str, back: &str) -> Card {
        let now = Utc::now();
        Card {
            id: Uuid::new_v4(),
            deck_id: Uuid::new_v4(),
            front: front.to_string(),
            back: back.to_string(),
            ease_factor: 2.5,
            last_reviewed_at: None,
            review_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn question(position: i32, text: &str, expected: &str) -> QuizQuestion {
        QuizQuestion {
            id: Uuid::new_v4(),
            position,
            question: text.to_string(),
            expected_answer: expected.to_string(),
            source_card_id: None,
            user_answer: None,
            is_correct: None,
            feedback: None,
        }
    }

    #[test]
    fn test_grade_locally() {
        assert_eq!(grade_locally("", "Paris"), LocalGrade::Blank);
        assert_eq!(grade_locally(" ?! ", "Paris"), LocalGrade::Blank);
        assert_eq!(grade_locally("paris.", "Paris"), LocalGrade::Correct);
        assert_eq!(grade_locally("Lutetia", "Paris"), LocalGrade::Undecided);
        assert_eq!(grade_locally("5", "-5"), LocalGrade::Undecided);
        assert_eq!(grade_locally("314", "3.14"), LocalGrade::Undecided);
    }

    #[test]
    fn test_source_cards_cover_every_deck() {
        let (big, small) = (Uuid::new_v4(), Uuid::new_v4());
        let in_deck = |deck_id, n| {
            (0..n).map(move |i| Card {
                deck_id,
                ..card(&format!("Q{i}"), "A")
            })
        };
        let cards: Vec<Card> = in_deck(big, 150).chain(in_deck(small, 50)).collect();

        let picked = pick_source_cards(&cards, 150, &mut StdRng::seed_from_u64(7));

        assert_eq!(picked.len(), 150);
        assert_eq!(picked.iter().filter(|c| c.deck_id == small).count(), 50);
        assert_eq!(picked.iter().filter(|c| c.deck_id == big).count(), 100);

        let few = pick_source_cards(&cards[..3], 150, &mut StdRng::seed_from_u64(7));
        assert_eq!(few.len(), 3);
    }

    #[tokio::test]
    async fn test_quiz_prompt_includes_every_deck() {
        let (big, small) = (Uuid::new_v4(), Uuid::new_v4());
        let mut cards: Vec<Card> = (0..160)
            .map(|i| Card {
                deck_id: big,
                ..card(&format!("Big {i}"), "A")
            })
            .collect();
        cards.push(Card {
            deck_id: small,
            ..card("Only small card", "B")
        });
        let model = CannedModel::new(&[r#"{"questions": [{"question": "Q", "answer": "A"}]}"#]);

        generate_questions(&model, &cards, 1).await.unwrap();

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("Only small card"));
    }

    #[test]
    fn test_score_percent() {
        let grade = |is_correct| QuestionGrade {
            question_id: Uuid::new_v4(),
            user_answer: String::new(),
            is_correct,
            feedback: String::new(),
        };

        assert_eq!(score_percent(&[]), 0.0);
        assert_eq!(score_percent(&[grade(true), grade(false)]), 50.0);
        assert_eq!(score_percent(&[grade(true), grade(true), grade(true), grade(false)]), 75.0);
    }

    #[tokio::test]
    async fn test_generate_questions_maps_source_cards() {
        let cards = vec![card("Capital of France?", "Paris"), card("2 + 2", "4")];
        let model = CannedModel::new(&[r#"{"questions": [
            {"question": "Which city is the French capital?", "answer": "Paris", "card_index": 0},
            {"question": "  ", "answer": "dropped", "card_index": 1},
            {"question": "What is two plus two?", "answer": "Four", "card_index": 9},
            {"question": "Extra", "answer": "beyond count", "card_index": 1}
        ]}"#]);

        let questions = generate_questions(&model, &cards, 2).await.unwrap();

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].source_card_id, Some(cards[0].id));
        assert_eq!(questions[1].question, "What is two plus two?");
        assert_eq!(questions[1].source_card_id, None);
    }

    #[tokio::test]
    async fn test_generate_questions_rejects_empty_reply() {
        let cards = vec![card("Q", "A")];
        let model = CannedModel::new(&[r#"{"questions": []}"#]);

        let err = generate_questions(&model, &cards, 3).await.unwrap_err();
        assert!(matches!(err, ApiError::Llm(LlmError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_local_grading_skips_model() {
        let questions = vec![question(1, "Capital of France?", "Paris"), question(2, "2 + 2", "4")];
        let answers = HashMap::from([(questions[0].id, "  PARIS ".to_string())]);

        // No model at all: every answer is decided locally
        let grades = grade_submission(None, &questions, &answers).await.unwrap();

        assert!(grades[0].is_correct);
        assert_eq!(grades[0].user_answer, "PARIS");
        assert!(!grades[1].is_correct);
        assert_eq!(grades[1].feedback, BLANK_FEEDBACK);
        assert_eq!(grades[1].user_answer, "");
    }

    #[tokio::test]
    async fn test_undecided_answers_need_a_model() {
        let questions = vec![question(1, "Capital of France?", "Paris")];
        let answers = HashMap::from([(questions[0].id, "Lutetia".to_string())]);

        let err = grade_submission(None, &questions, &answers).await.unwrap_err();
        assert!(matches!(err, ApiError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_model_grades_are_merged() {
        let questions = vec![
            question(1, "Capital of France?", "Paris"),
            question(2, "Powerhouse of the cell?", "Mitochondria"),
            question(3, "Largest planet?", "Jupiter"),
            question(4, "Author of Hamlet?", "Shakespeare"),
        ];
        let answers = HashMap::from([
            (questions[0].id, "paris".to_string()),
            (questions[1].id, "the mitochondrion".to_string()),
            (questions[2].id, "Saturn".to_string()),
        ]);
        let model = CannedModel::new(&[r#"```json
{"grades": [
  {"index": 1, "correct": false, "feedback": "Jupiter is the largest."},
  {"index": 0, "correct": true, "feedback": "Right, singular form is fine."}
]}
```"#]);

        let grades = grade_submission(Some(&model), &questions, &answers).await.unwrap();

        assert_eq!(model.calls(), 1);
        let prompt = model.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("the mitochondrion"));
        assert!(prompt.contains("Saturn"));
        assert!(!prompt.contains("Shakespeare"));

        assert!(grades[0].is_correct);
        assert_eq!(grades[0].feedback, CORRECT_FEEDBACK);
        assert!(grades[1].is_correct);
        assert_eq!(grades[1].feedback, "Right, singular form is fine.");
        assert!(!grades[2].is_correct);
        assert_eq!(grades[2].feedback, "Jupiter is the largest.");
        assert!(!grades[3].is_correct);
        assert_eq!(score_percent(&grades), 50.0);
    }

    #[tokio::test]
    async fn test_skipped_verdict_counts_as_wrong() {
        let questions = vec![question(1, "Largest planet?", "Jupiter")];
        let answers = HashMap::from([(questions[0].id, "Gas giant".to_string())]);
        let model = CannedModel::new(&[r#"{"grades": []}"#]);

        let grades = grade_submission(Some(&model), &questions, &answers).await.unwrap();

        assert!(!grades[0].is_correct);
        assert_eq!(grades[0].feedback, UNGRADED_FEEDBACK);
    }
}
