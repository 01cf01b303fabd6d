use std::collections::{HashMap, HashSet};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use rcl_db::{
    models::{Quiz, QuizQuestion, QuizStatus},
    repositories::{card as card_repo, deck as deck_repo, quiz as quiz_repo},
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, types::Uuid};

use super::service;
use crate::{
    ApiState,
    auth::AuthUser,
    error::ApiError,
    metrics,
    middleware::rate_limit,
    validation::{self, MAX_NAME_LEN},
};

pub const DEFAULT_QUESTION_COUNT: u32 = 5;
pub const MAX_QUESTION_COUNT: u32 = 20;
/// Most decks a single quiz can draw from
pub const MAX_QUIZ_DECKS: usize = 20;

/// Create the quiz routes
pub fn routes() -> Router<ApiState> {
    use crate::make_rate_limit_layer;

    // Creating and submitting a quiz both call the model
    let model_routes = Router::new()
        .route("/quizzes", post(create_quiz))
        .route("/quizzes/{id}/submit", post(submit_quiz))
        .layer(make_rate_limit_layer!(
            rate_limit::LLM_REPLENISH_MS,
            rate_limit::LLM_BURST_SIZE
        ));

    let read_routes = Router::new()
        .route("/quizzes", get(list_quizzes))
        .route("/quizzes/{id}", get(get_quiz).delete(delete_quiz))
        .layer(make_rate_limit_layer!(
            rate_limit::GENERAL_REPLENISH_MS,
            rate_limit::GENERAL_BURST_SIZE
        ));

    Router::new().merge(model_routes).merge(read_routes)
}

#[derive(Debug, Deserialize)]
struct CreateQuizRequest {
    deck_ids: Vec<Uuid>,
    question_count: Option<u32>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitQuizRequest {
    answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Deserialize)]
struct SubmittedAnswer {
    question_id: Uuid,
    answer: String,
}

/// Quiz with its questions as shown to the client
#[derive(Debug, Serialize)]
pub struct QuizView {
    pub id: Uuid,
    pub title: String,
    pub status: QuizStatus,
    pub score: Option<f64>,
    pub deck_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub graded_at: Option<DateTime<Utc>>,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub id: Uuid,
    pub position: i32,
    pub question: String,
    pub source_card_id: Option<Uuid>,
    /// Hidden until the quiz is graded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl QuizView {
    fn new(quiz: Quiz, deck_ids: Vec<Uuid>, questions: Vec<QuizQuestion>) -> Self {
        let graded = quiz.status == QuizStatus::Graded;
        let questions = questions
            .into_iter()
            .map(|q| QuestionView {
                id: q.id,
                position: q.position,
                question: q.question,
                source_card_id: q.source_card_id,
                expected_answer: graded.then_some(q.expected_answer),
                user_answer: q.user_answer,
                is_correct: q.is_correct,
                feedback: q.feedback,
            })
            .collect();

        Self {
            id: quiz.id,
            title: quiz.title,
            status: quiz.status,
            score: quiz.score,
            deck_ids,
            created_at: quiz.created_at,
            graded_at: quiz.graded_at,
            questions,
        }
    }
}

fn quiz_not_found() -> ApiError {
    ApiError::NotFound("Quiz not found".to_string())
}

async fn load_quiz_view(pool: &PgPool, user_id: Uuid, quiz_id: Uuid) -> Result<QuizView, ApiError> {
    let quiz = quiz_repo::find_quiz(pool, user_id, quiz_id)
        .await?
        .ok_or_else(quiz_not_found)?;
    let deck_ids = quiz_repo::list_quiz_deck_ids(pool, quiz_id).await?;
    let questions = quiz_repo::list_questions(pool, quiz_id).await?;

    Ok(QuizView::new(quiz, deck_ids, questions))
}

/// Deduplicate deck ids, keeping the first occurrence of each
fn unique_deck_ids(deck_ids: Vec<Uuid>) -> Result<Vec<Uuid>, ApiError> {
    let mut seen = HashSet::new();
    let deck_ids: Vec<Uuid> = deck_ids.into_iter().filter(|id| seen.insert(*id)).collect();

    if deck_ids.is_empty() {
        return Err(ApiError::Validation("Select at least one deck".to_string()));
    }
    if deck_ids.len() > MAX_QUIZ_DECKS {
        return Err(ApiError::Validation(format!(
            "A quiz can use at most {MAX_QUIZ_DECKS} decks"
        )));
    }

    Ok(deck_ids)
}

async fn create_quiz(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<(StatusCode, Json<QuizView>), ApiError> {
    let deck_ids = unique_deck_ids(payload.deck_ids)?;
    let question_count = validation::validate_count(
        "question_count",
        payload.question_count,
        DEFAULT_QUESTION_COUNT,
        MAX_QUESTION_COUNT,
    )?;
    let title = payload
        .title
        .as_deref()
        .map(|title| validation::validate_name("Quiz", title))
        .transpose()?;
    let model = state.llm()?;

    let owned = deck_repo::count_owned_decks(&state.pool, auth_user.user_id, &deck_ids).await?;
    if owned != deck_ids.len() as i64 {
        return Err(ApiError::NotFound("Deck not found".to_string()));
    }

    let cards = card_repo::cards_for_decks(&state.pool, auth_user.user_id, &deck_ids).await?;
    if cards.is_empty() {
        return Err(ApiError::Validation(
            "The selected decks have no cards".to_string(),
        ));
    }

    let title = match title {
        Some(title) => title,
        None => default_title(&state.pool, auth_user.user_id, &deck_ids).await?,
    };

    let questions = service::generate_questions(model, &cards, question_count).await?;

    let mut tx = state.pool.begin().await?;
    let quiz = quiz_repo::create_quiz(&mut tx, auth_user.user_id, &title, &deck_ids, &questions).await?;
    tx.commit().await?;

    tracing::info!(
        quiz_id = %quiz.id,
        questions = questions.len(),
        decks = deck_ids.len(),
        "Quiz generated"
    );

    let view = load_quiz_view(&state.pool, auth_user.user_id, quiz.id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// "Quiz: <deck names>", cut to the name length limit
async fn default_title(pool: &PgPool, user_id: Uuid, deck_ids: &[Uuid]) -> Result<String, ApiError> {
    let names: Vec<String> = deck_repo::list_decks(pool, user_id, None)
        .await?
        .into_iter()
        .filter(|deck| deck_ids.contains(&deck.id))
        .map(|deck| deck.name)
        .collect();

    let title = format!("Quiz: {}", names.join(", "));
    Ok(title.chars().take(MAX_NAME_LEN).collect())
}

async fn list_quizzes(
    auth_user: AuthUser,
    State(state): State<ApiState>,
) -> Result<Json<Vec<Quiz>>, ApiError> {
    let quizzes = quiz_repo::list_quizzes(&state.pool, auth_user.user_id).await?;
    Ok(Json(quizzes))
}

async fn get_quiz(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuizView>, ApiError> {
    let view = load_quiz_view(&state.pool, auth_user.user_id, id).await?;
    Ok(Json(view))
}

async fn delete_quiz(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = quiz_repo::delete_quiz(&state.pool, auth_user.user_id, id).await?;
    if deleted == 0 {
        return Err(quiz_not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Grade a quiz.
///
/// Grading runs before the quiz row is locked so no transaction stays open
/// while the model answers; the status is checked again under the lock.
async fn submit_quiz(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitQuizRequest>,
) -> Result<Json<QuizView>, ApiError> {
    let quiz = quiz_repo::find_quiz(&state.pool, auth_user.user_id, id)
        .await?
        .ok_or_else(quiz_not_found)?;
    if quiz.status == QuizStatus::Graded {
        return Err(ApiError::Conflict("Quiz has already been graded".to_string()));
    }

    let questions = quiz_repo::list_questions(&state.pool, id).await?;
    let answers = collect_answers(&questions, payload.answers)?;

    let grades = service::grade_submission(state.llm.as_deref(), &questions, &answers).await?;
    let score = service::score_percent(&grades);

    let mut tx = state.pool.begin().await?;
    let locked = quiz_repo::lock_quiz(&mut tx, auth_user.user_id, id)
        .await?
        .ok_or_else(quiz_not_found)?;
    if locked.status == QuizStatus::Graded {
        return Err(ApiError::Conflict("Quiz has already been graded".to_string()));
    }
    quiz_repo::store_grades(&mut tx, id, &grades, score).await?;
    tx.commit().await?;

    metrics::record_quiz_graded(score);
    tracing::info!(quiz_id = %id, score, "Quiz graded");

    let view = load_quiz_view(&state.pool, auth_user.user_id, id).await?;
    Ok(Json(view))
}

/// Map answers by question id, rejecting ids that are not part of the quiz and
/// questions answered twice.
fn collect_answers(
    questions: &[QuizQuestion],
    submitted: Vec<SubmittedAnswer>,
) -> Result<HashMap<Uuid, String>, ApiError> {
    let known: HashSet<Uuid> = questions.iter().map(|q| q.id).collect();
    let mut answers = HashMap::with_capacity(submitted.len());

    for SubmittedAnswer { question_id, answer } in submitted {
        if !known.contains(&question_id) {
            return Err(ApiError::Validation(format!(
                "Question {question_id} is not part of this quiz"
            )));
        }
        validation::validate_answer(&answer)?;
        if answers.insert(question_id, answer).is_some() {
            return Err(ApiError::Validation(format!(
                "Question {question_id} was answered more than once"
            )));
        }
    }

    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(expected: &str) -> QuizQuestion {
        QuizQuestion {
            id: Uuid::new_v4(),
            position: 1,
            question: "Q".to_string(),
            expected_answer: expected.to_string(),
            source_card_id: None,
            user_answer: None,
            is_correct: None,
            feedback: None,
        }
    }

    fn quiz(status: QuizStatus) -> Quiz {
        Quiz {
            id: Uuid::new_v4(),
            title: "Quiz".to_string(),
            status,
            score: None,
            question_count: 1,
            created_at: Utc::now(),
            graded_at: None,
        }
    }

    #[test]
    fn test_expected_answer_hidden_until_graded() {
        let pending = QuizView::new(quiz(QuizStatus::Pending), vec![], vec![question("Paris")]);
        let json = serde_json::to_value(&pending).unwrap();
        assert!(json["questions"][0].get("expected_answer").is_none());
        assert_eq!(json["status"], "pending");

        let graded = QuizView::new(quiz(QuizStatus::Graded), vec![], vec![question("Paris")]);
        let json = serde_json::to_value(&graded).unwrap();
        assert_eq!(json["questions"][0]["expected_answer"], "Paris");
    }

    #[test]
    fn test_unique_deck_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(unique_deck_ids(vec![a, b, a]).unwrap(), vec![a, b]);
        assert!(unique_deck_ids(vec![]).is_err());

        let many: Vec<Uuid> = (0..=MAX_QUIZ_DECKS).map(|_| Uuid::new_v4()).collect();
        assert!(unique_deck_ids(many).is_err());
    }

    #[test]
    fn test_collect_answers() {
        let questions = vec![question("Paris"), question("4")];
        let answers = collect_answers(
            &questions,
            vec![SubmittedAnswer {
                question_id: questions[0].id,
                answer: "Paris".to_string(),
            }],
        )
        .unwrap();
        assert_eq!(answers.len(), 1);

        let unknown = collect_answers(
            &questions,
            vec![SubmittedAnswer {
                question_id: Uuid::new_v4(),
                answer: "x".to_string(),
            }],
        );
        assert!(matches!(unknown, Err(ApiError::Validation(_))));

        let twice = collect_answers(
            &questions,
            vec![
                SubmittedAnswer {
                    question_id: questions[1].id,
                    answer: "4".to_string(),
                },
                SubmittedAnswer {
                    question_id: questions[1].id,
                    answer: "5".to_string(),
                },
            ],
        );
        assert!(matches!(twice, Err(ApiError::Validation(_))));

        let oversized = collect_answers(
            &questions,
            vec![SubmittedAnswer {
                question_id: questions[0].id,
                answer: "a".repeat(validation::MAX_ANSWER_LEN + 1),
            }],
        );
        assert!(matches!(oversized, Err(ApiError::Validation(_))));
    }
}
