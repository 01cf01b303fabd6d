use chrono::{DateTime, Utc};
use rcl_review::ReviewCandidate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Public profile of a user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to check a login attempt
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// A refresh token row, minus its hash
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    /// `User-Agent` of the client that logged in, carried over on rotation
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
}

/// Aggregated study statistics for a user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserStats {
    pub category_count: i64,
    pub deck_count: i64,
    pub card_count: i64,
    /// Cards that have never been reviewed
    pub unreviewed_cards: i64,
    /// Sum of review counts over all cards
    pub total_reviews: i64,
    pub quizzes_graded: i64,
    /// Mean score (0-100) of graded quizzes, `None` until one is graded
    pub average_quiz_score: Option<f64>,
}

/// Category grouping a user's decks
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Number of decks currently filed under this category
    pub deck_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Deck with its card count
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Deck {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub card_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Flashcard with its review metadata
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Card {
    pub id: Uuid,
    pub deck_id: Uuid,
    /// Prompt side, markdown
    pub front: String,
    /// Answer side, markdown
    pub back: String,
    pub ease_factor: f64,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub review_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewCandidate for Card {
    fn ease_factor(&self) -> f64 {
        self.ease_factor
    }

    fn last_reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.last_reviewed_at
    }

    fn review_count(&self) -> i32 {
        self.review_count
    }
}

/// Front/back pair to insert into a deck
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCard {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "quiz_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QuizStatus {
    /// Generated, waiting for answers
    Pending,
    /// Answers submitted and graded
    Graded,
}

/// Quiz header row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub status: QuizStatus,
    /// Percentage of correct answers, set once graded
    pub score: Option<f64>,
    pub question_count: i64,
    pub created_at: DateTime<Utc>,
    pub graded_at: Option<DateTime<Utc>>,
}

/// Stored quiz question, including the grading outcome once available
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub position: i32,
    pub question: String,
    pub expected_answer: String,
    pub source_card_id: Option<Uuid>,
    pub user_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub feedback: Option<String>,
}

/// Question to insert when a quiz is created
#[derive(Debug, Clone)]
pub struct NewQuizQuestion {
    pub question: String,
    pub expected_answer: String,
    pub source_card_id: Option<Uuid>,
}

/// Grading outcome for one question
#[derive(Debug, Clone)]
pub struct QuestionGrade {
    pub question_id: Uuid,
    pub user_answer: String,
    pub is_correct: bool,
    pub feedback: String,
}
