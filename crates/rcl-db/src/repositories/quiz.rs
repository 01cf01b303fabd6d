use sqlx::{Executor, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{NewQuizQuestion, QuestionGrade, Quiz, QuizQuestion};

/// Create a pending quiz together with its deck links and questions.
///
/// Questions are stored in input order, positions start at 1.
pub async fn create_quiz(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    title: &str,
    deck_ids: &[Uuid],
    questions: &[NewQuizQuestion],
) -> Result<Quiz, sqlx::Error> {
    let quiz_id: Uuid = sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            INSERT INTO quizzes (user_id, title)
            VALUES ($1, $2)
            RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(title)
    .fetch_one(&mut **tx)
    .await?;

    sqlx::query(
        // language=PostgreSQL
        r#"
            INSERT INTO quiz_decks (quiz_id, deck_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT DO NOTHING
        "#,
    )
    .bind(quiz_id)
    .bind(deck_ids)
    .execute(&mut **tx)
    .await?;

    for (index, question) in questions.iter().enumerate() {
        let position = i32::try_from(index + 1).unwrap_or(i32::MAX);
        sqlx::query(
            // language=PostgreSQL
            r#"
                INSERT INTO quiz_questions (quiz_id, position, question, expected_answer, source_card_id)
                VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(quiz_id)
        .bind(position)
        .bind(&question.question)
        .bind(&question.expected_answer)
        .bind(question.source_card_id)
        .execute(&mut **tx)
        .await?;
    }

    find_quiz(&mut **tx, user_id, quiz_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn list_quizzes<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<Quiz>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT
                q.id,
                q.title,
                q.status,
                q.score,
                (SELECT COUNT(*) FROM quiz_questions qq WHERE qq.quiz_id = q.id) AS question_count,
                q.created_at,
                q.graded_at
            FROM quizzes q
            WHERE q.user_id = $1
            ORDER BY q.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

pub async fn find_quiz<'e, E>(
    executor: E,
    user_id: Uuid,
    quiz_id: Uuid,
) -> Result<Option<Quiz>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT
                q.id,
                q.title,
                q.status,
                q.score,
                (SELECT COUNT(*) FROM quiz_questions qq WHERE qq.quiz_id = q.id) AS question_count,
                q.created_at,
                q.graded_at
            FROM quizzes q
            WHERE q.id = $1 AND q.user_id = $2
        "#,
    )
    .bind(quiz_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Lock a quiz row for grading. Returns `None` if the quiz is missing or not owned.
pub async fn lock_quiz(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    quiz_id: Uuid,
) -> Result<Option<Quiz>, sqlx::Error> {
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT
                q.id,
                q.title,
                q.status,
                q.score,
                (SELECT COUNT(*) FROM quiz_questions qq WHERE qq.quiz_id = q.id) AS question_count,
                q.created_at,
                q.graded_at
            FROM quizzes q
            WHERE q.id = $1 AND q.user_id = $2
            FOR UPDATE OF q
        "#,
    )
    .bind(quiz_id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn list_quiz_deck_ids<'e, E>(executor: E, quiz_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            SELECT deck_id FROM quiz_decks WHERE quiz_id = $1 ORDER BY deck_id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(executor)
    .await
}

pub async fn list_questions<'e, E>(executor: E, quiz_id: Uuid) -> Result<Vec<QuizQuestion>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, position, question, expected_answer, source_card_id,
                   user_answer, is_correct, feedback
            FROM quiz_questions
            WHERE quiz_id = $1
            ORDER BY position
        "#,
    )
    .bind(quiz_id)
    .fetch_all(executor)
    .await
}

/// Store per-question grades and mark the quiz as graded with `score`.
pub async fn store_grades(
    tx: &mut Transaction<'_, Postgres>,
    quiz_id: Uuid,
    grades: &[QuestionGrade],
    score: f64,
) -> Result<(), sqlx::Error> {
    for grade in grades {
        sqlx::query(
            // language=PostgreSQL
            r#"
                UPDATE quiz_questions
                SET user_answer = $3, is_correct = $4, feedback = $5
                WHERE id = $1 AND quiz_id = $2
            "#,
        )
        .bind(grade.question_id)
        .bind(quiz_id)
        .bind(&grade.user_answer)
        .bind(grade.is_correct)
        .bind(&grade.feedback)
        .execute(&mut **tx)
        .await?;
    }

    sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE quizzes
            SET status = 'graded', score = $2, graded_at = NOW()
            WHERE id = $1
        "#,
    )
    .bind(quiz_id)
    .bind(score)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn delete_quiz<'e, E>(executor: E, user_id: Uuid, quiz_id: Uuid) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            DELETE FROM quizzes WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(quiz_id)
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Delete quizzes that were never submitted and are older than `max_age_days`.
pub async fn delete_stale_pending_quizzes<'e, E>(executor: E, max_age_days: i32) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            DELETE FROM quizzes
            WHERE status = 'pending'
                AND created_at < NOW() - make_interval(days => $1)
        "#,
    )
    .bind(max_age_days)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
