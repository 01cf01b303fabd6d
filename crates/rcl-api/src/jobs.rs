//! Background maintenance jobs.

use chrono::Utc;
use rcl_db::repositories::{quiz as quiz_repo, session as session_repo};
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::interval;

/// Pending quizzes older than this are deleted
pub const STALE_QUIZ_DAYS: i32 = 7;

const TOKEN_CLEANUP_PERIOD: Duration = Duration::from_secs(6 * 60 * 60);
const QUIZ_CLEANUP_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Start all background jobs
///
/// Returns the join handles so the caller can keep or abort them.
pub fn start_background_jobs(pool: PgPool) -> Vec<tokio::task::JoinHandle<()>> {
    vec![
        tokio::spawn(periodic_token_cleanup_job(pool.clone())),
        tokio::spawn(periodic_stale_quiz_cleanup_job(pool)),
    ]
}

/// Delete expired refresh tokens every 6 hours
async fn periodic_token_cleanup_job(pool: PgPool) {
    // Stay out of the way of startup
    tokio::time::sleep(Duration::from_secs(3600)).await;

    let mut interval = interval(TOKEN_CLEANUP_PERIOD);

    loop {
        interval.tick().await;

        match run_token_cleanup(&pool).await {
            Ok(deleted) if deleted > 0 => {
                tracing::info!(deleted, "Expired refresh tokens cleaned up");
            }
            Ok(_) => tracing::debug!("Token cleanup complete: no expired tokens found"),
            Err(e) => tracing::error!(error = %e, "Failed to run periodic token cleanup"),
        }
    }
}

/// Delete quizzes nobody submitted, once a day
async fn periodic_stale_quiz_cleanup_job(pool: PgPool) {
    tokio::time::sleep(Duration::from_secs(7200)).await;

    let mut interval = interval(QUIZ_CLEANUP_PERIOD);

    loop {
        interval.tick().await;

        match run_stale_quiz_cleanup(&pool).await {
            Ok(deleted) if deleted > 0 => {
                tracing::info!(deleted, days = STALE_QUIZ_DAYS, "Stale pending quizzes deleted");
            }
            Ok(_) => tracing::debug!("No stale pending quizzes to delete"),
            Err(e) => tracing::error!(error = %e, "Failed to delete stale quizzes"),
        }
    }
}

pub async fn run_token_cleanup(pool: &PgPool) -> Result<u64, sqlx::Error> {
    session_repo::purge_expired_sessions(pool, Utc::now()).await
}

pub async fn run_stale_quiz_cleanup(pool: &PgPool) -> Result<u64, sqlx::Error> {
    quiz_repo::delete_stale_pending_quizzes(pool, STALE_QUIZ_DAYS).await
}
