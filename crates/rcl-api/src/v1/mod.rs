use axum::Router;

use crate::{auth, card, category, deck, quiz, review, state::ApiState, user};

/// V1 API routes
pub fn routes() -> Router<ApiState> {
    Router::new()
        .merge(auth::routes())
        .merge(user::routes())
        .merge(category::routes())
        .merge(deck::routes())
        .merge(card::routes())
        .merge(review::routes())
        .merge(quiz::routes())
}
