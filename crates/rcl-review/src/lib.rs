//! Review ordering for Recall
//!
//! This crate decides in which order a user's flashcards are presented for review.
//! It is a weighted heuristic over three pieces of card metadata (ease factor,
//! time since the last review, number of reviews) plus a small random jitter so
//! that cards with identical metadata do not always come up in the same order.
//!
//! Lower scores are reviewed first.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Ease factor assigned to new cards and to cards with an unusable stored value.
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Lowest ease factor a rating can push a card to.
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Highest ease factor a rating can push a card to.
pub const MAX_EASE_FACTOR: f64 = 5.0;

/// Weight applied to the ease factor.
pub const EASE_WEIGHT: f64 = 1000.0;

/// Weight applied to each past review.
pub const REVIEW_COUNT_WEIGHT: f64 = 10.0;

/// Recency (in hours) used for cards that were never reviewed.
///
/// Large enough that a fresh card outranks anything reviewed within the last year.
pub const NEVER_REVIEWED_HOURS: f64 = 10_000.0;

/// Upper bound (exclusive) of the random jitter added to every score.
pub const JITTER_RANGE: f64 = 100.0;

/// Card metadata consumed by the scoring heuristic.
pub trait ReviewCandidate {
    /// Current ease factor of the card
    fn ease_factor(&self) -> f64;
    /// When the card was last reviewed, if ever
    fn last_reviewed_at(&self) -> Option<DateTime<Utc>>;
    /// How many times the card has been reviewed
    fn review_count(&self) -> i32;
}

/// Self-assessed recall quality submitted after reviewing a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    /// Not recalled
    Again,
    /// Recalled with significant effort
    Hard,
    /// Recalled
    Good,
    /// Recalled effortlessly
    Easy,
}

impl Rating {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Again => "again",
            Self::Hard => "hard",
            Self::Good => "good",
            Self::Easy => "easy",
        }
    }

    /// Change applied to the ease factor for this rating.
    pub const fn ease_delta(self) -> f64 {
        match self {
            Self::Again => -0.20,
            Self::Hard => -0.15,
            Self::Good => 0.0,
            Self::Easy => 0.15,
        }
    }
}

/// Compute the review-priority score of a card.
///
/// ```text
/// score = ease * 1000 - hours_since_last_review + review_count * 10 + jitter
/// ```
///
/// * A non-finite or non-positive ease falls back to [`DEFAULT_EASE_FACTOR`].
/// * A card that was never reviewed uses [`NEVER_REVIEWED_HOURS`]; a timestamp in
///   the future counts as "just reviewed".
/// * A negative review count counts as zero.
///
/// # Examples
/// ```
/// use chrono::Utc;
/// use rcl_review::{ReviewCandidate, score_card};
///
/// struct Fresh;
/// impl ReviewCandidate for Fresh {
///     fn ease_factor(&self) -> f64 { 2.5 }
///     fn last_reviewed_at(&self) -> Option<chrono::DateTime<Utc>> { None }
///     fn review_count(&self) -> i32 { 0 }
/// }
///
/// assert_eq!(score_card(&Fresh, Utc::now(), 0.0), 2500.0 - 10_000.0);
/// ```
pub fn score_card<T: ReviewCandidate + ?Sized>(card: &T, now: DateTime<Utc>, jitter: f64) -> f64 {
    let ease = sanitize_ease(card.ease_factor());
    let recency = recency_hours(card.last_reviewed_at(), now);
    let reviews = f64::from(card.review_count().max(0));

    ease * EASE_WEIGHT - recency + reviews * REVIEW_COUNT_WEIGHT + jitter
}

/// Order cards for review, highest priority (lowest score) first.
///
/// Each card is scored exactly once with a fresh jitter drawn from `rng`.
/// Cards with equal scores keep their input order.
pub fn sort_cards_to_review<T, R>(cards: Vec<T>, now: DateTime<Utc>, rng: &mut R) -> Vec<T>
where
    T: ReviewCandidate,
    R: Rng + ?Sized,
{
    let mut scored: Vec<(f64, T)> = cards
        .into_iter()
        .map(|card| {
            let jitter = rng.gen_range(0.0..JITTER_RANGE);
            (score_card(&card, now, jitter), card)
        })
        .collect();

    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.into_iter().map(|(_, card)| card).collect()
}

/// Build a review queue of at most `limit` cards using the thread-local RNG.
pub fn review_queue<T: ReviewCandidate>(cards: Vec<T>, now: DateTime<Utc>, limit: usize) -> Vec<T> {
    let mut ordered = sort_cards_to_review(cards, now, &mut rand::thread_rng());
    ordered.truncate(limit);
    ordered
}

/// Apply a rating to an ease factor, clamped to [`MIN_EASE_FACTOR`]..=[`MAX_EASE_FACTOR`].
pub fn apply_rating(ease_factor: f64, rating: Rating) -> f64 {
    (sanitize_ease(ease_factor) + rating.ease_delta()).clamp(MIN_EASE_FACTOR, MAX_EASE_FACTOR)
}

fn sanitize_ease(ease: f64) -> f64 {
    if ease.is_finite() && ease > 0.0 {
        ease
    } else {
        DEFAULT_EASE_FACTOR
    }
}

fn recency_hours(last_reviewed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match last_reviewed_at {
        // Minute resolution keeps the term stable within a request
        Some(at) => ((now - at).num_minutes().max(0) as f64) / 60.0,
        None => NEVER_REVIEWED_HOURS,
    }
}
