use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::appointment::AppointmentId;
use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub appointment_id: AppointmentId,
    pub user_id: UserId,
    pub rating: u8,
    pub comment: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// Validates raw review input and returns the normalized `(rating, comment)` pair.
pub fn validate_review_input(rating: i64, comment: &str) -> Result<(u8, String), DomainError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(DomainError::validation(
            "rating",
            format!("rating must be an integer between {MIN_RATING} and {MAX_RATING}"),
        ));
    }

    let comment = comment.trim();
    if comment.is_empty() {
        return Err(DomainError::validation("comment", "comment is required"));
    }

    // Bounded by the range check above.
    let rating = rating as u8;
    Ok((rating, comment.to_string()))
}
