use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;

use salonbook_core::domain::appointment::AppointmentId;
use salonbook_core::domain::review::{Review, ReviewId};
use salonbook_core::domain::user::UserId;
use salonbook_core::errors::{EntityKind, RepositoryError};
use salonbook_core::repository::ReviewRepository;

use super::{column, format_timestamp, is_unique_violation, parse_timestamp, storage};
use crate::DbPool;

const REVIEW_COLUMNS: &str = "id, appointment_id, user_id, rating, comment, is_approved, created_at";

pub struct SqlReviewRepository {
    pool: DbPool,
}

impl SqlReviewRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_many(
        &self,
        filter: &str,
        bind: Option<&str>,
    ) -> Result<Vec<Review>, RepositoryError> {
        let sql =
            format!("SELECT {REVIEW_COLUMNS} FROM review {filter} ORDER BY created_at DESC, id ASC");
        let mut query = sqlx::query(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(storage)?;
        rows.iter().map(row_to_review).collect()
    }
}

fn row_to_review(row: &SqliteRow) -> Result<Review, RepositoryError> {
    let rating: i64 = column(row, "rating")?;
    let rating = u8::try_from(rating)
        .map_err(|_| RepositoryError::Decode(format!("invalid value for `rating`: {rating}")))?;

    Ok(Review {
        id: ReviewId(column(row, "id")?),
        appointment_id: AppointmentId(column(row, "appointment_id")?),
        user_id: UserId(column(row, "user_id")?),
        rating,
        comment: column(row, "comment")?,
        is_approved: column(row, "is_approved")?,
        created_at: parse_timestamp("created_at", column(row, "created_at")?)?,
    })
}

#[async_trait]
impl ReviewRepository for SqlReviewRepository {
    async fn find_by_id(&self, id: &ReviewId) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {REVIEW_COLUMNS} FROM review WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(row_to_review).transpose()
    }

    async fn find_by_appointment(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Option<Review>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {REVIEW_COLUMNS} FROM review WHERE appointment_id = ?"))
                .bind(&appointment_id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;
        row.as_ref().map(row_to_review).transpose()
    }

    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Review>, RepositoryError> {
        self.fetch_many("WHERE user_id = ?", Some(&owner.0)).await
    }

    async fn list_all(&self) -> Result<Vec<Review>, RepositoryError> {
        self.fetch_many("", None).await
    }

    async fn insert(&self, review: Review) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO review (id, appointment_id, user_id, rating, comment, is_approved,
                                 created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&review.id.0)
        .bind(&review.appointment_id.0)
        .bind(&review.user_id.0)
        .bind(i64::from(review.rating))
        .bind(&review.comment)
        .bind(review.is_approved)
        .bind(format_timestamp(review.created_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) if is_unique_violation(&error) => Err(RepositoryError::UniqueViolation {
                entity: EntityKind::Review,
                key: review.appointment_id.0.clone(),
            }),
            Err(error) => Err(storage(error)),
        }
    }

    async fn save(&self, review: Review) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE review SET rating = ?, comment = ?, is_approved = ?
             WHERE id = ? AND appointment_id = ?",
        )
        .bind(i64::from(review.rating))
        .bind(&review.comment)
        .bind(review.is_approved)
        .bind(&review.id.0)
        .bind(&review.appointment_id.0)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }
        match self.find_by_id(&review.id).await? {
            Some(_) => Err(RepositoryError::UniqueViolation {
                entity: EntityKind::Review,
                key: review.appointment_id.0.clone(),
            }),
            None => Err(RepositoryError::Storage(format!("review `{}` does not exist", review.id.0))),
        }
    }

    async fn delete(&self, id: &ReviewId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM review WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use salonbook_core::domain::appointment::{Appointment, AppointmentId, AppointmentStatus};
    use salonbook_core::domain::quote::QuoteId;
    use salonbook_core::domain::review::{Review, ReviewId};
    use salonbook_core::domain::user::UserId;
    use salonbook_core::errors::RepositoryError;
    use salonbook_core::repository::{AppointmentRepository, QuoteRepository, ReviewRepository};

    use super::SqlReviewRepository;
    use crate::repositories::test_support::{at, sample_quote, setup};
    use crate::repositories::{SqlAppointmentRepository, SqlQuoteRepository};
    use crate::DbPool;

    async fn seed_appointment(pool: &DbPool, id: &str) {
        let quote_id = format!("q-{id}");
        SqlQuoteRepository::new(pool.clone())
            .save(sample_quote(&quote_id, "client-1", 1))
            .await
            .expect("seed quote");
        SqlAppointmentRepository::new(pool.clone())
            .save(Appointment {
                id: AppointmentId(id.to_string()),
                user_id: UserId("client-1".to_string()),
                client_phone: "+34 600 000 000".to_string(),
                service: "Gel manicure".to_string(),
                requested_date: at(3, 15),
                status: AppointmentStatus::Completed,
                cancellation: None,
                notes: String::new(),
                design_ids: Vec::new(),
                quote_id: QuoteId(quote_id),
                review_id: None,
                needs_reconciliation: false,
                version: 1,
                created_at: at(1, 12),
                updated_at: at(1, 12),
            })
            .await
            .expect("seed appointment");
    }

    fn review(id: &str, appointment: &str, day: u32) -> Review {
        Review {
            id: ReviewId(id.to_string()),
            appointment_id: AppointmentId(appointment.to_string()),
            user_id: UserId("client-1".to_string()),
            rating: 5,
            comment: "Lovely colour".to_string(),
            is_approved: false,
            created_at: at(day, 18),
        }
    }

    #[tokio::test]
    async fn one_review_per_appointment() {
        let pool = setup().await;
        seed_appointment(&pool, "a-1").await;
        let repo = SqlReviewRepository::new(pool);

        repo.insert(review("r-1", "a-1", 4)).await.expect("first");
        let error = repo.insert(review("r-2", "a-1", 5)).await.expect_err("second");
        assert!(matches!(error, RepositoryError::UniqueViolation { key, .. } if key == "a-1"));

        let found = repo
            .find_by_appointment(&AppointmentId("a-1".to_string()))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(found.id.0, "r-1");
    }

    #[tokio::test]
    async fn approval_update_and_delete() {
        let pool = setup().await;
        seed_appointment(&pool, "a-1").await;
        seed_appointment(&pool, "a-2").await;
        let repo = SqlReviewRepository::new(pool);
        repo.insert(review("r-1", "a-1", 4)).await.expect("older");
        repo.insert(review("r-2", "a-2", 6)).await.expect("newer");

        let mut approved = review("r-1", "a-1", 4);
        approved.is_approved = true;
        repo.save(approved.clone()).await.expect("approve");
        assert_eq!(repo.find_by_id(&approved.id).await.expect("find"), Some(approved));

        let mut moved = review("r-1", "a-2", 4);
        moved.rating = 1;
        assert!(matches!(
            repo.save(moved).await.expect_err("cannot move"),
            RepositoryError::UniqueViolation { .. }
        ));
        assert!(matches!(
            repo.save(review("ghost", "a-1", 4)).await.expect_err("missing"),
            RepositoryError::Storage(_)
        ));

        let ids: Vec<String> =
            repo.list_all().await.expect("all").into_iter().map(|review| review.id.0).collect();
        assert_eq!(ids, vec!["r-2".to_string(), "r-1".to_string()]);
        assert_eq!(
            repo.find_by_owner(&UserId("client-1".to_string())).await.expect("mine").len(),
            2
        );

        assert!(repo.delete(&ReviewId("r-1".to_string())).await.expect("delete"));
        assert!(!repo.delete(&ReviewId("r-1".to_string())).await.expect("delete again"));
    }
}
