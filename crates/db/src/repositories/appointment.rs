use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;

use salonbook_core::domain::appointment::{
    Appointment, AppointmentId, AppointmentStatus, Cancellation, CancelledBy,
};
use salonbook_core::domain::quote::QuoteId;
use salonbook_core::domain::review::ReviewId;
use salonbook_core::domain::user::UserId;
use salonbook_core::errors::{EntityKind, RepositoryError};
use salonbook_core::repository::AppointmentRepository;

use super::{
    column, decode_design_ids, encode_design_ids, format_timestamp, is_unique_violation,
    parse_optional_timestamp, parse_timestamp, parse_u32, storage,
};
use crate::DbPool;

const APPOINTMENT_COLUMNS: &str = "id, user_id, client_phone, service, requested_date, status, \
     cancelled_by, cancelled_at, notes, design_ids_json, quote_id, review_id, \
     needs_reconciliation, version, created_at, updated_at";

pub struct SqlAppointmentRepository {
    pool: DbPool,
}

impl SqlAppointmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, appointment: &Appointment) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO appointment (id, user_id, client_phone, service, requested_date, status,
                                      cancelled_by, cancelled_at, notes, design_ids_json,
                                      quote_id, review_id, needs_reconciliation, version,
                                      created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&appointment.id.0)
        .bind(&appointment.user_id.0)
        .bind(&appointment.client_phone)
        .bind(&appointment.service)
        .bind(format_timestamp(appointment.requested_date))
        .bind(appointment.status.as_str())
        .bind(appointment.cancellation.map(|cancellation| cancellation.by.as_str()))
        .bind(appointment.cancellation.map(|cancellation| format_timestamp(cancellation.at)))
        .bind(&appointment.notes)
        .bind(encode_design_ids(&appointment.design_ids)?)
        .bind(&appointment.quote_id.0)
        .bind(appointment.review_id.as_ref().map(|id| id.0.clone()))
        .bind(appointment.needs_reconciliation)
        .bind(i64::from(appointment.version))
        .bind(format_timestamp(appointment.created_at))
        .bind(format_timestamp(appointment.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) if is_unique_violation(&error) => Err(conflict(&appointment.id, 0)),
            Err(error) => Err(storage(error)),
        }
    }
}

fn conflict(id: &AppointmentId, expected_version: u32) -> RepositoryError {
    RepositoryError::VersionConflict {
        entity: EntityKind::Appointment,
        id: id.0.clone(),
        expected_version,
    }
}

fn row_to_appointment(row: &SqliteRow) -> Result<Appointment, RepositoryError> {
    let status: String = column(row, "status")?;
    let status = AppointmentStatus::parse(&status)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown appointment status `{status}`")))?;

    let cancelled_by: Option<String> = column(row, "cancelled_by")?;
    let cancelled_at = parse_optional_timestamp("cancelled_at", column(row, "cancelled_at")?)?;
    let cancellation = match (cancelled_by, cancelled_at) {
        (Some(by), Some(at)) => {
            let by = CancelledBy::parse(&by).ok_or_else(|| {
                RepositoryError::Decode(format!("unknown value in `cancelled_by`: `{by}`"))
            })?;
            Some(Cancellation { by, at })
        }
        (None, None) => None,
        _ => {
            return Err(RepositoryError::Decode(
                "`cancelled_by` and `cancelled_at` must be set together".to_string(),
            ))
        }
    };

    let design_ids: String = column(row, "design_ids_json")?;
    let review_id: Option<String> = column(row, "review_id")?;

    Ok(Appointment {
        id: AppointmentId(column(row, "id")?),
        user_id: UserId(column(row, "user_id")?),
        client_phone: column(row, "client_phone")?,
        service: column(row, "service")?,
        requested_date: parse_timestamp("requested_date", column(row, "requested_date")?)?,
        status,
        cancellation,
        notes: column(row, "notes")?,
        design_ids: decode_design_ids("design_ids_json", &design_ids)?,
        quote_id: QuoteId(column(row, "quote_id")?),
        review_id: review_id.map(ReviewId),
        needs_reconciliation: column(row, "needs_reconciliation")?,
        version: parse_u32("version", column(row, "version")?)?,
        created_at: parse_timestamp("created_at", column(row, "created_at")?)?,
        updated_at: parse_timestamp("updated_at", column(row, "updated_at")?)?,
    })
}

#[async_trait]
impl AppointmentRepository for SqlAppointmentRepository {
    async fn find_by_id(
        &self,
        id: &AppointmentId,
    ) -> Result<Option<Appointment>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE id = ?"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;
        row.as_ref().map(row_to_appointment).transpose()
    }

    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Appointment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE user_id = ?
             ORDER BY requested_date DESC, id ASC"
        ))
        .bind(&owner.0)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.iter().map(row_to_appointment).collect()
    }

    async fn list_all(&self) -> Result<Vec<Appointment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointment ORDER BY requested_date DESC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.iter().map(row_to_appointment).collect()
    }

    async fn save(&self, appointment: Appointment) -> Result<(), RepositoryError> {
        match appointment.version {
            0 => return Err(conflict(&appointment.id, 0)),
            1 => return self.insert(&appointment).await,
            _ => {}
        }

        let expected_version = appointment.version - 1;
        let result = sqlx::query(
            "UPDATE appointment SET
                 client_phone = ?, service = ?, requested_date = ?, status = ?,
                 cancelled_by = ?, cancelled_at = ?, notes = ?, design_ids_json = ?,
                 review_id = ?, needs_reconciliation = ?, version = ?, updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(&appointment.client_phone)
        .bind(&appointment.service)
        .bind(format_timestamp(appointment.requested_date))
        .bind(appointment.status.as_str())
        .bind(appointment.cancellation.map(|cancellation| cancellation.by.as_str()))
        .bind(appointment.cancellation.map(|cancellation| format_timestamp(cancellation.at)))
        .bind(&appointment.notes)
        .bind(encode_design_ids(&appointment.design_ids)?)
        .bind(appointment.review_id.as_ref().map(|id| id.0.clone()))
        .bind(appointment.needs_reconciliation)
        .bind(i64::from(appointment.version))
        .bind(format_timestamp(appointment.updated_at))
        .bind(&appointment.id.0)
        .bind(i64::from(expected_version))
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(conflict(&appointment.id, expected_version));
        }
        Ok(())
    }

    async fn delete(&self, id: &AppointmentId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM appointment WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }
}
