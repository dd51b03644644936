use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;

use salonbook_core::domain::quote::{Quote, QuoteId, QuoteStatus};
use salonbook_core::domain::user::UserId;
use salonbook_core::errors::{EntityKind, RepositoryError};
use salonbook_core::repository::QuoteRepository;

use super::{
    column, decode_design_ids, encode_design_ids, format_timestamp, is_unique_violation,
    parse_optional_timestamp, parse_timestamp, parse_u32, storage,
};
use crate::DbPool;

const QUOTE_COLUMNS: &str = "id, requester_id, service, notes, design_ids_json, status, \
     admin_price, admin_comment, created_at, responded_at, accepted_at, version";

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, quote: &Quote) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO quote (id, requester_id, service, notes, design_ids_json, status,
                                admin_price, admin_comment, created_at, responded_at,
                                accepted_at, version)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&quote.id.0)
        .bind(&quote.requester_id.0)
        .bind(&quote.service)
        .bind(&quote.notes)
        .bind(encode_design_ids(&quote.design_ids)?)
        .bind(quote.status.as_str())
        .bind(quote.admin_price.map(|price| price.to_string()))
        .bind(&quote.admin_comment)
        .bind(format_timestamp(quote.created_at))
        .bind(quote.responded_at.map(format_timestamp))
        .bind(quote.accepted_at.map(format_timestamp))
        .bind(i64::from(quote.version))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) if is_unique_violation(&error) => Err(conflict(&quote.id, 0)),
            Err(error) => Err(storage(error)),
        }
    }
}

fn conflict(id: &QuoteId, expected_version: u32) -> RepositoryError {
    RepositoryError::VersionConflict {
        entity: EntityKind::Quote,
        id: id.0.clone(),
        expected_version,
    }
}

fn row_to_quote(row: &SqliteRow) -> Result<Quote, RepositoryError> {
    let status: String = column(row, "status")?;
    let status = QuoteStatus::parse(&status)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown quote status `{status}`")))?;
    let admin_price = column::<Option<String>>(row, "admin_price")?
        .map(|raw| {
            Decimal::from_str(&raw).map_err(|error| {
                RepositoryError::Decode(format!("invalid decimal in `admin_price`: `{raw}` ({error})"))
            })
        })
        .transpose()?;
    let design_ids: String = column(row, "design_ids_json")?;

    Ok(Quote {
        id: QuoteId(column(row, "id")?),
        requester_id: UserId(column(row, "requester_id")?),
        service: column(row, "service")?,
        notes: column(row, "notes")?,
        design_ids: decode_design_ids("design_ids_json", &design_ids)?,
        status,
        admin_price,
        admin_comment: column(row, "admin_comment")?,
        created_at: parse_timestamp("created_at", column(row, "created_at")?)?,
        responded_at: parse_optional_timestamp("responded_at", column(row, "responded_at")?)?,
        accepted_at: parse_optional_timestamp("accepted_at", column(row, "accepted_at")?)?,
        version: parse_u32("version", column(row, "version")?)?,
    })
}

#[async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quote WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(row_to_quote).transpose()
    }

    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Quote>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quote WHERE requester_id = ?
             ORDER BY created_at DESC, id ASC"
        ))
        .bind(&owner.0)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.iter().map(row_to_quote).collect()
    }

    async fn list_all(&self) -> Result<Vec<Quote>, RepositoryError> {
        let rows =
            sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quote ORDER BY created_at DESC, id ASC"))
                .fetch_all(&self.pool)
                .await
                .map_err(storage)?;
        rows.iter().map(row_to_quote).collect()
    }

    async fn save(&self, quote: Quote) -> Result<(), RepositoryError> {
        match quote.version {
            0 => return Err(conflict(&quote.id, 0)),
            1 => return self.insert(&quote).await,
            _ => {}
        }

        let expected_version = quote.version - 1;
        let result = sqlx::query(
            "UPDATE quote SET
                 service = ?, notes = ?, design_ids_json = ?, status = ?, admin_price = ?,
                 admin_comment = ?, responded_at = ?, accepted_at = ?, version = ?
             WHERE id = ? AND version = ?",
        )
        .bind(&quote.service)
        .bind(&quote.notes)
        .bind(encode_design_ids(&quote.design_ids)?)
        .bind(quote.status.as_str())
        .bind(quote.admin_price.map(|price| price.to_string()))
        .bind(&quote.admin_comment)
        .bind(quote.responded_at.map(format_timestamp))
        .bind(quote.accepted_at.map(format_timestamp))
        .bind(i64::from(quote.version))
        .bind(&quote.id.0)
        .bind(i64::from(expected_version))
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(conflict(&quote.id, expected_version));
        }
        Ok(())
    }
}
