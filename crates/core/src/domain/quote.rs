use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::errors::{DomainError, EntityKind};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

/// Reference to an uploaded design image. Storage of the image itself lives elsewhere.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DesignId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Requested,
    Quoted,
    Accepted,
    Declined,
    Cancelled,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Quoted => "quoted",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "requested" => Some(Self::Requested),
            "quoted" => Some(Self::Quoted),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Statuses an administrator may assign when responding. `Accepted` is
    /// reserved for appointment booking.
    pub fn is_admin_assignable(&self) -> bool {
        matches!(self, Self::Quoted | Self::Declined | Self::Cancelled)
    }

    pub fn is_bookable(&self) -> bool {
        matches!(self, Self::Quoted | Self::Accepted)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub requester_id: UserId,
    pub service: String,
    pub notes: String,
    pub design_ids: Vec<DesignId>,
    pub status: QuoteStatus,
    pub admin_price: Option<Decimal>,
    pub admin_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub version: u32,
}

/// Administrator response to a quote request. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub price: Option<Decimal>,
    pub comment: Option<String>,
    pub status: Option<QuoteStatus>,
}

impl QuoteResponse {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(status) = self.status {
            if !status.is_admin_assignable() {
                return Err(DomainError::validation(
                    "status",
                    format!(
                        "`{}` cannot be set directly (expected quoted|declined|cancelled)",
                        status.as_str()
                    ),
                ));
            }
        }

        if let Some(price) = self.price {
            if price < Decimal::ZERO {
                return Err(DomainError::validation("price", "price must be a non-negative number"));
            }
        }

        Ok(())
    }
}

impl Quote {
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.requester_id == user_id
    }

    /// Applies an administrator response. The response must already be validated.
    pub fn apply_response(
        &mut self,
        response: QuoteResponse,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.status == QuoteStatus::Accepted {
            return Err(DomainError::QuoteLocked { quote_id: self.id.clone() });
        }
        response.validate()?;

        if let Some(price) = response.price {
            self.admin_price = Some(price);
        }
        if let Some(comment) = response.comment {
            self.admin_comment = Some(comment);
        }

        match (response.status, response.price) {
            (Some(status), _) => self.status = status,
            (None, Some(_)) => self.status = QuoteStatus::Quoted,
            (None, None) => {}
        }

        self.responded_at = Some(now);
        self.version += 1;
        Ok(())
    }

    /// Checks that `requester` may book an appointment against this quote.
    pub fn ensure_bookable_by(&self, requester: &UserId) -> Result<(), DomainError> {
        if !self.is_owned_by(requester) {
            return Err(DomainError::not_found(EntityKind::Quote, &self.id.0));
        }
        if !self.status.is_bookable() {
            return Err(DomainError::QuoteNotReady {
                quote_id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    pub fn mark_accepted(&mut self, now: DateTime<Utc>) {
        self.status = QuoteStatus::Accepted;
        self.accepted_at = Some(now);
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{Quote, QuoteId, QuoteResponse, QuoteStatus};
    use crate::domain::user::UserId;
    use crate::errors::DomainError;

    fn quote(status: QuoteStatus) -> Quote {
        Quote {
            id: QuoteId("Q-1".to_string()),
            requester_id: UserId("client-1".to_string()),
            service: "Gel manicure".to_string(),
            notes: String::new(),
            design_ids: Vec::new(),
            status,
            admin_price: None,
            admin_comment: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
            responded_at: None,
            accepted_at: None,
            version: 1,
        }
    }

    #[test]
    fn price_without_status_implies_quoted() {
        let mut quote = quote(QuoteStatus::Requested);
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

        quote
            .apply_response(
                QuoteResponse { price: Some(Decimal::new(300, 0)), ..QuoteResponse::default() },
                now,
            )
            .expect("requested -> quoted");

        assert_eq!(quote.status, QuoteStatus::Quoted);
        assert_eq!(quote.admin_price, Some(Decimal::new(300, 0)));
        assert_eq!(quote.responded_at, Some(now));
        assert_eq!(quote.version, 2);
    }

    #[test]
    fn comment_only_response_keeps_status() {
        let mut quote = quote(QuoteStatus::Requested);
        quote
            .apply_response(
                QuoteResponse { comment: Some("Need a photo".to_string()), ..Default::default() },
                Utc::now(),
            )
            .expect("comment only");

        assert_eq!(quote.status, QuoteStatus::Requested);
        assert!(quote.responded_at.is_some());
    }

    #[test]
    fn accepted_cannot_be_assigned_by_response() {
        let mut quote = quote(QuoteStatus::Quoted);
        let error = quote
            .apply_response(
                QuoteResponse { status: Some(QuoteStatus::Accepted), ..Default::default() },
                Utc::now(),
            )
            .expect_err("accepted is system-only");

        assert!(matches!(error, DomainError::Validation { ref field, .. } if field == "status"));
        assert_eq!(quote.status, QuoteStatus::Quoted);
    }

    #[test]
    fn accepted_quote_is_locked() {
        let mut quote = quote(QuoteStatus::Accepted);
        let error = quote
            .apply_response(
                QuoteResponse { status: Some(QuoteStatus::Declined), ..Default::default() },
                Utc::now(),
            )
            .expect_err("locked");

        assert!(matches!(error, DomainError::QuoteLocked { .. }));
    }

    #[test]
    fn negative_price_is_rejected() {
        let response =
            QuoteResponse { price: Some(Decimal::new(-1, 0)), ..QuoteResponse::default() };
        assert!(matches!(response.validate(), Err(DomainError::Validation { .. })));

        let free = QuoteResponse { price: Some(Decimal::ZERO), ..QuoteResponse::default() };
        assert!(free.validate().is_ok());
    }

    #[test]
    fn only_quoted_or_accepted_quotes_are_bookable() {
        let owner = UserId("client-1".to_string());
        assert!(quote(QuoteStatus::Quoted).ensure_bookable_by(&owner).is_ok());
        assert!(quote(QuoteStatus::Accepted).ensure_bookable_by(&owner).is_ok());
        assert!(matches!(
            quote(QuoteStatus::Requested).ensure_bookable_by(&owner),
            Err(DomainError::QuoteNotReady { status: QuoteStatus::Requested, .. })
        ));

        let stranger = UserId("client-2".to_string());
        assert!(matches!(
            quote(QuoteStatus::Quoted).ensure_bookable_by(&stranger),
            Err(DomainError::NotFound { .. })
        ));
    }
}
