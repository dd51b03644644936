use serde::{Deserialize, Serialize};

use crate::auth::{Actor, Capability};
use crate::domain::quote::{DesignId, Quote, QuoteId, QuoteResponse, QuoteStatus};
use crate::domain::user::UserId;
use crate::errors::{ApplicationError, DomainError, EntityKind};
use crate::notify::{Notification, NotificationEvent};

use super::{new_id, BookingEngine};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub service: String,
    pub notes: String,
    pub design_ids: Vec<DesignId>,
}

impl BookingEngine {
    pub async fn request_quote(
        &self,
        actor: &Actor,
        request: QuoteRequest,
    ) -> Result<Quote, ApplicationError> {
        let service = request.service.trim();
        if service.is_empty() {
            return Err(DomainError::validation("service", "service is required").into());
        }

        let quote = Quote {
            id: QuoteId(new_id()),
            requester_id: actor.id.clone(),
            service: service.to_string(),
            notes: request.notes.trim().to_string(),
            design_ids: request.design_ids,
            status: QuoteStatus::Requested,
            admin_price: None,
            admin_comment: None,
            created_at: self.clock.now(),
            responded_at: None,
            accepted_at: None,
            version: 1,
        };
        self.ports.quotes.save(quote.clone()).await?;

        tracing::info!(
            event_name = "booking.quote.requested",
            quote_id = %quote.id.0,
            requester_id = %actor.id.0,
            "quote requested"
        );
        self.announce(
            Notification::new(
                NotificationEvent::QuoteRequested,
                &quote.id.0,
                actor.clone(),
                quote.created_at,
            )
            .with_metadata("service", &quote.service),
        )
        .await;
        Ok(quote)
    }

    pub async fn respond_to_quote(
        &self,
        actor: &Actor,
        quote_id: &QuoteId,
        response: QuoteResponse,
    ) -> Result<Quote, ApplicationError> {
        self.guard.require(actor, Capability::RespondToQuote)?;
        let mut quote = self.load_quote(quote_id).await?;

        let now = self.clock.now();
        quote.apply_response(response, now)?;
        self.ports.quotes.save(quote.clone()).await?;

        tracing::info!(
            event_name = "booking.quote.responded",
            quote_id = %quote.id.0,
            status = quote.status.as_str(),
            "quote responded"
        );
        let mut notification = Notification::new(
            NotificationEvent::QuoteResponded,
            &quote.id.0,
            actor.clone(),
            now,
        )
        .with_metadata("status", quote.status.as_str())
        .with_metadata("requester_id", &quote.requester_id.0);
        if let Some(price) = quote.admin_price {
            notification = notification.with_metadata("price", price.to_string());
        }
        self.announce(notification).await;
        Ok(quote)
    }

    /// Flips a quote to `accepted` on behalf of an appointment being booked.
    /// Only reachable through booking; administrators cannot assign `accepted`.
    pub async fn consume_quote_for_appointment(
        &self,
        quote_id: &QuoteId,
        requester_id: &UserId,
    ) -> Result<Quote, ApplicationError> {
        let quote = self.load_quote(quote_id).await?;
        self.accept_quote(quote, requester_id).await
    }

    /// Flips the given snapshot. The save is versioned against that snapshot,
    /// so a quote another booking accepted in the meantime yields `Conflict`.
    pub(super) async fn accept_quote(
        &self,
        mut quote: Quote,
        requester_id: &UserId,
    ) -> Result<Quote, ApplicationError> {
        quote.ensure_bookable_by(requester_id)?;

        quote.mark_accepted(self.clock.now());
        self.ports.quotes.save(quote.clone()).await?;

        tracing::info!(
            event_name = "booking.quote.accepted",
            quote_id = %quote.id.0,
            "quote consumed by appointment"
        );
        Ok(quote)
    }

    pub async fn my_quotes(&self, actor: &Actor) -> Result<Vec<Quote>, ApplicationError> {
        Ok(self.ports.quotes.find_by_owner(&actor.id).await?)
    }

    pub async fn all_quotes(&self, actor: &Actor) -> Result<Vec<Quote>, ApplicationError> {
        self.guard.require(actor, Capability::ViewAllRecords)?;
        Ok(self.ports.quotes.list_all().await?)
    }

    pub(super) async fn load_quote(&self, quote_id: &QuoteId) -> Result<Quote, ApplicationError> {
        self.ports
            .quotes
            .find_by_id(quote_id)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::Quote, &quote_id.0).into())
    }
}
