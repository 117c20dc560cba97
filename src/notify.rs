//! Outbound notifications and domain events.
//!
//! Messages go to NATS when a client is configured; otherwise they are only
//! logged. E-mail delivery itself happens in a separate consumer.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::domain::events::DomainEvent;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to publish message: {0}")]
    Publish(String),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum Notification {
    OrderConfirmation { to: String, name: String, order_number: String, total: Decimal },
    EmailVerification { to: String, name: String, token: String },
    OrderStatusUpdate { to: String, order_number: String, status: String, tracking_number: Option<String> },
}

impl Notification {
    pub fn recipient(&self) -> &str {
        match self {
            Self::OrderConfirmation { to, .. } | Self::EmailVerification { to, .. } | Self::OrderStatusUpdate { to, .. } => to,
        }
    }
}

const EMAIL_SUBJECT: &str = "storefront.notifications.email";

#[derive(Clone, Default)]
pub struct Notifier {
    nats: Option<async_nats::Client>,
}

impl Notifier {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    /// A notifier that only logs.
    pub fn disabled() -> Self { Self { nats: None } }

    pub async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = serde_json::to_vec(notification)?;
        tracing::info!(to = notification.recipient(), "queueing notification");
        self.publish_raw(EMAIL_SUBJECT, payload).await
    }

    pub async fn publish(&self, event: &DomainEvent) -> Result<(), NotifyError> {
        let payload = serde_json::to_vec(event)?;
        tracing::debug!(subject = event.subject(), "publishing domain event");
        self.publish_raw(event.subject(), payload).await
    }

    /// Publishes an event, logging instead of failing.
    pub async fn publish_quietly(&self, event: &DomainEvent) {
        if let Err(error) = self.publish(event).await {
            tracing::warn!(subject = event.subject(), %error, "domain event not published");
        }
    }

    async fn publish_raw(&self, subject: &str, payload: Vec<u8>) -> Result<(), NotifyError> {
        let Some(client) = &self.nats else { return Ok(()) };
        client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| NotifyError::Publish(e.to_string()))
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").field("nats", &self.nats.is_some()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_payload_shape() {
        let n = Notification::EmailVerification { to: "a@b.com".into(), name: "A".into(), token: "t".into() };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["template"], "email_verification");
        assert_eq!(n.recipient(), "a@b.com");
    }

    #[tokio::test]
    async fn test_disabled_notifier_accepts_messages() {
        let n = Notification::OrderConfirmation {
            to: "a@b.com".into(), name: "A".into(), order_number: "ORD-1".into(), total: Decimal::new(10, 0),
        };
        assert!(Notifier::disabled().send(&n).await.is_ok());
    }
}
