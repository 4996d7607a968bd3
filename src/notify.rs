//! Fire-and-forget order notifications. Failures are logged and never
//! surfaced to the caller; the triggering state change is already durable
//! by the time a message is composed.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
};

use crate::{config::SmtpConfig, models::Order};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
    Confirmation,
    StatusChanged,
    Cancelled,
}

impl OrderEvent {
    fn subject(self) -> &'static str {
        match self {
            OrderEvent::Confirmation => "Your order is confirmed",
            OrderEvent::StatusChanged => "Your order status changed",
            OrderEvent::Cancelled => "Your order was cancelled",
        }
    }
}

#[derive(Clone)]
pub struct Mailer {
    inner: Option<SmtpMailer>,
}

#[derive(Clone)]
struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl Mailer {
    pub fn from_config(config: Option<&SmtpConfig>) -> anyhow::Result<Self> {
        let Some(config) = config else {
            tracing::info!("SMTP not configured, notifications disabled");
            return Ok(Self::disabled());
        };

        let credentials =
            Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            inner: Some(SmtpMailer {
                transport,
                from_address: config.from_address.clone(),
            }),
        })
    }

    /// No-op mailer used in tests and SMTP-less deployments.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Spawn the send so the caller's transaction result never waits on,
    /// or rolls back because of, email delivery.
    pub fn dispatch(&self, to: String, event: OrderEvent, order: &Order) {
        let Some(mailer) = self.inner.clone() else {
            tracing::debug!(order_id = %order.id, event = ?event, "mailer disabled, skipping notification");
            return;
        };

        let body = compose_body(event, order);
        let subject = event.subject().to_string();
        let order_id = order.id;

        tokio::spawn(async move {
            if let Err(err) = mailer.send(&to, &subject, &body).await {
                tracing::warn!(order_id = %order_id, error = %err, "notification dispatch failed");
            }
        });
    }
}

impl SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from_address.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        self.transport.send(message).await?;
        Ok(())
    }
}

fn compose_body(event: OrderEvent, order: &Order) -> String {
    match event {
        OrderEvent::Confirmation => format!(
            "Thanks for your purchase!\n\nOrder {} has been placed.\nTotal: {}\n",
            order.id, order.total_amount
        ),
        OrderEvent::StatusChanged => format!(
            "Order {} is now {}.\n",
            order.id, order.status
        ),
        OrderEvent::Cancelled => {
            let reason = order
                .cancellation_reason
                .as_deref()
                .unwrap_or("no reason given");
            format!("Order {} was cancelled ({reason}).\n", order.id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn order() -> Order {
        Order {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            address_id: Uuid::new_v4(),
            total_amount: 4500,
            status: "cancelled".into(),
            is_paid: true,
            payment_method: "gateway".into(),
            refund_required: true,
            cancelled_at: Some(Utc::now()),
            cancellation_reason: Some("changed my mind".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn cancellation_body_names_the_reason() {
        let body = compose_body(OrderEvent::Cancelled, &order());
        assert!(body.contains("changed my mind"));
    }

    #[tokio::test]
    async fn disabled_mailer_is_a_quiet_no_op() {
        // Must not panic or spawn anything that errors loudly.
        Mailer::disabled().dispatch("a@b.c".into(), OrderEvent::Confirmation, &order());
    }
}
