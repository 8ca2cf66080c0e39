pub mod templates;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::commerce::{compose_note, OrderNotes};
use crate::config::{SmtpConfig, StoreConfig, StoreConfigs};
use crate::models::{OrderPayload, Store};
use crate::reconcile::ItemEta;
use templates::{Draft, DraftContext, Language};

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send `draft` to `to` from the store's sender account.
    async fn send(&self, profile: &StoreConfig, to: &str, draft: &Draft) -> Result<(), String>;
}

/// STARTTLS relay, authenticated as the store's sender.
pub struct SmtpMailer {
    host: String,
    port: u16,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, profile: &StoreConfig, to: &str, draft: &Draft) -> Result<(), String> {
        let message = Message::builder()
            .from(
                profile
                    .sender_email
                    .parse()
                    .map_err(|e| format!("Invalid from address: {e}"))?,
            )
            .to(to.parse().map_err(|e| format!("Invalid to address: {e}"))?)
            .subject(&draft.subject)
            .header(ContentType::TEXT_HTML)
            .body(draft.html.clone())
            .map_err(|e| format!("Failed to build email: {e}"))?;

        let creds = Credentials::new(profile.sender_email.clone(), profile.sender_password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .map_err(|e| format!("SMTP error: {e}"))?
            .port(self.port)
            .credentials(creds)
            .build();

        transport
            .send(message)
            .await
            .map_err(|e| format!("Failed to send email: {e}"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Received,
    Update,
}

/// Best-effort customer emails. Nothing here fails the caller: errors are
/// logged and the result only says whether an email went out.
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    notes: Option<Arc<dyn OrderNotes>>,
    stores: StoreConfigs,
    enabled: bool,
}

impl Notifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        notes: Option<Arc<dyn OrderNotes>>,
        stores: StoreConfigs,
        enabled: bool,
    ) -> Self {
        Self {
            mailer,
            notes,
            stores,
            enabled,
        }
    }

    pub async fn order_received(&self, store: Store, order: &OrderPayload, items: &[ItemEta]) -> bool {
        self.dispatch(Kind::Received, store, order, items).await
    }

    pub async fn eta_changed(&self, store: Store, order: &OrderPayload, items: &[ItemEta]) -> bool {
        self.dispatch(Kind::Update, store, order, items).await
    }

    async fn dispatch(&self, kind: Kind, store: Store, order: &OrderPayload, items: &[ItemEta]) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(to) = order.customer_email.as_deref().filter(|e| !e.trim().is_empty()) else {
            tracing::debug!("Order {} has no customer email, not notifying", order.order_number);
            return false;
        };

        let profile = self.stores.get(store);
        let ctx = DraftContext {
            order_number: &order.order_number,
            first_name: order.customer_first_name.as_deref().unwrap_or("Customer"),
            language: Language::for_order(store, order.country()),
            items,
            profile,
        };
        let today = Utc::now().date_naive();
        let draft = match kind {
            Kind::Received => templates::first_draft(&ctx),
            Kind::Update => templates::follow_up_draft(&ctx, today),
        };

        if let Err(e) = self.mailer.send(profile, to, &draft).await {
            tracing::error!("Error sending email for order {} to {to}: {e}", order.order_number);
            return false;
        }
        tracing::info!("Email '{}' sent to {to}", draft.subject);

        if let Some(notes) = &self.notes {
            let note = compose_note(items, today);
            if let Err(e) = notes.append_note(profile, &order.order_id, &note).await {
                tracing::error!("Failed to update note for order {}: {e}", order.order_number);
            }
        }
        true
    }
}
