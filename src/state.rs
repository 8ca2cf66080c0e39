use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Notify;

use crate::commerce::{OrderNotes, ShopifyNotes};
use crate::config::Config;
use crate::google::{ServiceAccountKey, TokenSource, GMAIL_READONLY_SCOPE, SHEETS_SCOPE};
use crate::mailbox::{GmailMailbox, Mailbox};
use crate::notify::{Mailer, Notifier, SmtpMailer};
use crate::pipeline::OrderProcessor;
use crate::queue::{DrainReport, OrderQueue, QueueError};
use crate::reconcile::{Reconciler, SheetLayout};
use crate::sheets::google::GoogleSheets;
use crate::sheets::{RetryPolicy, SheetsApi, SheetsClient};

pub type SharedState = Arc<AppState>;

/// Outbound clients. Each is optional so the service can start (and report
/// what is missing) without every credential configured.
pub struct Services {
    pub sheets: Option<Arc<dyn SheetsApi>>,
    pub mailer: Arc<dyn Mailer>,
    pub notes: Option<Arc<dyn OrderNotes>>,
    pub mailbox: Option<Arc<dyn Mailbox>>,
    pub retry: RetryPolicy,
}

impl Services {
    pub fn from_config(config: &Config) -> Self {
        let key = config.sheets.credentials.as_deref().and_then(|json| {
            ServiceAccountKey::from_json(json)
                .map_err(|e| tracing::error!("Google credentials unusable: {e}"))
                .ok()
        });

        let sheets: Option<Arc<dyn SheetsApi>> = match &key {
            Some(key) => TokenSource::service_account(key.clone(), &[SHEETS_SCOPE], None)
                .and_then(|tokens| GoogleSheets::new(&config.sheets.spreadsheet_id, tokens))
                .map(|client| Arc::new(client) as Arc<dyn SheetsApi>)
                .map_err(|e| tracing::error!("Google Sheets client not available: {e}"))
                .ok(),
            None => {
                tracing::warn!("No Google credentials configured, Sheets client disabled");
                None
            }
        };

        let mailbox: Option<Arc<dyn Mailbox>> = match (&key, &config.gmail_user) {
            (Some(key), Some(user)) => {
                TokenSource::service_account(key.clone(), &[GMAIL_READONLY_SCOPE], Some(user.clone()))
                    .and_then(GmailMailbox::new)
                    .map(|client| Arc::new(client) as Arc<dyn Mailbox>)
                    .map_err(|e| tracing::error!("Gmail client not available: {e}"))
                    .ok()
            }
            _ => None,
        };

        let notes: Option<Arc<dyn OrderNotes>> = ShopifyNotes::new()
            .map(|n| Arc::new(n) as Arc<dyn OrderNotes>)
            .map_err(|e| tracing::warn!("Order notes disabled: {e}"))
            .ok();

        Self {
            sheets,
            mailer: Arc::new(SmtpMailer::new(&config.smtp)),
            notes,
            mailbox,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub queue: OrderQueue,
    pub reconciler: Option<Arc<Reconciler>>,
    pub processor: Option<Arc<OrderProcessor>>,
    pub mailbox: Option<Arc<dyn Mailbox>>,
    pub drain_signal: Notify,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config, services: Services) -> Self {
        let reconciler = services.sheets.map(|api| {
            Arc::new(Reconciler::new(
                SheetsClient::new(api, services.retry),
                SheetLayout::from_config(&config),
            ))
        });

        let notifier = Arc::new(Notifier::new(
            services.mailer,
            services.notes,
            config.stores.clone(),
            config.notifications_enabled,
        ));
        let processor = reconciler
            .as_ref()
            .map(|r| Arc::new(OrderProcessor::new(r.clone(), Some(notifier))));

        Self {
            queue: OrderQueue::new(pool.clone(), config.queue.clone()),
            pool,
            config,
            reconciler,
            processor,
            mailbox: services.mailbox,
            drain_signal: Notify::new(),
        }
    }

    /// Wake the drain worker.
    pub fn request_drain(&self) {
        self.drain_signal.notify_one();
    }

    /// Drain the queue now. `None` when there is no Sheets client to process with.
    pub async fn drain(&self) -> Result<Option<DrainReport>, QueueError> {
        match &self.processor {
            Some(processor) => self.queue.drain(processor.as_ref()).await.map(Some),
            None => Ok(None),
        }
    }
}
