#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use order_sync::config::{
    Config, QueueConfig, SheetsConfig, SmtpConfig, StoreConfig, StoreConfigs,
};
use order_sync::mailbox::{MailMessage, Mailbox};
use order_sync::models::Store;
use order_sync::notify::templates::Draft;
use order_sync::notify::Mailer;
use order_sync::queue::DrainReport;
use order_sync::sheets::memory::MemorySheets;
use order_sync::sheets::{RetryPolicy, SheetsApi};
use order_sync::state::{AppState, Services, SharedState};

pub const KEY: &str = "test-secret";

pub const HEADER: &[&str] = &[
    "Date", "Order", "URL", "SKU", "Vendor", "Country", "Type", "Supplier", "PIC", "Status",
    "ETA", "VIN", "Note", "Notes",
];

/// Records every email instead of sending it.
#[derive(Default)]
pub struct Outbox {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl Outbox {
    pub fn subjects(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, s)| s.clone()).collect()
    }
}

#[async_trait]
impl Mailer for Outbox {
    async fn send(&self, _profile: &StoreConfig, to: &str, draft: &Draft) -> Result<(), String> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), draft.subject.clone()));
        Ok(())
    }
}

/// Fixed set of mention emails.
pub struct Inbox {
    pub messages: Vec<MailMessage>,
}

#[async_trait]
impl Mailbox for Inbox {
    async fn mention_messages(&self) -> Result<Vec<MailMessage>, String> {
        Ok(self.messages.clone())
    }
}

pub fn mention(id: &str, body: &str, received: &str) -> MailMessage {
    MailMessage {
        id: id.to_string(),
        body: body.to_string(),
        received: received.parse::<DateTime<Utc>>().unwrap(),
    }
}

/// A running test server over an in-memory database and spreadsheet.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: SqlitePool,
    pub client: Client,
    pub state: SharedState,
    pub sheets: Arc<MemorySheets>,
    pub outbox: Arc<Outbox>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// POST a raw body to the webhook with the right key.
    pub async fn post_webhook(&self, action: &str, store: Option<&str>, body: &str) -> (Value, StatusCode) {
        self.post_webhook_bytes(action, store, body.as_bytes().to_vec()).await
    }

    pub async fn post_webhook_bytes(
        &self,
        action: &str,
        store: Option<&str>,
        body: Vec<u8>,
    ) -> (Value, StatusCode) {
        let mut url = format!("/webhook?key={KEY}&action={action}");
        if let Some(store) = store {
            url.push_str(&format!("&store={store}"));
        }
        let resp = self
            .client
            .post(self.url(&url))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .expect("webhook request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn get(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .send()
            .await
            .expect("POST request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Run one drain pass directly, instead of waiting for the worker.
    pub async fn drain(&self) -> DrainReport {
        self.state
            .drain()
            .await
            .expect("drain failed")
            .expect("no processor configured")
    }

    pub fn orders(&self, store: Store) -> Vec<Vec<String>> {
        self.sheets.raw_rows(&format!("Orders {}", store.code()))
    }
}

pub struct Options {
    pub with_sheets: bool,
    pub mailbox: Option<Arc<dyn Mailbox>>,
    pub notifications: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            with_sheets: true,
            mailbox: None,
            notifications: false,
        }
    }
}

pub fn test_config() -> Config {
    let store = |code: &str| StoreConfig {
        sheet_name: format!("Orders {code}"),
        sender_email: format!("orders-{}@example.com", code.to_lowercase()),
        company: "ML Performance".into(),
        signature_name: "Customer Care".into(),
        ..StoreConfig::default()
    };

    Config {
        database_url: "sqlite::memory:".into(),
        secret_key: KEY.into(),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        max_body_size: 64 * 1024,
        log_level: "warn".into(),
        default_store: Store::Uk,
        sheets: SheetsConfig {
            spreadsheet_id: "test-spreadsheet".into(),
            credentials: None,
            arrival_sheet: "Arrival".into(),
            web_stock_sheet: "Web Stock".into(),
            order_admin_url: "https://admin/orders/".into(),
        },
        queue: QueueConfig {
            max_retries: 3,
            item_delay: Duration::ZERO,
            settle_delay: Duration::ZERO,
            drain_interval: Duration::from_secs(3600),
        },
        stores: StoreConfigs {
            uk: store("UK"),
            us: store("US"),
            eu: store("EU"),
        },
        smtp: SmtpConfig {
            host: "localhost".into(),
            port: 2525,
        },
        notifications_enabled: false,
        gmail_user: None,
    }
}

pub fn seeded_sheets() -> MemorySheets {
    MemorySheets::new()
        .with_sheet("Orders UK", vec![HEADER.to_vec()])
        .with_sheet("Orders US", vec![HEADER.to_vec()])
        .with_sheet("Orders EU", vec![HEADER.to_vec()])
        .with_sheet(
            "Arrival",
            vec![
                vec!["", "Key", "Badge", "", "", "", "Store"],
                vec!["", "EVE-1", "2 weeks", "", "", "", ""],
                vec!["", "Mishimoto", "Mid March", "", "", "", ""],
            ],
        )
        .with_sheet("Web Stock", vec![vec!["SKU", "Barcode"], vec!["WEB-1", ""]])
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(Options::default()).await
}

pub async fn spawn_app_with(options: Options) -> TestApp {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let sheets = Arc::new(seeded_sheets());
    let outbox = Arc::new(Outbox::default());

    let mut config = test_config();
    config.notifications_enabled = options.notifications;

    let services = Services {
        sheets: options
            .with_sheets
            .then(|| sheets.clone() as Arc<dyn SheetsApi>),
        mailer: outbox.clone(),
        notes: None,
        mailbox: options.mailbox,
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
        },
    };

    let state: SharedState = Arc::new(AppState::new(pool.clone(), config, services));
    let app = order_sync::build_app(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        addr,
        pool,
        client: Client::new(),
        state,
        sheets,
        outbox,
    }
}

pub fn order_body(order_number: &str, skus: &[&str]) -> String {
    let items: Vec<Value> = skus
        .iter()
        .map(|sku| json!({ "sku": sku, "vendor": "Eventuri", "title": format!("Part {sku}"), "quantity": 1 }))
        .collect();
    json!({
        "order_number": order_number,
        "order_id": "gid://shopify/Order/501",
        "order_country": "GB",
        "order_created": "2024-01-01T09:00:00Z",
        "customer_email": "jo@example.com",
        "customer_first_name": "Jo",
        "line_items": items,
    })
    .to_string()
}
