use std::net::IpAddr;
use std::time::Duration;

use crate::models::Store;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub secret_key: String,
    pub host: IpAddr,
    pub port: u16,
    pub max_body_size: usize,
    pub log_level: String,
    pub default_store: Store,
    pub sheets: SheetsConfig,
    pub queue: QueueConfig,
    pub stores: StoreConfigs,
    pub smtp: SmtpConfig,
    pub notifications_enabled: bool,
    pub gmail_user: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    /// Service-account key JSON. `None` leaves the Sheets client uninitialized.
    pub credentials: Option<String>,
    pub arrival_sheet: String,
    pub web_stock_sheet: String,
    /// Prefix that replaces `gid://shopify/Order/` in the order link column.
    pub order_admin_url: String,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_retries: i64,
    pub item_delay: Duration,
    pub settle_delay: Duration,
    pub drain_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub sheet_name: String,
    pub shop_name: String,
    pub api_key: String,
    pub password: String,
    pub api_version: String,
    pub sender_email: String,
    pub sender_password: String,
    pub company: String,
    pub phone: String,
    pub website: String,
    pub signature_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct StoreConfigs {
    pub uk: StoreConfig,
    pub us: StoreConfig,
    pub eu: StoreConfig,
}

impl StoreConfigs {
    pub fn get(&self, store: Store) -> &StoreConfig {
        match store {
            Store::Uk => &self.uk,
            Store::Us => &self.us,
            Store::Eu => &self.eu,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let secret_key = env_required("ORDER_SYNC_SECRET_KEY")?;

        let host: IpAddr = env_or("ORDER_SYNC_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid ORDER_SYNC_HOST: {e}"))?;

        let port: u16 = env_or("ORDER_SYNC_PORT", "5000")
            .parse()
            .map_err(|e| format!("Invalid ORDER_SYNC_PORT: {e}"))?;

        let database_url = env_or("ORDER_SYNC_DATABASE_URL", "sqlite://order_sync.db?mode=rwc");

        let max_body_size: usize = env_or("ORDER_SYNC_MAX_BODY_SIZE", "1048576")
            .parse()
            .map_err(|e| format!("Invalid ORDER_SYNC_MAX_BODY_SIZE: {e}"))?;

        let log_level = env_or("ORDER_SYNC_LOG_LEVEL", "info");

        let default_store = Store::parse(&env_or("ORDER_SYNC_DEFAULT_STORE", "UK"))
            .ok_or("Invalid ORDER_SYNC_DEFAULT_STORE: expected UK, US or EU")?;

        let credentials = match std::env::var("GOOGLE_CREDENTIALS").ok() {
            Some(json) if !json.trim().is_empty() => Some(json),
            _ => match std::env::var("GOOGLE_CREDENTIALS_FILE").ok() {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .map_err(|e| format!("Failed to read GOOGLE_CREDENTIALS_FILE '{path}': {e}"))?,
                ),
                None => None,
            },
        };

        let sheets = SheetsConfig {
            spreadsheet_id: env_required("SPREADSHEET_ID")?,
            credentials,
            arrival_sheet: env_or("ARRIVAL_SHEET_NAME", "Arrival"),
            web_stock_sheet: env_or("WEB_STOCK_SHEET_NAME", "Web Stock"),
            order_admin_url: env_or(
                "ORDER_ADMIN_URL",
                "https://admin.shopify.com/store/mlperformance/orders/",
            ),
        };

        let queue = QueueConfig {
            max_retries: parse_env("ORDER_SYNC_MAX_RETRIES", "3")?,
            item_delay: Duration::from_millis(parse_env("ORDER_SYNC_ITEM_DELAY_MS", "1000")?),
            settle_delay: Duration::from_millis(parse_env("ORDER_SYNC_SETTLE_DELAY_MS", "2000")?),
            drain_interval: Duration::from_secs(parse_env("ORDER_SYNC_DRAIN_INTERVAL_SECS", "60")?),
        };

        let api_version = env_or("SHOPIFY_API_VERSION", "2023-10");
        let stores = StoreConfigs {
            uk: store_from_env(Store::Uk, &api_version),
            us: store_from_env(Store::Us, &api_version),
            eu: store_from_env(Store::Eu, &api_version),
        };

        let smtp = SmtpConfig {
            host: env_or("SMTP_HOST", "smtp.gmail.com"),
            port: parse_env("SMTP_PORT", "587")?,
        };

        let notifications_enabled = matches!(
            env_or("ORDER_SYNC_NOTIFY", "false").to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        );

        let gmail_user = std::env::var("GMAIL_USER").ok().filter(|s| !s.is_empty());

        Ok(Config {
            database_url,
            secret_key,
            host,
            port,
            max_body_size,
            log_level,
            default_store,
            sheets,
            queue,
            stores,
            smtp,
            notifications_enabled,
            gmail_user,
        })
    }
}

fn store_from_env(store: Store, api_version: &str) -> StoreConfig {
    let code = store.code();
    let var = |suffix: &str, default: &str| env_or(&format!("{code}_{suffix}"), default);

    StoreConfig {
        sheet_name: var("SHEET_NAME", &format!("Orders {code}")),
        shop_name: var("SHOP_NAME", ""),
        api_key: var("API_KEY", ""),
        password: var("PASSWORD", ""),
        api_version: api_version.to_string(),
        sender_email: var("SENDER_EMAIL", ""),
        sender_password: var("SENDER_PASSWORD", ""),
        company: var("COMPANY", "ML Performance"),
        phone: var("PHONE", ""),
        website: var("WEBSITE", "www.mlperformance.co.uk"),
        signature_name: var("SIGNATURE_NAME", "Customer Care"),
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_or(key, default)
        .parse()
        .map_err(|e| format!("Invalid {key}: {e}"))
}
