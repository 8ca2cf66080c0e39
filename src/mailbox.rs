//! Supplier ETA mentions arriving by email.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::eta;
use crate::google::TokenSource;
use crate::models::Store;
use crate::reconcile::Reconciler;

pub const MENTION_QUERY: &str = "subject:\"You've been mentioned on order\"";
const DEFAULT_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

static ORDER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(MLP\w+)").unwrap());
static SKU_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{3,})").unwrap());
static ETA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d+ to \d+ weeks|\d+ weeks|\d+ to \d+ days|\d+ days|No ETA|Ready|Early \w+ \d{4}|Mid \w+ \d{4}|Late \w+ \d{4}|Early \w+|Mid \w+|Late \w+)",
    )
    .unwrap()
});

// Gmail bodies are base64url, with or without padding.
const BODY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone)]
pub struct MailMessage {
    pub id: String,
    pub body: String,
    pub received: DateTime<Utc>,
}

#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Messages whose subject says an order was mentioned.
    async fn mention_messages(&self) -> Result<Vec<MailMessage>, String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtaMention {
    pub order_number: String,
    pub sku: String,
    pub eta: String,
}

/// Order number, first SKU-like number and ETA phrase in a message body.
pub fn parse_eta_mention(body: &str) -> Option<EtaMention> {
    let order_number = ORDER_RE.captures(body)?[1].to_string();
    let sku = SKU_RE.captures(body)?[1].to_string();
    let eta = ETA_RE.captures(body)?[1].to_string();
    Some(EtaMention {
        order_number,
        sku,
        eta,
    })
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EtaUpdate {
    pub order_number: String,
    pub sku: String,
    pub new_eta: String,
    pub exact_eta_date: String,
    /// Whether a matching row was found and written.
    pub recorded: bool,
}

/// Read mention emails and record each ETA on the order's sheet.
pub async fn sync_mentions(mailbox: &dyn Mailbox, reconciler: &Reconciler) -> Result<Vec<EtaUpdate>, String> {
    let messages = mailbox.mention_messages().await?;
    tracing::info!("Found {} mention email(s)", messages.len());

    let mut updates = Vec::new();
    for message in messages {
        let Some(mention) = parse_eta_mention(&message.body) else {
            tracing::debug!("Message {} has no ETA mention", message.id);
            continue;
        };

        let exact = eta::interpret_badge(&mention.eta, message.received.date_naive());
        let store = Store::from_order_number(&mention.order_number);
        let recorded = match reconciler
            .record_eta(store, &mention.order_number, &mention.sku, &exact)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                tracing::error!("Failed to record ETA for {}: {e}", mention.order_number);
                false
            }
        };

        updates.push(EtaUpdate {
            order_number: mention.order_number,
            sku: mention.sku,
            new_eta: mention.eta,
            exact_eta_date: exact,
            recorded,
        });
    }
    Ok(updates)
}

/// Gmail REST client reading the delegated user's inbox.
pub struct GmailMailbox {
    client: reqwest::Client,
    api_base: String,
    tokens: TokenSource,
}

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FullMessage {
    id: String,
    #[serde(default)]
    internal_date: Option<String>,
    payload: Option<MessagePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Deserialize)]
struct PartBody {
    #[serde(default)]
    data: Option<String>,
}

impl GmailMailbox {
    pub fn new(tokens: TokenSource) -> Result<Self, String> {
        Self::with_base(DEFAULT_API_BASE, tokens)
    }

    pub fn with_base(api_base: &str, tokens: TokenSource) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to build reqwest client: {e}"))?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T, String> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| format!("Gmail request failed: {e}"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("Gmail returned {status}: {body}"));
        }
        resp.json().await.map_err(|e| format!("Invalid Gmail response: {e}"))
    }

    fn messages_url(&self, id: Option<&str>) -> Result<Url, String> {
        let mut url = Url::parse(&format!("{}/messages", self.api_base))
            .map_err(|e| format!("Invalid Gmail URL: {e}"))?;
        if let Some(id) = id {
            url.path_segments_mut()
                .map_err(|_| "Gmail URL cannot have a path".to_string())?
                .push(id);
        }
        Ok(url)
    }
}

#[async_trait]
impl Mailbox for GmailMailbox {
    async fn mention_messages(&self) -> Result<Vec<MailMessage>, String> {
        let mut url = self.messages_url(None)?;
        url.query_pairs_mut().append_pair("q", MENTION_QUERY);
        let list: MessageList = self.get_json(url).await?;

        let mut messages = Vec::with_capacity(list.messages.len());
        for msg in list.messages {
            let mut url = self.messages_url(Some(&msg.id))?;
            url.query_pairs_mut().append_pair("format", "full");
            let full: FullMessage = self.get_json(url).await?;

            let received = full
                .internal_date
                .as_deref()
                .and_then(|ms| ms.parse::<i64>().ok())
                .and_then(DateTime::from_timestamp_millis)
                .unwrap_or_else(Utc::now);
            let body = full.payload.as_ref().and_then(plain_text).unwrap_or_default();

            messages.push(MailMessage {
                id: full.id,
                body,
                received,
            });
        }
        Ok(messages)
    }
}

/// First `text/plain` body in the MIME tree, decoded.
fn plain_text(part: &MessagePart) -> Option<String> {
    if part.mime_type == "text/plain" {
        let data = part.body.as_ref()?.data.as_deref()?;
        let bytes = BODY_ENGINE.decode(data).ok()?;
        return Some(String::from_utf8_lossy(&bytes).into_owned());
    }
    part.parts.iter().find_map(plain_text)
}
