//! HTTP webhook transport.
//!
//! The send collaborator is an automation endpoint that accepts a JSON
//! payload and answers with a loosely specified JSON body. The body is read
//! into a fixed schema and then offered to an ordered list of
//! [`ReceiptStrategy`]s; the first one that recognises it wins. A body no
//! strategy recognises is a temporary failure, never a silent success.

use std::time::Duration;

use ahash::AHashMap;
use async_trait::async_trait;
use outreach_common::{incoming, outgoing};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use super::{OutboundEmail, SendReceipt, SendTransport};
use crate::error::{DeliveryError, PermanentError, SystemError, TemporaryError};

/// Longest response excerpt kept in an error message.
const MAX_EXCERPT: usize = 200;

/// Connection details for a webhook collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,

    /// Per-request timeout in seconds.
    ///
    /// Default: 30
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,

    /// Extra headers sent with every request (for example an API key).
    #[serde(default)]
    pub headers: AHashMap<String, String>,
}

impl WebhookConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: defaults::timeout_secs(),
            headers: AHashMap::new(),
        }
    }

    /// # Errors
    /// If the URL is empty or a header name or value is malformed.
    pub(crate) fn client(&self) -> Result<reqwest::Client, DeliveryError> {
        if self.url.trim().is_empty() {
            return Err(SystemError::Configuration("webhook url must not be empty".into()).into());
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                SystemError::Configuration(format!("Invalid header name {name}: {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                SystemError::Configuration(format!("Invalid value for header {name}: {e}"))
            })?;
            headers.insert(name, value);
        }

        Ok(reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .default_headers(headers)
            .build()?)
    }
}

/// The response schema shared by the webhook collaborators.
///
/// Every field is optional; which ones are present decides which
/// [`ReceiptStrategy`] accepts the response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub(crate) struct WebhookResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default, alias = "messageId")]
    pub message_id: Option<String>,
    #[serde(default, alias = "threadId")]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl WebhookResponse {
    /// Parse an object, or the first element of an array of objects.
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str::<Self>(raw).ok().or_else(|| {
            serde_json::from_str::<Vec<Self>>(raw)
                .ok()
                .and_then(|items| items.into_iter().next())
        })
    }
}

/// One way of recognising a successful send in a webhook response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStrategy {
    /// `{"success": true, ...}`
    ExplicitSuccess,
    /// A `message_id` is present, with no `success` flag.
    MessageId,
    /// A non-JSON body that reports success in plain text.
    LegacyMarker,
}

impl ReceiptStrategy {
    /// Strategies in the order they are tried.
    pub const ORDER: [Self; 3] = [Self::ExplicitSuccess, Self::MessageId, Self::LegacyMarker];

    fn extract(self, response: Option<&WebhookResponse>, raw: &str) -> Option<SendReceipt> {
        match (self, response) {
            (Self::ExplicitSuccess, Some(response)) if response.success == Some(true) => {
                Some(receipt(response))
            }
            (Self::MessageId, Some(response))
                if response.success.is_none()
                    && response.message_id.as_deref().is_some_and(|id| !id.is_empty()) =>
            {
                Some(receipt(response))
            }
            (Self::LegacyMarker, None) => {
                let lowered = raw.trim().to_ascii_lowercase();
                let reports_success = (lowered.contains("sent") || lowered.contains("success"))
                    && !lowered.contains("not sent")
                    && !lowered.contains("fail");
                (lowered == "ok" || reports_success).then(SendReceipt::default)
            }
            _ => None,
        }
    }
}

fn receipt(response: &WebhookResponse) -> SendReceipt {
    SendReceipt {
        message_id: response.message_id.clone().filter(|id| !id.is_empty()),
        thread_id: response.thread_id.clone().filter(|id| !id.is_empty()),
    }
}

fn excerpt(raw: &str) -> String {
    let raw = raw.trim();
    match raw.char_indices().nth(MAX_EXCERPT) {
        Some((end, _)) => format!("{}...", &raw[..end]),
        None => raw.to_string(),
    }
}

/// Interpret the body of a successful (2xx) webhook response.
///
/// # Errors
/// - `success: false` is a permanent rejection carrying the collaborator's reason
/// - a body no [`ReceiptStrategy`] recognises is a temporary invalid response
pub fn interpret_response(raw: &str) -> Result<SendReceipt, DeliveryError> {
    let response = WebhookResponse::parse(raw);

    if let Some(response) = &response
        && response.success == Some(false)
    {
        let reason = response
            .error
            .clone()
            .or_else(|| response.message.clone())
            .unwrap_or_else(|| "success: false".to_string());
        return Err(PermanentError::Rejected(reason).into());
    }

    for strategy in ReceiptStrategy::ORDER {
        if let Some(receipt) = strategy.extract(response.as_ref(), raw) {
            incoming!(
                level = DEBUG,
                ?strategy,
                message_id = receipt.message_id.as_deref(),
                "Recognised send receipt"
            );
            return Ok(receipt);
        }
    }

    Err(TemporaryError::InvalidResponse(excerpt(raw)).into())
}

#[derive(Debug, Serialize)]
struct SendPayload<'a> {
    email_id: &'a str,
    subject: &'a str,
    body: &'a str,
    lead_id: String,
    email_type: &'a str,
}

/// Sends through an automation webhook.
#[derive(Debug, Clone)]
pub struct WebhookTransport {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookTransport {
    /// # Errors
    /// If the HTTP client cannot be built from `config`.
    pub fn new(config: WebhookConfig) -> Result<Self, DeliveryError> {
        let client = config.client()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl SendTransport for WebhookTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt, DeliveryError> {
        let payload = SendPayload {
            email_id: &email.recipient,
            subject: &email.subject,
            body: &email.body,
            lead_id: email.lead_id.to_string(),
            email_type: email.email_type.as_str(),
        };

        outgoing!(
            level = DEBUG,
            url = %self.config.url,
            lead_id = %email.lead_id,
            email_type = %email.email_type,
            "POST send webhook"
        );

        let response = self
            .client
            .post(&self.config.url)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        incoming!(
            level = DEBUG,
            status = status.as_u16(),
            lead_id = %email.lead_id,
            "Send webhook responded"
        );

        if !status.is_success() {
            return Err(DeliveryError::from_status(status, &excerpt(&body)));
        }

        interpret_response(&body)
    }
}

mod defaults {
    pub const fn timeout_secs() -> u64 {
        30
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_explicit_success() {
        let receipt =
            interpret_response(r#"{"success": true, "messageId": "m-1", "threadId": "t-1"}"#);
        assert_eq!(
            receipt.ok(),
            Some(SendReceipt {
                message_id: Some("m-1".to_string()),
                thread_id: Some("t-1".to_string()),
            })
        );
    }

    #[test]
    fn test_message_id_without_flag() {
        let receipt = interpret_response(r#"{"message_id": "m-2"}"#);
        assert_eq!(
            receipt.ok().and_then(|r| r.message_id),
            Some("m-2".to_string())
        );
    }

    #[test]
    fn test_array_wrapped_response() {
        let receipt = interpret_response(r#"[{"success": true, "message_id": "m-3"}]"#);
        assert_eq!(
            receipt.ok().and_then(|r| r.message_id),
            Some("m-3".to_string())
        );
    }

    #[test]
    fn test_legacy_plain_text() {
        assert!(interpret_response("Email sent").is_ok());
        assert!(interpret_response("OK").is_ok());
        assert!(interpret_response("email not sent").is_err());
    }

    #[test]
    fn test_explicit_failure_is_permanent() {
        let err = interpret_response(r#"{"success": false, "error": "mailbox full"}"#)
            .err()
            .map(|e| (e.is_permanent(), e.to_string()));
        assert_eq!(
            err,
            Some((true, "Permanent failure: Rejected: mailbox full".to_string()))
        );
    }

    #[test]
    fn test_unrecognised_is_temporary() {
        for raw in ["{}", r#"{"status": "queued"}"#, "", "<html>502</html>"] {
            let err = interpret_response(raw).err();
            assert!(
                matches!(
                    err,
                    Some(DeliveryError::Temporary(TemporaryError::InvalidResponse(_)))
                ),
                "{raw:?} should be an invalid response"
            );
        }
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(500);
        let short = excerpt(&long);
        assert_eq!(short.len(), MAX_EXCERPT + 3);
        assert!(short.ends_with("..."));
        assert_eq!(excerpt(" tiny "), "tiny");
    }

    #[test]
    fn test_config_validation() {
        assert!(WebhookTransport::new(WebhookConfig::new("")).is_err());

        let mut config = WebhookConfig::new("http://localhost:5678/webhook/send");
        config
            .headers
            .insert("bad header".to_string(), "v".to_string());
        assert!(WebhookTransport::new(config).is_err());
    }

    #[test]
    fn test_config_from_ron() {
        let config: WebhookConfig = ron::from_str(
            r#"(url: "http://localhost:5678/webhook/send", headers: {"X-Api-Key": "secret"})"#,
        )
        .unwrap_or_else(|_| WebhookConfig::new(""));
        assert_eq!(config.url, "http://localhost:5678/webhook/send");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.headers.get("X-Api-Key").map(String::as_str), Some("secret"));
    }
}
