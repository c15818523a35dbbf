use async_trait::async_trait;
use outreach_common::{EmailType, incoming, outgoing};
use outreach_store::Lead;
use serde::{Deserialize, Serialize};

use super::{ContentGenerator, GeneratedEmail, WebhookConfig};
use crate::error::{DeliveryError, TemporaryError};

#[derive(Debug, Serialize)]
struct GeneratePayload<'a> {
    lead_id: String,
    email_type: &'a str,
    first_name: Option<&'a str>,
    last_name: Option<&'a str>,
    company_name: Option<&'a str>,
    company_website: Option<&'a str>,
    country: Option<&'a str>,
    website_context: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

/// Delegates copywriting to a remote service.
///
/// The service receives the lead's profile and answers with
/// `{"subject": ..., "body": ...}` (optionally wrapped in an array).
#[derive(Debug, Clone)]
pub struct WebhookGenerator {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookGenerator {
    /// # Errors
    /// If the HTTP client cannot be built from `config`.
    pub fn new(config: WebhookConfig) -> Result<Self, DeliveryError> {
        let client = config.client()?;
        Ok(Self { config, client })
    }
}

fn parse_generated(raw: &str) -> Result<GeneratedEmail, DeliveryError> {
    let response = serde_json::from_str::<GenerateResponse>(raw).or_else(|_| {
        serde_json::from_str::<Vec<GenerateResponse>>(raw).map(|items| {
            items.into_iter().next().unwrap_or(GenerateResponse {
                subject: None,
                body: None,
            })
        })
    });

    let response = response.map_err(|e| TemporaryError::InvalidResponse(e.to_string()))?;

    match (response.subject, response.body) {
        (Some(subject), Some(body)) if !subject.trim().is_empty() && !body.trim().is_empty() => {
            Ok(GeneratedEmail {
                subject: subject.trim().to_string(),
                body: body.trim().to_string(),
            })
        }
        _ => Err(TemporaryError::InvalidResponse(
            "generator response is missing a subject or body".to_string(),
        )
        .into()),
    }
}

#[async_trait]
impl ContentGenerator for WebhookGenerator {
    async fn generate(
        &self,
        lead: &Lead,
        website_context: Option<&str>,
        email_type: EmailType,
    ) -> Result<GeneratedEmail, DeliveryError> {
        let payload = GeneratePayload {
            lead_id: lead.id.to_string(),
            email_type: email_type.as_str(),
            first_name: lead.first_name.as_deref(),
            last_name: lead.last_name.as_deref(),
            company_name: lead.company_name.as_deref(),
            company_website: lead.company_website.as_deref(),
            country: lead.country.as_deref(),
            website_context,
        };

        outgoing!(
            level = DEBUG,
            url = %self.config.url,
            lead_id = %lead.id,
            %email_type,
            "POST generate webhook"
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
            lead_id = %lead.id,
            "Generate webhook responded"
        );

        if !status.is_success() {
            return Err(DeliveryError::from_status(status, body.trim()));
        }

        parse_generated(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_and_array() {
        let object = parse_generated(r#"{"subject": " Hi ", "body": "Hello there"}"#).ok();
        assert_eq!(object.map(|e| e.subject), Some("Hi".to_string()));

        let array = parse_generated(r#"[{"subject": "Hi", "body": "Hello"}]"#).ok();
        assert_eq!(array.map(|e| e.body), Some("Hello".to_string()));
    }

    #[test]
    fn test_missing_fields_are_invalid() {
        assert!(matches!(
            parse_generated(r#"{"subject": "Hi", "body": "  "}"#),
            Err(DeliveryError::Temporary(TemporaryError::InvalidResponse(_)))
        ));
        assert!(matches!(
            parse_generated("[]"),
            Err(DeliveryError::Temporary(TemporaryError::InvalidResponse(_)))
        ));
        assert!(matches!(
            parse_generated("not json"),
            Err(DeliveryError::Temporary(TemporaryError::InvalidResponse(_)))
        ));
    }
}
