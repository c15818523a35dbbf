//! Boundaries to the external collaborators the lifecycle depends on.
//!
//! The processor only sees the [`ContentGenerator`] and [`SendTransport`]
//! traits. Concrete adapters are chosen by configuration and constructed
//! once at startup; construction failures surface immediately.

mod generator;
mod template;
mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use outreach_common::EmailType;
use outreach_store::{Lead, LeadId};
use serde::{Deserialize, Serialize};

pub use generator::WebhookGenerator;
pub use template::{EmailTemplate, TemplateGenerator};
pub use webhook::{ReceiptStrategy, WebhookConfig, WebhookTransport, interpret_response};

use crate::error::DeliveryError;

/// Subject and body produced for one lead and email type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedEmail {
    pub subject: String,
    pub body: String,
}

/// A fully resolved email handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub lead_id: LeadId,
    pub email_type: EmailType,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Identifiers returned by the transport, used later for reply correlation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: Option<String>,
    pub thread_id: Option<String>,
}

#[async_trait]
pub trait ContentGenerator: Send + Sync + std::fmt::Debug {
    /// Produce subject and body for `lead` at stage `email_type`.
    async fn generate(
        &self,
        lead: &Lead,
        website_context: Option<&str>,
        email_type: EmailType,
    ) -> Result<GeneratedEmail, DeliveryError>;
}

#[async_trait]
pub trait SendTransport: Send + Sync + std::fmt::Debug {
    /// Deliver `email`, returning the provider's identifiers.
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt, DeliveryError>;
}

/// Content generator selection
///
/// ```ron
/// generator: Webhook((url: "https://automation.example.com/webhook/generate")),
/// ```
#[derive(Debug, Clone, Deserialize)]
pub enum GeneratorConfig {
    /// Render built-in or configured templates locally
    Template(TemplateGenerator),
    /// Ask a remote service to write the email
    Webhook(WebhookConfig),
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::Template(TemplateGenerator::default())
    }
}

impl GeneratorConfig {
    /// # Errors
    /// If the HTTP client for a webhook generator cannot be built.
    pub fn build(self) -> Result<Arc<dyn ContentGenerator>, DeliveryError> {
        let generator: Arc<dyn ContentGenerator> = match self {
            Self::Template(template) => Arc::new(template),
            Self::Webhook(config) => Arc::new(WebhookGenerator::new(config)?),
        };
        Ok(generator)
    }
}

/// Send transport selection
///
/// ```ron
/// transport: Webhook((url: "https://automation.example.com/webhook/send", timeout_secs: 30)),
/// ```
#[derive(Debug, Clone, Deserialize)]
pub enum TransportConfig {
    Webhook(WebhookConfig),
}

impl TransportConfig {
    /// # Errors
    /// If the HTTP client cannot be built.
    pub fn build(self) -> Result<Arc<dyn SendTransport>, DeliveryError> {
        match self {
            Self::Webhook(config) => Ok(Arc::new(WebhookTransport::new(config)?)),
        }
    }
}
