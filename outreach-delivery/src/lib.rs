//! Email lifecycle engine for lead outreach
//!
//! This crate provides functionality to:
//! - Select queued leads and send their emails inside local business hours
//! - Retry failed sends on a fixed delay table and dead-letter exhausted leads
//! - Schedule, promote and cancel follow-up emails
//! - Generate content and send it through pluggable adapters

pub mod adapters;
mod error;
pub mod policy;
mod processor;
mod service;

pub use adapters::{
    ContentGenerator, EmailTemplate, GeneratedEmail, GeneratorConfig, OutboundEmail,
    ReceiptStrategy, SendReceipt, SendTransport, TemplateGenerator, TransportConfig,
    WebhookConfig, WebhookGenerator, WebhookTransport,
};
pub use error::{
    AttemptFailure, DeliveryError, FailureStage, PermanentError, SystemError, TemporaryError,
};
pub use policy::{BusinessHours, GateReason, RegionResolver, RetryDecision, RetryPolicy};
pub use processor::{
    AttemptOutcome, DeadLetterStats, FollowUpConfig, FollowUpReport, LifecycleConfig,
    LifecycleProcessor, QueueReport, SkipReason,
};
pub use service::{OutreachQueryService, QueueStats};
