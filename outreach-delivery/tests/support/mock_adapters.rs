//! Scriptable content generator and send transport
//!
//! Both mocks count their calls so tests can assert that an operation did (or
//! did not) reach an external collaborator.
#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use outreach_common::EmailType;
use outreach_delivery::{
    ContentGenerator, DeliveryError, GeneratedEmail, OutboundEmail, SendReceipt, SendTransport,
    TemporaryError,
};
use outreach_store::Lead;

#[derive(Debug, Default)]
pub struct MockGenerator {
    calls: AtomicUsize,
    fail: AtomicBool,
    delay: Option<Duration>,
}

impl MockGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let generator = Self::default();
        generator.fail.store(true, Ordering::SeqCst);
        Arc::new(generator)
    }

    /// A generator that takes `delay` to produce each email.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentGenerator for MockGenerator {
    async fn generate(
        &self,
        lead: &Lead,
        _website_context: Option<&str>,
        email_type: EmailType,
    ) -> Result<GeneratedEmail, DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(TemporaryError::GenerationFailed("scripted failure".to_string()).into());
        }

        Ok(GeneratedEmail {
            subject: format!("Hello {}", lead.display_name()),
            body: format!("{email_type} body for {}", lead.display_name()),
        })
    }
}

#[derive(Debug, Default)]
pub struct MockTransport {
    calls: AtomicUsize,
    fail: AtomicBool,
    delay: Option<Duration>,
    sent: Mutex<Vec<OutboundEmail>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let transport = Self::default();
        transport.fail.store(true, Ordering::SeqCst);
        Arc::new(transport)
    }

    /// A transport that takes `delay` to answer each send.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SendTransport for MockTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt, DeliveryError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(TemporaryError::ServiceUnavailable("503 scripted".to_string()).into());
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }

        Ok(SendReceipt {
            message_id: Some(format!("msg-{call}")),
            thread_id: Some(format!("thread-{call}")),
        })
    }
}
