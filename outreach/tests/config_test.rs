#![allow(clippy::unwrap_used, clippy::expect_used)]

use outreach::Outreach;
use outreach_delivery::{GeneratorConfig, OutreachQueryService, TransportConfig};
use outreach_store::StoreBackend;
use pretty_assertions::assert_eq;

const SAMPLE: &str = include_str!("../../outreach.config.ron");

#[test]
fn test_sample_config_parses() {
    let config: Outreach = ron::from_str(SAMPLE).expect("sample config is valid");

    assert!(matches!(config.store.backend, StoreBackend::File { .. }));
    assert_eq!(config.lifecycle.queue_interval_secs, 7200);
    assert_eq!(config.lifecycle.retry.delays_secs, vec![3600, 7200, 14400]);
    assert_eq!(
        config
            .lifecycle
            .business_hours
            .timezone_overrides
            .get("Scotland")
            .map(String::as_str),
        Some("Europe/London")
    );
    assert!(matches!(config.generator, GeneratorConfig::Template(_)));
    let TransportConfig::Webhook(webhook) = &config.transport;
    assert_eq!(webhook.url, "http://localhost:5678/webhook/send-email");
    assert!(config.audit.redact_recipients);
}

#[test]
fn test_minimal_config_uses_defaults() {
    let config: Outreach =
        ron::from_str(r#"Outreach(transport: Webhook((url: "http://localhost/send")))"#)
            .expect("minimal config is valid");

    assert!(matches!(config.store.backend, StoreBackend::Memory));
    assert_eq!(config.lifecycle.followups.first_delay_days, 5);
    assert_eq!(config.lifecycle.followups.second_delay_days, 10);
    assert_eq!(config.lifecycle.business_hours.start_hour, 9);
    assert!(matches!(config.generator, GeneratorConfig::Template(_)));
}

#[test]
fn test_transport_is_required() {
    assert!(ron::from_str::<Outreach>("Outreach()").is_err());
}

#[tokio::test]
async fn test_processor_builds_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("leads.bin");
    let config = format!(
        r#"Outreach(
            store: (backend: File(path: "{}")),
            transport: Webhook((url: "http://localhost/send")),
        )"#,
        path.display()
    );

    let config: Outreach = ron::from_str(&config).unwrap();
    let processor = config.processor().unwrap();

    let stats = processor.queue_stats().await.unwrap();
    assert_eq!(stats.new, 0);
    assert_eq!(stats.pending_followups, 0);
}

#[test]
fn test_invalid_lifecycle_is_rejected() {
    let config: Outreach = ron::from_str(
        r#"Outreach(
            lifecycle: (business_hours: (start_hour: 19, end_hour: 9)),
            transport: Webhook((url: "http://localhost/send")),
        )"#,
    )
    .unwrap();

    assert!(config.processor().is_err());
}

#[test]
fn test_empty_transport_url_is_rejected() {
    let config: Outreach =
        ron::from_str(r#"Outreach(transport: Webhook((url: "")))"#).unwrap();

    assert!(config.processor().is_err());
}
