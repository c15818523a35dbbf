use std::sync::{Arc, LazyLock};

use anyhow::Context;
use outreach_common::{Signal, audit, audit::AuditConfig, internal, logging};
use outreach_delivery::{GeneratorConfig, LifecycleConfig, LifecycleProcessor, TransportConfig};
use outreach_store::StoreConfig;
use serde::Deserialize;
use tokio::sync::broadcast;

/// Top-level configuration, read from `outreach.config.ron`.
///
/// Every collaborator of the lifecycle processor is named here and built once
/// at startup by [`Outreach::processor`].
#[derive(Debug, Deserialize)]
pub struct Outreach {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default, alias = "processor")]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    pub transport: TransportConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

#[tracing::instrument(level = "trace")]
async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered -- Enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, shutting down");
        }
    };

    let mut receiver = SHUTDOWN_BROADCAST.subscribe();

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    loop {
        tokio::select! {
            sig = receiver.recv() => {
                match sig {
                    Ok(s) => tracing::debug!("Received {s:?}"),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(e) => tracing::debug!("Received: {e:?}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    Ok(())
}

impl Outreach {
    /// Build the store, the content generator and the transport, and hand
    /// them to a new lifecycle processor.
    ///
    /// # Errors
    /// If a collaborator cannot be constructed or the lifecycle configuration
    /// is invalid.
    pub fn processor(self) -> anyhow::Result<LifecycleProcessor> {
        let store = self
            .store
            .into_store()
            .context("Failed to open the lead store")?;
        let generator = self
            .generator
            .build()
            .context("Failed to build the content generator")?;
        let transport = self
            .transport
            .build()
            .context("Failed to build the send transport")?;

        LifecycleProcessor::new(self.lifecycle, store, generator, transport)
            .context("Invalid lifecycle configuration")
    }

    /// Run the lifecycle processor until a shutdown signal arrives
    ///
    /// # Errors
    ///
    /// This function will return an error if any collaborator fails to
    /// initialise, or if the processor stops on its own.
    #[tracing::instrument(level = "trace", skip_all, err)]
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();
        audit::init(self.audit.clone());

        let processor = Arc::new(self.processor()?);

        internal!(level = INFO, "Controller running");

        let ret = tokio::select! {
            r = processor.serve(SHUTDOWN_BROADCAST.subscribe()) => {
                r.map_err(anyhow::Error::from)
            }
            r = shutdown() => {
                r
            }
        };

        internal!(level = INFO, "Shutting down...");

        if SHUTDOWN_BROADCAST.send(Signal::Finalised).is_err() {
            tracing::debug!("No subscribers left for {:?}", Signal::Finalised);
        }

        ret
    }
}
