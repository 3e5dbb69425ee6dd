//! # Courier Runtime
//!
//! Wires the bus, the user directory, the dispatch gateway and the user
//! service into one process.
//!
//! ## Startup Sequence
//!
//! 1. Validate configuration
//! 2. Subscribe the gateway to the event types it routes
//! 3. Start the user service on its mailbox
//! 4. Announce the service with a TECHNICAL `service_connection` envelope
//!
//! ## Shutdown Sequence
//!
//! 1. Signal shutdown to every task
//! 2. Unsubscribe the gateway, letting the in-flight dispatch finish
//! 3. Wait for the user service to stop

use std::sync::Arc;

use courier_bus::{
    DispatchGateway, EnvelopeFilter, EnvelopePublisher, GatewayHandle, InMemoryEnvelopeBus,
    PublishError, RedeliveryDecision, RedeliveryPolicy, DEAD_LETTER_CHANNEL,
};
use courier_envelope::event_types::SERVICE_CONNECT;
use courier_envelope::{current_time_millis, Category, Envelope, EnvelopeBuilder, EnvelopeError};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::adapters::UserDirectory;
use crate::config::{ConfigError, CourierConfig};
use crate::handlers::{user_routes, UserCommand, UserService};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("Runtime already started")]
    AlreadyStarted,
}

/// The running service.
pub struct CourierRuntime {
    config: CourierConfig,
    bus: Arc<InMemoryEnvelopeBus>,
    directory: Arc<UserDirectory>,
    gateway: Arc<DispatchGateway<UserCommand>>,
    redelivery: RedeliveryPolicy,
    /// Handed to the user service on start.
    mailbox: Option<mpsc::UnboundedReceiver<UserCommand>>,
    gateway_handle: Option<GatewayHandle>,
    service_task: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl CourierRuntime {
    /// Build the runtime from a validated configuration.
    pub fn new(config: CourierConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        info!(service = %config.service_name, "Creating courier runtime");

        let bus = Arc::new(InMemoryEnvelopeBus::with_capacity(config.gateway.bus_capacity));
        let directory = Arc::new(UserDirectory::with_reserved_usernames(
            config.reserved_usernames.iter().cloned(),
        ));

        let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel::<UserCommand>();
        let gateway = Arc::new(
            DispatchGateway::new(Arc::new(mailbox_tx), directory.clone(), user_routes())
                .with_resolve_timeout(config.gateway.resolve_timeout),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            redelivery: config.gateway.redelivery_policy(),
            config,
            bus,
            directory,
            gateway,
            mailbox: Some(mailbox_rx),
            gateway_handle: None,
            service_task: None,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Start the gateway and the user service, then announce the service.
    pub async fn start(&mut self) -> Result<(), RuntimeError> {
        let Some(mailbox) = self.mailbox.take() else {
            return Err(RuntimeError::AlreadyStarted);
        };

        info!("===========================================");
        info!("  Courier Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("  Service: {}", self.config.service_name);
        info!("===========================================");

        let filter = EnvelopeFilter::event_types(self.gateway.registry().event_types());
        let subscription = self.bus.subscribe(filter);
        self.gateway_handle = Some(Arc::clone(&self.gateway).spawn(subscription));

        let service = UserService::new(
            self.config.service_name.as_str(),
            self.directory.clone(),
            self.bus.clone(),
        );
        self.service_task = Some(tokio::spawn(service.run(mailbox, self.shutdown_rx.clone())));

        self.announce().await?;

        info!(
            transport = %self.config.transport.address(),
            business_channel = %self.config.transport.business_channel,
            broadcast_channel = %self.config.transport.broadcast_channel,
            service_queue = %self.config.transport.service_queue,
            "Courier runtime started"
        );
        Ok(())
    }

    /// Publish the TECHNICAL `service_connection` envelope.
    async fn announce(&self) -> Result<(), RuntimeError> {
        let envelope = EnvelopeBuilder::new()
            .with_category(Category::Technical)
            .with_from(self.config.service_name.as_str())
            .with_event_type(SERVICE_CONNECT)
            .with_new_correlation_id()
            .with_payload(&serde_json::json!({
                "service": self.config.service_name,
                "queue": self.config.transport.service_queue,
            }))?
            .build()?;

        self.bus.publish(&envelope).await?;
        Ok(())
    }

    /// Apply the redelivery policy to a failed envelope.
    ///
    /// Retries are published back onto the bus; dead letters are logged
    /// against the dead letter channel and returned to the caller.
    pub async fn redeliver(&self, envelope: &Envelope) -> Result<RedeliveryDecision, RuntimeError> {
        let decision = self.redelivery.evaluate(envelope, current_time_millis());
        match &decision {
            RedeliveryDecision::Retry(next) => {
                self.bus.publish(next).await?;
            }
            RedeliveryDecision::DeadLetter { envelope, reason } => {
                warn!(
                    channel = DEAD_LETTER_CHANNEL,
                    event_type = envelope.event_type(),
                    redelivery_count = envelope.redelivery_count(),
                    reason = %reason,
                    "Envelope dead-lettered"
                );
            }
        }
        Ok(decision)
    }

    /// Shut down gracefully.
    pub async fn shutdown(mut self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }

        if let Some(handle) = self.gateway_handle.take() {
            handle.unsubscribe().await;
        }
        if let Some(task) = self.service_task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "User service ended abnormally");
            }
        }

        info!("Shutdown complete");
    }

    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    pub fn bus(&self) -> Arc<InMemoryEnvelopeBus> {
        Arc::clone(&self.bus)
    }

    pub fn directory(&self) -> Arc<UserDirectory> {
        Arc::clone(&self.directory)
    }

    pub fn gateway(&self) -> Arc<DispatchGateway<UserCommand>> {
        Arc::clone(&self.gateway)
    }
}
