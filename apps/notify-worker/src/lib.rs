//! Notify Worker Service
//!
//! Consumes domain events and delivers them as in-app notifications and emails.
//!
//! ## Architecture
//!
//! ```text
//! Topic exchange (domain.events)
//!   ├─ email.#         → email.events        → EmailProcessor        → SMTP / log
//!   └─ notification.#  → notification.events → NotificationProcessor → notifications table
//!                           ↓ (rejected / retries exhausted)
//!                        *.events.dlq
//! ```
//!
//! ## Features
//!
//! - One sequential consumer loop per channel, both running concurrently
//! - Bounded redelivery of transient failures, then dead-lettering
//! - Event registry validated against templates before consuming
//! - Graceful shutdown on SIGINT/SIGTERM
//! - Health, readiness and Prometheus endpoints

pub mod config;
pub mod health;
pub mod retry;

use core_config::{app_info, Environment, FromEnv};
use domain_notifications::{
    EmailChannel, EmailProcessor, EmailProvider, EntityStore, EventRegistry, InMemoryEntityStore,
    InMemoryNotificationSink, LogEmailProvider, NotificationChannel, NotificationProcessor,
    NotificationSink, PgEntityStore, PgNotificationSink, PipelineContext, SmtpConfig, SmtpProvider,
    TemplateEngine,
};
use event_bus::{AmqpBroker, Broker, BusConfig, ChannelConsumer, ConsumerConfig, InMemoryBroker};
use eyre::{Result, WrapErr};
use sea_orm::{ConnectOptions, Database};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::{BrokerKind, EmailProviderKind, WorkerConfig};
use crate::health::HealthState;
use crate::retry::{retry_with_backoff, RetryConfig};

async fn start_health_server(health_state: HealthState, port: u16) -> Result<()> {
    let app = health::router(health_state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind health server to {}", addr))?;

    info!(port = %port, "Health server listening");

    axum::serve(listener, app)
        .await
        .wrap_err("Health server failed")?;

    Ok(())
}

async fn connect_broker(config: &WorkerConfig, retry: &RetryConfig) -> Result<Arc<dyn Broker>> {
    match config.broker {
        BrokerKind::Memory => {
            warn!("Using in-memory broker; only this process can publish to it");
            Ok(Arc::new(InMemoryBroker::new()))
        }
        BrokerKind::Amqp => {
            info!("Connecting to AMQP broker...");
            let broker = retry_with_backoff("amqp", || AmqpBroker::connect(&config.bus), retry)
                .await
                .wrap_err("Failed to connect to AMQP broker")?;
            info!("Connected to AMQP broker successfully");
            Ok(Arc::new(broker))
        }
    }
}

async fn connect_persistence(
    config: &WorkerConfig,
    retry: &RetryConfig,
) -> Result<(Arc<dyn EntityStore>, Arc<dyn NotificationSink>)> {
    let Some(url) = &config.database_url else {
        warn!("DATABASE_URL not set, using in-memory entity store and notification sink");
        return Ok((
            Arc::new(InMemoryEntityStore::new()),
            Arc::new(InMemoryNotificationSink::new()),
        ));
    };

    let mut options = ConnectOptions::new(url.clone());
    options
        .max_connections(config.database_max_connections)
        .sqlx_logging(false);

    info!("Connecting to PostgreSQL...");
    let db = retry_with_backoff("postgres", || Database::connect(options.clone()), retry)
        .await
        .wrap_err("Failed to connect to PostgreSQL")?;
    info!("Connected to PostgreSQL successfully");

    Ok((
        Arc::new(PgEntityStore::new(db.clone())),
        Arc::new(PgNotificationSink::new(db)),
    ))
}

fn build_email_provider(kind: EmailProviderKind) -> Result<Arc<dyn EmailProvider>> {
    match kind {
        EmailProviderKind::Smtp => {
            let smtp_config =
                SmtpConfig::from_env().wrap_err("Failed to load SMTP configuration")?;
            let provider =
                SmtpProvider::new(smtp_config).wrap_err("Failed to create SMTP provider")?;
            Ok(Arc::new(provider))
        }
        EmailProviderKind::Log => {
            warn!("EMAIL_PROVIDER=log, emails are logged instead of sent");
            Ok(Arc::new(LogEmailProvider::new()))
        }
    }
}

/// Run both channel consumers until shutdown, then close the broker.
///
/// The broker is closed whether the consumers stopped cleanly or failed.
pub async fn run_consumers(
    broker: Arc<dyn Broker>,
    context: &PipelineContext,
    bus: &BusConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let notification_consumer = ChannelConsumer::new(
        broker.clone(),
        NotificationProcessor::new(context),
        ConsumerConfig::for_channel::<NotificationChannel>(bus),
    );
    let email_consumer = ChannelConsumer::new(
        broker.clone(),
        EmailProcessor::new(context),
        ConsumerConfig::for_channel::<EmailChannel>(bus),
    );

    let consumed = tokio::try_join!(
        notification_consumer.run(shutdown.clone()),
        email_consumer.run(shutdown),
    );

    if let Err(e) = broker.close().await {
        warn!(broker = broker.name(), error = %e, "Failed to close broker");
    }

    consumed.wrap_err("Channel consumer failed")?;
    Ok(())
}

/// Run the notify worker
///
/// 1. Sets up logging, error reports and metrics
/// 2. Connects to the broker, PostgreSQL and the email transport
/// 3. Validates the event registry against the templates
/// 4. Runs both channel consumers until shutdown
///
/// # Errors
///
/// Returns an error if configuration is invalid, a connection cannot be
/// established after retries, the registry is incomplete, or a consumer
/// loop fails.
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    event_bus::init_metrics();

    let app_info = app_info!();
    info!(name = %app_info.name, version = %app_info.version, "Starting notify worker service");
    info!("Environment: {:?}", environment);

    let config = WorkerConfig::from_env().wrap_err("Failed to load worker configuration")?;
    info!(
        broker = %config.broker,
        email_provider = %config.email_provider,
        exchange = %config.bus.exchange,
        max_redeliveries = config.bus.max_redeliveries,
        "Worker configuration loaded"
    );

    let retry = RetryConfig::new().with_max_retries(config.connect_retries);
    let broker = connect_broker(&config, &retry).await?;
    let (store, notifications) = connect_persistence(&config, &retry).await?;
    let email = build_email_provider(config.email_provider)?;

    let templates = TemplateEngine::new().wrap_err("Failed to compile templates")?;
    let context = PipelineContext::new(store, notifications, email, templates, EventRegistry::new());
    context
        .validate()
        .wrap_err("Event registry does not cover every event type")?;
    info!(event_types = context.registry().len(), "Event registry validated");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!("Error waiting for shutdown signal: {}", e);
        }
        let _ = shutdown_tx.send(true);
    });

    let health_state = HealthState::new(
        broker.clone(),
        app_info.name,
        app_info.version,
        context.registry().len(),
    );
    let health_port = config.health_port;
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_state, health_port).await {
            error!(error = %e, "Health server failed");
        }
    });

    info!("Starting channel consumers...");
    run_consumers(broker, &context, &config.bus, shutdown_rx).await?;

    info!("Notify worker service stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .wrap_err("Failed to install SIGTERM handler")?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.wrap_err("Failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C, initiating shutdown...");
            },
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating shutdown...");
            },
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .wrap_err("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C, initiating shutdown...");
    }

    Ok(())
}
