//! Event registration server.
//!
//! This binary:
//! - Connects to `PostgreSQL` and applies migrations
//! - Installs the Prometheus exporter and describes business metrics
//! - Wires the configured payment gateway
//! - Serves the checkout HTTP API until Ctrl+C or SIGTERM
//!
//! # Usage
//!
//! ```bash
//! docker compose up -d postgres
//! cargo run --bin server
//! ```

use event_registration::app::{RegistrationEnvironment, RegistrationService};
use event_registration::authnet::AuthorizeNetGateway;
use event_registration::config::{Config, GatewayKind};
use event_registration::metrics::register_business_metrics;
use event_registration::payment_gateway::{MockPaymentGateway, PaymentGateway};
use event_registration::server::{AppState, build_router};
use event_registration::store::PostgresRegistrationStore;
use hub_core::SystemClock;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,event_registration=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        host = %config.server.host,
        port = config.server.port,
        gateway = ?config.payment.gateway,
        "Configuration loaded"
    );

    let metrics_addr: SocketAddr =
        format!("{}:{}", config.server.metrics_host, config.server.metrics_port).parse()?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()?;
    register_business_metrics();
    info!(address = %metrics_addr, "Metrics exporter listening");

    let pool = hub_postgres::connect(&config.postgres).await?;
    hub_postgres::run_migrations(&pool).await?;
    info!("Database ready");

    let gateway: Arc<dyn PaymentGateway> = match config.payment.gateway {
        GatewayKind::AuthorizeNet => Arc::new(AuthorizeNetGateway::new(&config.payment)?),
        GatewayKind::Mock => {
            tracing::warn!("Using the mock payment gateway; no card will be charged");
            Arc::new(MockPaymentGateway::new())
        }
    };

    let env = RegistrationEnvironment::new(Arc::new(SystemClock), gateway)
        .with_settings(config.checkout.clone());
    let service = RegistrationService::new(PostgresRegistrationStore::new(pool), env);
    let app = build_router(AppState::new(service));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
