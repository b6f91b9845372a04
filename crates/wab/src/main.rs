use std::sync::Arc;

use tokio::sync::mpsc;

use wab_core::{
    auth::SessionDir,
    config::Config,
    dispatch::Dispatcher,
    lifecycle::{Backoff, SessionEnd, Supervisor},
    messaging::{guarded::ReadyGuard, port::TransportPort},
    registry::{GreetedStore, JsonFileRegistry},
    responder::{Responder, ResponderSettings},
};
use wab_evolution::{
    client::EvolutionClient,
    connector::EvolutionConnector,
    webhook::{self, WebhookState},
    EvolutionTransport,
};

mod liveness;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    wab_core::logging::init("wab")?;
    wab_core::logging::install_panic_hook();

    let cfg = Arc::new(Config::load()?);

    let registry = Arc::new(JsonFileRegistry::load(&cfg.greeted_file));
    tracing::info!(
        path = %registry.path().display(),
        greeted = registry.len(),
        "greeted registry loaded"
    );

    let client = Arc::new(EvolutionClient::from_config(&cfg)?);
    let transport = EvolutionTransport::new(client);

    // Outbound calls fail fast while the gateway reports the socket closed.
    let outbound: Arc<dyn TransportPort> =
        Arc::new(ReadyGuard::new(Arc::new(transport.clone())));
    let responder = Arc::new(Responder::new(
        outbound,
        registry,
        ResponderSettings::from_config(&cfg),
    ));
    let dispatcher = Arc::new(Dispatcher::new(responder));

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let connector = Arc::new(EvolutionConnector::new(
        transport.clone(),
        events_tx.clone(),
        cfg.public_webhook_url.clone(),
    ));

    let app = liveness::with_routes(webhook::router(
        &cfg.webhook_path,
        WebhookState {
            instance: cfg.evolution_instance.clone(),
            transport,
            events: events_tx,
        },
    ));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cfg.port)).await?;
    tracing::info!(
        port = cfg.port,
        webhook = %cfg.webhook_path,
        "keep-alive HTTP server listening"
    );
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("HTTP server failed: {e}");
        }
    });

    let supervisor = Supervisor::new(
        connector,
        dispatcher,
        SessionDir::new(&cfg.session_dir),
        Backoff::from_config(&cfg),
    );

    tokio::select! {
        end = supervisor.run(events_rx) => {
            if end? == SessionEnd::LoggedOut {
                // Stay up so the process keeper does not restart into the same logout.
                tracing::warn!("no active WhatsApp session; waiting for shutdown");
                shutdown_signal().await;
            }
        }
        _ = shutdown_signal() => {}
    }

    tracing::info!("shutting down");
    server.abort();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("could not listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
