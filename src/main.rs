use arenaview::{api, config::Config, GatewayLedger, Ledger, Orchestrator, ViewPoller, ViewStore};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    let ledger: Arc<dyn Ledger> = Arc::new(GatewayLedger::new(
        config.ledger_api_url.clone(),
        config.arena_contract.clone(),
    ));
    let orchestrator = Arc::new(Orchestrator::new(ledger, config.payout_search()));
    let store = ViewStore::new();

    if !config.watch_games.is_empty() {
        let poller = Arc::new(ViewPoller::new(orchestrator.clone(), store.clone()));
        tracing::info!("Polling {} game(s)", config.watch_games.len());
        tokio::spawn(poller.run(config.watch_games.clone(), config.poll_interval()));
    }

    // Create router
    let app = api::create_router(api::AppState::new(orchestrator, store, config));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
