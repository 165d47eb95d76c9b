use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use turingroom::{
    api::{self, AiState, RegistryState},
    chat::ChatRelay,
    config::{ServerConfig, Service},
    llm,
    matchmaking::MatchConfig,
    registry::Registry,
    ws::{self, ChatState},
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turingroom=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Turing Room services...");

    let server_config = ServerConfig::from_env();

    let cors = match api::cors_layer(&server_config.frontend_origin) {
        Ok(cors) => cors,
        Err(e) => {
            tracing::error!(
                origin = %server_config.frontend_origin,
                "Invalid FRONTEND_ORIGIN: {}",
                e
            );
            return;
        }
    };

    let llm_config = llm::LlmConfig::from_env();
    let provider = if server_config
        .services
        .iter()
        .any(|s| matches!(s, Service::Ai | Service::Chat))
    {
        init_provider(&llm_config)
    } else {
        None
    };

    // Chat admits players only to rooms this registry knows
    let registry = Arc::new(Registry::new());
    if server_config.services.contains(&Service::Chat)
        && !server_config.services.contains(&Service::Registry)
    {
        tracing::warn!("Chat service runs without the registry, no room can be joined");
    }

    let mut servers = Vec::new();
    for service in &server_config.services {
        let router = match service {
            Service::Registry => {
                let state = Arc::new(RegistryState::with_registry(
                    registry.clone(),
                    MatchConfig::from_env(),
                ));
                api::registry_router(state)
            }
            Service::Ai => api::ai_router(Arc::new(AiState::new(provider.clone(), &llm_config))),
            Service::Chat => {
                let relay = ChatRelay::from_config(provider.clone(), &llm_config);
                ws::chat_router(Arc::new(ChatState::new(registry.clone(), relay)))
            }
        };

        let app: Router = router.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors.clone()),
        );
        servers.push(serve(*service, server_config.addr_for(*service), app));
    }

    if let Err(e) = futures::future::try_join_all(servers).await {
        tracing::error!("Server stopped: {}", e);
    }
}

fn init_provider(config: &llm::LlmConfig) -> Option<Arc<dyn llm::LlmProvider>> {
    match config.build_provider() {
        Ok(provider) => {
            tracing::info!("LLM provider {} initialized", provider.name());
            Some(provider)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize LLM provider: {}. Guesses will fall back to human, chat will fail.",
                e
            );
            None
        }
    }
}

async fn serve(service: Service, addr: std::net::SocketAddr, app: Router) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("{} service listening on http://{}", service.name(), addr);
    axum::serve(listener, app).await
}
