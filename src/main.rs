pub use battle_server::*;

use axum::{
    routing::{get, post},
    Router,
};
use collaborators::{BattleCollaborators, StatProvider, UnitCatalog};
use config::StorageBackend;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let config = config::Config::from_env();

    // Load catalog and per-species data
    let catalog: Arc<dyn UnitCatalog> =
        monsters::UnitCatalogRepository::new(&config.monsters.units_path);
    let enrichment: Arc<dyn StatProvider> =
        monsters::MoveRepository::new(&config.monsters.species_path);

    let collaborators: BattleCollaborators = match config.storage.backend {
        StorageBackend::Redis => {
            let redis_client = redis_manager::init_redis_client(&config.storage.redis_url)
                .await
                .expect("Failed to connect to Redis");
            let store = redis_manager::RedisStore::connect(redis_client)
                .await
                .expect("Failed to create Redis connection manager");
            store.collaborators(catalog, Some(enrichment))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; balances and battles are lost on restart");
            memory_store::MemoryStore::new().collaborators(catalog, Some(enrichment))
        }
    };

    let battle_manager = Arc::new(combat::manager::BattleManager::new(
        collaborators,
        config.battle.clone(),
    ));
    let state = app_state::AppState::new(config.clone(), battle_manager);

    let cors = if config.server.cors_origins.iter().any(|origin| origin == "*") {
        CorsLayer::new().allow_origin(tower_http::cors::Any)
    } else {
        CorsLayer::new().allow_origin(
            config
                .server
                .cors_origins
                .iter()
                .map(|origin| origin.parse().unwrap())
                .collect::<Vec<_>>(),
        )
    };
    let cors = cors
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    let app = Router::new()
        .route("/challenges", post(handlers::create_challenge_handler))
        .route("/challenges/{target_id}/accept", post(handlers::accept_challenge_handler))
        .route("/challenges/{target_id}/decline", post(handlers::decline_challenge_handler))
        .route("/battles/{battle_id}/move", post(handlers::move_handler))
        .route("/battles/{battle_id}/switch", post(handlers::switch_handler))
        .route("/battles/{battle_id}/switch-menu", post(handlers::open_switch_menu_handler))
        .route("/battles/{battle_id}/switch-menu/close", post(handlers::close_switch_menu_handler))
        .route("/battles/{battle_id}/run", post(handlers::run_handler))
        .route("/battles/{battle_id}/ui-message", post(handlers::ui_message_handler))
        .route("/players/{user_id}/battle", get(handlers::player_battle_handler))
        .route("/players/{user_id}/challenge", get(handlers::player_challenge_handler))
        .route("/health", get(handlers::health_handler))
        .layer(cors)
        .with_state(state.clone());

    let addr = config.server_addr();
    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.expect("Failed to bind port");
    axum::serve(listener, app).await.expect("Server failed");
}
