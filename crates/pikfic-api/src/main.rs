//! Pikfic API server entry point.

use std::error::Error;
use std::sync::Arc;

use pikfic_api::config::AppConfig;
use pikfic_api::error::AppError;
use pikfic_api::routes;
use pikfic_api::state::AppState;
use pikfic_core::clock::SystemClock;
use pikfic_core::id::TimeOrderedIds;
use pikfic_generation::client::GenerationClient;
use pikfic_generation::gemini::GeminiService;
use pikfic_persistence::local_store::JsonFileStoryRepository;
use pikfic_persistence::selector::BackendSelector;
use pikfic_store::pg_story_repository::PgStoryRepositories;
use pikfic_story::domain::repository::RemoteRepositories;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

async fn remote_repositories(
    database_url: Option<&str>,
) -> Result<Option<Arc<dyn RemoteRepositories>>, AppError> {
    let Some(database_url) = database_url else {
        tracing::info!("DATABASE_URL not set; remote library disabled");
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;

    let repositories: Arc<dyn RemoteRepositories> = Arc::new(PgStoryRepositories::new(pool));
    Ok(Some(repositories))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Pikfic API server");

    let config = AppConfig::from_env()?;

    let local = Arc::new(JsonFileStoryRepository::new(&config.local_library_path));
    let remote = remote_repositories(config.database_url.as_deref()).await?;
    let service = GeminiService::new(config.gemini.clone())
        .map_err(|e| AppError::Config(e.to_string()))?;

    let app_state = AppState::new(
        Arc::new(SystemClock),
        Arc::new(TimeOrderedIds),
        GenerationClient::new(Arc::new(service)),
        BackendSelector::new(local, remote),
    );

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = routes::app(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.bind_addr()?;
    tracing::info!(
        %addr,
        library = %config.local_library_path.display(),
        "Listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(AppError::from)?;

    axum::serve(listener, app).await.map_err(AppError::from)?;

    Ok(())
}
