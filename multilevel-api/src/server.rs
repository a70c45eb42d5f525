use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use multilevel_core::{Config, ImageClient, WeatherProvider, provider_from_config};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

mod error;
mod handlers;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    weather: Arc<dyn WeatherProvider>,
    images: Arc<ImageClient>,
}

impl AppState {
    pub fn new(weather: Arc<dyn WeatherProvider>, images: ImageClient) -> Self {
        Self { weather, images: Arc::new(images) }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/weather", post(handlers::weather))
        .route("/images", get(handlers::list_images))
        .route("/images/generate", post(handlers::generate_image))
        .route("/images/edit", post(handlers::edit_image))
        .route("/images/variations", post(handlers::create_variation))
        .route("/images/generated/:filename", get(handlers::serve_image))
        .route("/images/edited/:filename", get(handlers::serve_image))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let images = ImageClient::from_config(&config.images);
    images.store().ensure_dir().await.with_context(|| {
        format!("Failed to create images directory: {}", config.images.dir.display())
    })?;

    let state = AppState::new(Arc::from(provider_from_config(&config.weather)), images);

    let addr = (config.server.host.as_str(), config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}:{}", addr.0, addr.1))?;

    info!(
        "Starting HTTP server on http://{}, images in {}",
        listener.local_addr()?,
        config.images.dir.display()
    );

    axum::serve(listener, router(state)).await.context("HTTP server failed")
}
