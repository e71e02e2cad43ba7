//! # HTTP Server for Template Rendering
//!
//! Exposes the render pipeline over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! API_KEY=secret placard serve --port 3000 --font-dir fonts
//! curl 'http://localhost:3000/update-canvas?apikey=secret&dbtemplate=card&name=World' -o card.png
//! ```
//!
//! | Status | Meaning |
//! |--------|---------|
//! | 200 | `image/png` body |
//! | 400 | no substitution parameters |
//! | 401 | missing or wrong `apikey` |
//! | 404 | template or masked group not found |
//! | 500 | store, image or render failure |

pub mod handlers;
pub mod state;

pub use state::AppState;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::PlacardError;

/// Build the router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/update-canvas", get(handlers::render::update_canvas))
        .route("/health", get(handlers::render::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// ## Example
///
/// ```no_run
/// use clap::Parser;
/// use placard::config::Config;
/// use placard::server::serve;
///
/// #[derive(Parser)]
/// struct Cli {
///     #[command(flatten)]
///     config: Config,
/// }
///
/// # async fn example() -> Result<(), placard::error::PlacardError> {
/// serve(Cli::parse().config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(config: Config) -> Result<(), PlacardError> {
    let pipeline = config.build_pipeline()?;
    if config.api_key.is_none() {
        warn!("no API key configured, every render request will be rejected");
    }
    let state = Arc::new(AppState::new(config.api_key.clone(), pipeline));
    let app = router(state);

    let listen_addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .map_err(|e| PlacardError::Dependency(format!("Failed to bind to {}: {}", listen_addr, e)))?;

    info!(
        listen = %listen_addr,
        delay_ms = config.render_delay_ms,
        pixel_ratio = config.render.pixel_ratio,
        "placard HTTP server started"
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| PlacardError::Dependency(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontBook;
    use crate::loader::HttpImageLoader;
    use crate::pipeline::{Pipeline, PipelineOptions};
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(api_key: Option<&str>) -> Router {
        let pipeline = Pipeline::new(
            Arc::new(MemoryStore::new()),
            Arc::new(HttpImageLoader::new().unwrap()),
            FontBook::default(),
            PipelineOptions {
                render_delay: Duration::ZERO,
                pixel_ratio: 1.0,
            },
        );
        router(Arc::new(AppState::new(api_key.map(String::from), pipeline)))
    }

    async fn status(app: Router, uri: &str) -> StatusCode {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(status(app(None), "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_auth_checked_first() {
        let uri = "/update-canvas?apikey=wrong";
        assert_eq!(status(app(Some("secret")), uri).await, StatusCode::UNAUTHORIZED);
        let uri = "/update-canvas?name=World";
        assert_eq!(status(app(Some("secret")), uri).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unconfigured_key_rejects_everything() {
        let uri = "/update-canvas?apikey=&name=World";
        assert_eq!(status(app(None), uri).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_no_parameters_is_bad_request() {
        let uri = "/update-canvas?apikey=secret&dbtemplate=card";
        assert_eq!(status(app(Some("secret")), uri).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_template_is_not_found() {
        let uri = "/update-canvas?apikey=secret&dbtemplate=missing&name=World";
        assert_eq!(status(app(Some("secret")), uri).await, StatusCode::NOT_FOUND);
    }
}
