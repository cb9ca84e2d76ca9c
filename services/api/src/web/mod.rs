//! services/api/src/web/mod.rs
//!
//! Assembles the HTTP surface: REST routes, Swagger UI and the shared layers.

pub mod rest;
pub mod state;

pub use rest::{
    create_request_handler, delete_request_handler, get_pdf_handler, get_request_handler,
    get_request_pdf_handler, review_request_handler, ApiDoc,
};

use crate::error::ApiError;
use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use state::AppState;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Builds the complete application router for the given state.
pub fn build_router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = app_state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("invalid CORS_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    let api_router = Router::new()
        .route("/requests", post(create_request_handler))
        .route("/requests/pdf/{filename}", get(get_pdf_handler))
        .route(
            "/requests/{id}",
            get(get_request_handler)
                .patch(review_request_handler)
                .delete(delete_request_handler),
        )
        .route("/requests/{id}/pdf", get(get_request_pdf_handler))
        .layer(DefaultBodyLimit::max(app_state.config.max_body_bytes))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http()))
}
