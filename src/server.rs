/// HTTP server assembly
use crate::api;
use crate::context::AppContext;
use crate::error::{ApiError, ApiResult};
use crate::rate_limit;
use axum::{
    extract::State,
    http::header::{AUTHORIZATION, CONTENT_TYPE},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .expose_headers([AUTHORIZATION]);

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api::routes())
        .nest_service(
            "/uploads",
            ServeDir::new(&ctx.config.storage.upload_directory),
        )
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            ctx.clone(),
            rate_limit::global_rate_limit,
        ))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "name": ctx.config.service.application_name,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

pub async fn serve(ctx: AppContext) -> ApiResult<()> {
    let addr = format!(
        "{}:{}",
        ctx.config.service.hostname, ctx.config.service.port
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(
        listener,
        build_router(ctx).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
