use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use eosin_common::rate_limit::middleware::RateLimitLayer;
use owo_colors::OwoColorize;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::app::App;

mod auth_middleware;
mod protected;
mod public;

pub async fn run_server(cancel: CancellationToken, port: u16, app: App) -> Result<()> {
    let public_routes = Router::new()
        .route("/auth/login/{provider}", post(public::login))
        .route(
            "/auth/callback/{provider}",
            get(public::callback).post(public::callback),
        )
        .route("/auth/refresh", post(public::refresh))
        .route(
            "/.well-known/openid-configuration",
            get(public::openid_configuration),
        )
        .route("/.well-known/jwks.json", get(public::jwks))
        .route("/health", get(public::health));

    let protected_routes = Router::new()
        .route("/auth/me", get(protected::me))
        .route("/auth/logout", post(protected::logout))
        .route("/auth/sessions", get(protected::list_sessions))
        .route(
            "/auth/sessions/{session_id}",
            axum::routing::delete(protected::revoke_session),
        )
        .route(
            "/auth/sessions/revoke-all",
            post(protected::revoke_all_sessions),
        );

    let router = public_routes
        .merge(protected_routes)
        .fallback(not_found)
        .layer(RateLimitLayer::new(app.rate_limiter.clone()))
        .layer(axum::middleware::from_fn(eosin_common::access_log::public))
        .layer(axum::middleware::from_fn(
            eosin_common::middleware::create_context,
        ))
        .layer(eosin_common::cors::dev())
        .with_state(app);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding auth server to {addr}"))?;
    println!("{}", format!("🔐 Auth server listening on {addr}").green());

    let started = Instant::now();
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await
    .context("auth server failed")?;

    println!(
        "{} {}",
        "auth server stopped • uptime was".red(),
        format!("{:.2?}", started.elapsed()).red().dimmed()
    );
    Ok(())
}

async fn not_found(uri: axum::http::Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "not found", "path": uri.path()})),
    )
}
