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
mod chat;
mod organizations;
mod webhooks;
mod workspaces;

pub async fn run_server(cancel: CancellationToken, port: u16, app: App) -> Result<()> {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/webhooks/stripe", post(webhooks::stripe_webhook));

    let org_routes = Router::new()
        .route("/api/v1/organizations", post(organizations::create_organization).get(organizations::list_organizations))
        .route(
            "/api/v1/organizations/{orgId}",
            get(organizations::get_organization)
                .patch(organizations::update_organization)
                .delete(organizations::delete_organization),
        )
        .route(
            "/api/v1/organizations/{orgId}/members",
            get(organizations::list_members).post(organizations::upsert_member),
        )
        .route(
            "/api/v1/organizations/{orgId}/members/{userId}",
            axum::routing::delete(organizations::remove_member),
        )
        .route("/api/v1/organizations/{orgId}/invoices", get(workspaces::list_invoices))
        .route("/api/v1/organizations/{orgId}/subscription", get(workspaces::get_subscription))
        .route("/api/v1/organizations/{orgId}/usage", get(workspaces::get_organization_usage));

    let workspace_routes = Router::new()
        .route(
            "/api/v1/organizations/{orgId}/workspaces",
            post(workspaces::create_workspace).get(workspaces::list_workspaces),
        )
        .route(
            "/api/v1/organizations/{orgId}/workspaces/{wsId}",
            get(workspaces::get_workspace)
                .patch(workspaces::update_workspace)
                .delete(workspaces::delete_workspace),
        )
        .route(
            "/api/v1/organizations/{orgId}/workspaces/{wsId}/kubeconfig",
            get(workspaces::get_kubeconfig),
        )
        .route(
            "/api/v1/organizations/{orgId}/workspaces/{wsId}/usage",
            get(workspaces::get_usage),
        )
        .route(
            "/api/v1/organizations/{orgId}/workspaces/{wsId}/chat",
            post(chat::proxy_turn),
        );

    let router = public_routes
        .merge(org_routes)
        .merge(workspace_routes)
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
        .with_context(|| format!("binding core server to {addr}"))?;
    println!("{}", format!("☸ Core server listening on {addr}").green());

    let started = Instant::now();
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await
    .context("core server failed")?;

    println!(
        "{} {}",
        "core server stopped • uptime was".red(),
        format!("{:.2?}", started.elapsed()).red().dimmed()
    );
    Ok(())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

async fn not_found(uri: axum::http::Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "not found", "path": uri.path()})),
    )
}
