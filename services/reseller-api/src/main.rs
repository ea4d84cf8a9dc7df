//! Tandem Reseller API
//!
//! HTTP surface over the cross-panel reconciliation core, plus the
//! background scheduler that keeps usage snapshots fresh and warnings
//! flowing.
//!
//! ## REST Endpoints
//!
//! - `GET /api/v1/users` - reconciled listing across both panels
//! - `GET /api/v1/users/{key}` - reconcile one subscriber (UUID or username)
//! - `POST /api/v1/users/{key}/modify` - add quota/days on one or both panels
//! - `DELETE /api/v1/users/{key}` - remove from both panels
//! - `POST /api/v1/users/{key}/reset-usage` - zero counters, purge today's samples
//! - `GET /api/v1/users/{key}/usage/daily` - usage since local midnight
//! - `GET /api/v1/users/{key}/usage/windows?panel=` - trailing 3/6/12/24 h usage
//! - `GET /api/v1/search?q=` - search the combined listing
//! - `POST /api/v1/subscribers`, `POST /api/v1/subscribers/{id}/accounts`
//! - `PUT /api/v1/subscribers/{id}/settings`, `PUT /api/v1/subscribers/{id}/birthday`
//! - `POST /api/v1/accounts/{id}/payments`, `GET /api/v1/accounts/{id}/payments`,
//!   `GET /api/v1/payments/latest`
//! - `POST /api/v1/identity-map/reload`
//!
//! ## Health Endpoints
//!
//! - `GET /health` - liveness probe
//! - `GET /ready` - readiness probe
//! - `GET /metrics` - Prometheus metrics

mod config;
mod error;
mod handlers;
mod notify;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use tandem_core::{
    GiftService, ReconcilerService, ReportService, Scheduler, UsageService, WarningService,
};
use tandem_db::Repositories;
use tandem_panel::{
    IdentityMap, ListingCache, ListingCacheConfig, PanelApi, PrimaryClient, SecondaryClient,
};

use crate::config::Config;
use crate::notify::TracingNotifier;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("reseller_api=debug".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tandem Reseller API");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(http_port = config.http_port, "Configuration loaded");

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    // Create database pool and repositories
    let pool = tandem_db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");
    let repos = Repositories::new(pool.clone());

    // Identity map; an absent side file is not fatal, links load on reload
    let identity = Arc::new(IdentityMap::empty(&config.identity_map_path));
    match identity.reload() {
        Ok(entries) => tracing::info!(entries, "Identity map loaded"),
        Err(err) => tracing::warn!(error = %err, "Identity map not loaded, starting unlinked"),
    }

    // Panel clients
    let primary: Arc<dyn PanelApi> = Arc::new(PrimaryClient::new(config.primary_panel.clone())?);
    let secondary: Arc<dyn PanelApi> = Arc::new(SecondaryClient::new(
        config.secondary_panel.clone(),
        identity.clone(),
    )?);

    // Core services
    let core_config = Arc::new(config.core.clone());
    let usage = Arc::new(UsageService::new(repos.clone(), core_config.clone()));
    let reconciler = Arc::new(ReconcilerService::new(
        primary,
        secondary,
        ListingCache::new(ListingCacheConfig::new().with_ttl(config.listing_cache_ttl)),
        repos.clone(),
        usage.clone(),
    ));

    let notifier = Arc::new(TracingNotifier);
    let warnings = Arc::new(WarningService::new(
        repos.clone(),
        usage.clone(),
        notifier.clone(),
        core_config.clone(),
    ));
    let reports = Arc::new(ReportService::new(
        repos.clone(),
        usage.clone(),
        notifier.clone(),
        core_config.clone(),
    ));
    let gifts = Arc::new(GiftService::new(
        repos.clone(),
        reconciler.clone(),
        notifier,
        core_config.clone(),
    ));

    // Background scheduler
    let scheduler = Arc::new(Scheduler::new(
        reconciler.clone(),
        warnings,
        reports,
        gifts,
        repos.clone(),
        pool.clone(),
        core_config,
    ));
    let shutdown_token = CancellationToken::new();
    let scheduler_task = tokio::spawn(scheduler.run(shutdown_token.clone()));

    // Application state and router
    let state = AppState {
        reconciler,
        usage,
        repos,
        pool,
        identity,
        config: Arc::new(config.clone()),
    };
    let app = build_router(state, metrics_handle);

    // Serve until shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop scheduling new ticks; an in-flight job finishes on its own
    shutdown_token.cancel();
    let _ = scheduler_task.await;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();

    let api_v1 = Router::new()
        // Reconciled users
        .route("/users", get(handlers::list_users))
        .route(
            "/users/{key}",
            get(handlers::get_user).delete(handlers::delete_user),
        )
        .route("/users/{key}/modify", post(handlers::modify_user))
        .route("/users/{key}/reset-usage", post(handlers::reset_usage))
        // Usage windows
        .route("/users/{key}/usage/daily", get(handlers::daily_usage))
        .route("/users/{key}/usage/windows", get(handlers::windowed_usage))
        .route("/search", get(handlers::search_users))
        // Subscribers and accounts
        .route("/subscribers", post(handlers::create_subscriber))
        .route("/subscribers/{id}/accounts", post(handlers::register_account))
        .route("/subscribers/{id}/settings", put(handlers::update_setting))
        .route("/subscribers/{id}/birthday", put(handlers::set_birthday))
        // Payments
        .route(
            "/accounts/{id}/payments",
            post(handlers::record_payment).get(handlers::list_payments),
        )
        .route("/payments/latest", get(handlers::list_latest_payments))
        // Identity map
        .route("/identity-map/reload", post(handlers::reload_identity_map));

    // Health routes (no timeout - must always respond quickly)
    let health_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready));

    // Metrics route (no timeout)
    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Build middleware stack (order matters - outermost first)
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .nest("/api/v1", api_v1)
        .layer(middleware)
        .merge(health_routes)
        .merge(metrics_route)
        .with_state(state)
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!(
        "panel_requests_total",
        "Panel API requests by panel and status"
    );
    metrics::describe_counter!(
        "panel_listing_cache_hits_total",
        "Full-listing cache hits by panel"
    );
    metrics::describe_counter!(
        "panel_listing_cache_misses_total",
        "Full-listing cache misses by panel"
    );
    metrics::describe_counter!(
        "panel_lookup_failures_total",
        "Per-user panel lookups degraded to absent"
    );
    metrics::describe_counter!("snapshots_recorded_total", "Usage snapshot rows written");
    metrics::describe_counter!("warnings_sent_total", "Warning notices dispatched");
    metrics::describe_counter!(
        "scheduler_job_failures_total",
        "Scheduler jobs that failed and will retry next occasion"
    );
    metrics::describe_counter!(
        "notices_dispatched_total",
        "Notices surfaced through the operational notifier"
    );

    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
