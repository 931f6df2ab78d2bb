//! HTTP API server with observability for the retail-ops order backend.
//!
//! Provides REST endpoints for the order lifecycle (create, payment
//! capture, status changes, refunds, audit trail), with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use reconciliation::{
    InMemoryCatalog, InMemoryIdentity, InMemoryLocations, OrderNumberPolicy,
    ReconciliationService,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/locations/{location_id}/orders",
            post(routes::orders::create::<S>),
        )
        .route(
            "/locations/{location_id}/orders",
            get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/{id}/payments",
            post(routes::orders::capture_payment::<S>),
        )
        .route(
            "/orders/{id}/status",
            post(routes::orders::change_status::<S>),
        )
        .route(
            "/orders/{id}/refunds",
            post(routes::orders::refund_line::<S>),
        )
        .route("/orders/{id}/history", get(routes::orders::history::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state with in-memory lookup collaborators and the
/// given order-number policy.
///
/// The returned lookup handles share state with the service, so callers
/// (tests, demo setup) can register businesses, users, items, and
/// locations after construction.
pub fn create_state<S: OrderStore + 'static>(
    store: S,
    number_policy: OrderNumberPolicy,
) -> Arc<AppState<S>> {
    let catalog = InMemoryCatalog::new();
    let identity = InMemoryIdentity::new();
    let locations = InMemoryLocations::new();

    let service = ReconciliationService::new(
        store,
        catalog.clone(),
        identity.clone(),
        locations.clone(),
    )
    .with_number_policy(number_policy);

    Arc::new(AppState {
        service,
        catalog,
        identity,
        locations,
    })
}

/// Creates application state with the default order-number policy.
pub fn create_default_state<S: OrderStore + 'static>(store: S) -> Arc<AppState<S>> {
    create_state(store, OrderNumberPolicy::default())
}
