//! HTTP API server for the order processing system.
//!
//! Provides REST endpoints for order intake, retrieval and cancellation,
//! plus operator endpoints for the dead-letter quarantine, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use ingestion::{InMemoryDeadLetterQueue, InMemoryQueue, QueueConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use notify::{AnalyticsRecorder, CustomerMessenger, NotificationTopic};
use order_store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use workflow::{
    InMemoryInventoryService, InMemoryPaymentGateway, OrderIntake, Orchestrator,
};

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/dead-letters", get(routes::dead_letters::list::<S>))
        .route(
            "/dead-letters/{id}/replay",
            post(routes::dead_letters::replay::<S>),
        )
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

/// Creates the default application state with in-memory queue, dead-letter
/// quarantine, mock capabilities and the standard fan-out subscribers.
///
/// Returns the state together with the orchestrator so the binary can
/// start a worker pool against the same queue.
pub fn create_default_state<S: OrderStore + Clone + 'static>(
    store: S,
) -> (
    Arc<AppState<S>>,
    Arc<Orchestrator<S, InMemoryPaymentGateway, InMemoryInventoryService>>,
) {
    let queue_config = QueueConfig::default();
    let queue = InMemoryQueue::new(queue_config.visibility_timeout);
    let dead_letters = InMemoryDeadLetterQueue::new();

    let mut topic = NotificationTopic::new().with_retry(3, Duration::from_millis(100));
    topic.subscribe(Arc::new(CustomerMessenger::new()));
    topic.subscribe(Arc::new(AnalyticsRecorder::new()));
    let topic = Arc::new(topic);

    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        InMemoryPaymentGateway::new(),
        InMemoryInventoryService::new(),
        topic.clone(),
    ));

    let intake = OrderIntake::new(store.clone(), queue.clone(), topic);

    let state = Arc::new(AppState {
        intake,
        store,
        queue,
        dead_letters,
    });

    (state, orchestrator)
}
