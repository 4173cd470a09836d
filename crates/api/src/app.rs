use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use domain::services::{
    CoordinatorConfig, EquipmentCatalog, NotificationDispatcher, ReservationCoordinator,
    ReservationStore,
};
use shared::jwt::{JwtConfig, JwtError};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, security_headers_middleware, trace_id};
use crate::routes::{equipment, events, health, registrations};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReservationStore>,
    pub coordinator: ReservationCoordinator,
    pub catalog: EquipmentCatalog,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtConfig>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn ReservationStore>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Result<Self, JwtError> {
        let jwt = config.jwt.verifier()?;
        let coordinator = ReservationCoordinator::new(store.clone(), notifier).with_config(
            CoordinatorConfig {
                ticket_max_attempts: config.reservations.ticket_max_attempts,
            },
        );

        Ok(Self {
            catalog: EquipmentCatalog::new(store.clone()),
            coordinator,
            store,
            config: Arc::new(config),
            jwt: Arc::new(jwt),
        })
    }
}

pub fn create_app(
    config: Config,
    store: Arc<dyn ReservationStore>,
    notifier: Arc<dyn NotificationDispatcher>,
) -> Result<Router, JwtError> {
    Ok(router(AppState::new(config, store, notifier)?))
}

pub fn router(state: AppState) -> Router {
    let config = state.config.clone();

    // Empty origin list means development mode: allow any origin
    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Authenticated routes; the Identity extractor rejects missing or bad tokens
    let api_routes = Router::new()
        .route("/api/v1/events", post(events::create_event))
        .route(
            "/api/v1/events/:event_id",
            get(events::get_event).delete(events::delete_event),
        )
        .route(
            "/api/v1/events/:event_id/equipment",
            post(events::add_equipment),
        )
        .route(
            "/api/v1/events/:event_id/equipment/:equipment_id",
            patch(events::update_equipment_quantity).delete(events::remove_equipment),
        )
        .route("/api/v1/events/:event_id/register", post(events::register))
        .route(
            "/api/v1/registrations/:registration_id",
            get(registrations::get_registration).delete(registrations::cancel_registration),
        )
        .route(
            "/api/v1/registrations/:registration_id/ticket",
            get(registrations::download_ticket),
        )
        .route("/api/v1/equipment", post(equipment::create_equipment))
        .route(
            "/api/v1/equipment/:equipment_id",
            get(equipment::get_equipment).delete(equipment::delete_equipment),
        )
        .route(
            "/api/v1/equipment/:equipment_id/status",
            put(equipment::set_status),
        )
        .route(
            "/api/v1/equipment/:equipment_id/restock",
            post(equipment::restock),
        );

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
