//! REST and WebSocket API for the hospital management system

pub mod error;
pub mod extract;
mod handlers;
mod responses;
mod routes;
mod websocket;

pub use error::{ApiError, ApiResult};
pub use extract::CurrentUser;
pub use routes::*;

use crate::auth::JwtService;
use crate::config::HmsConfig;
use crate::core::HmsResult;
use crate::database::{DatabaseManager, PostgresManager, RedisManager};
use crate::services::{NotificationHub, NotificationService};
use anyhow::Result;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Shared API state
#[derive(Clone)]
pub struct ApiState {
    pub db_manager: Arc<DatabaseManager>,
    pub jwt: Arc<JwtService>,
    pub notifications: Arc<NotificationService>,
    pub hub: Arc<NotificationHub>,
    pub config: Arc<HmsConfig>,
}

impl ApiState {
    /// Wire the notification service to the WebSocket hub and the Redis publisher
    pub fn new(db_manager: Arc<DatabaseManager>, config: Arc<HmsConfig>) -> HmsResult<Self> {
        let jwt = Arc::new(JwtService::new(&config.auth)?);
        let hub = Arc::new(NotificationHub::new(config.notifications.channel_capacity));
        let notifications = NotificationService::new(
            db_manager.postgres.clone(),
            config.notifications.default_cooldown_minutes,
        )
        .with_sink(hub.clone())
        .with_sink(db_manager.redis.clone());

        Ok(Self {
            db_manager,
            jwt,
            notifications: Arc::new(notifications),
            hub,
            config,
        })
    }

    pub fn db(&self) -> &PostgresManager {
        &self.db_manager.postgres
    }

    pub fn cache(&self) -> &RedisManager {
        &self.db_manager.redis
    }
}

/// Start the API server
pub async fn start_server(state: ApiState) -> Result<tokio::task::JoinHandle<()>> {
    let bind_address = state.config.server.bind_address.clone();
    let app = create_router(state);

    let listener = TcpListener::bind(&bind_address).await?;
    info!("API server listening on {}", bind_address);

    let handle = tokio::spawn(async move {
        let service = app.into_make_service_with_connect_info::<SocketAddr>();
        if let Err(e) = axum::serve(listener, service).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(handle)
}

/// Build the full application router
pub fn create_router(state: ApiState) -> Router {
    let enable_cors = state.config.server.enable_cors;

    let api = Router::new()
        .merge(create_patient_routes())
        .merge(create_order_routes())
        .merge(create_medication_routes())
        .merge(create_result_routes())
        .merge(create_vitals_routes())
        .merge(create_task_routes())
        .merge(create_care_routes())
        .merge(create_schedule_routes())
        .merge(create_notification_routes())
        .merge(create_insight_routes());

    let app = Router::new()
        .nest("/api/auth", create_auth_routes())
        .nest("/api/admin", create_admin_routes())
        .nest("/api", api)
        .route("/health", get(handlers::health::health))
        .route("/health/details", get(handlers::health::health_details))
        .route("/ws", get(websocket::websocket_handler))
        .fallback(error::not_found)
        .with_state(state);

    let app = app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));
    if enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}
