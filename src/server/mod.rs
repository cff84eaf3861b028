//! HTTP server: shared state, router and lifecycle.

mod accounts;
mod calendar;
pub mod extract;
mod legacy;
mod subtasks;
mod todos;

use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::api_key::require_api_key;
use crate::auth::gate::require_bearer;
use crate::auth::{IntegrationKey, TokenService};
use crate::calendar::{CalendarProvider, GoogleCalendar};
use crate::config::Config;
use crate::db::Database;
use crate::error::{ApiError, ErrorCode};

/// Pagination limits for list endpoints.
#[derive(Debug, Clone, Copy)]
pub struct ListSettings {
    pub default_batch_size: u32,
    pub max_batch_size: u32,
}

impl Default for ListSettings {
    fn default() -> Self {
        Self {
            default_batch_size: 50,
            max_batch_size: 1000,
        }
    }
}

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Database>,
    tokens: Arc<TokenService>,
    calendar: Option<Arc<dyn CalendarProvider>>,
    integration_key: Option<Arc<IntegrationKey>>,
    list_settings: ListSettings,
}

impl AppState {
    pub fn new(db: Arc<Database>, tokens: Arc<TokenService>) -> Self {
        Self {
            db,
            tokens,
            calendar: None,
            integration_key: None,
            list_settings: ListSettings::default(),
        }
    }

    /// Build state from configuration.
    pub fn from_config(config: &Config, db: Arc<Database>) -> Self {
        let tokens = TokenService::with_lifetime(
            &config.auth.jwt_secret,
            chrono::Duration::seconds(config.auth.token_lifetime_secs),
        );

        let mut state = Self::new(db, Arc::new(tokens)).with_list_settings(ListSettings {
            default_batch_size: config.server.default_batch_size,
            max_batch_size: config.server.max_batch_size,
        });

        if let Some(key) = config
            .integration
            .api_key
            .as_deref()
            .and_then(IntegrationKey::new)
        {
            state = state.with_integration_key(key);
        }

        if let Some(calendar) = &config.calendar {
            state = state.with_calendar(Arc::new(GoogleCalendar::new(calendar.clone())));
        }

        state
    }

    pub fn with_calendar(mut self, provider: Arc<dyn CalendarProvider>) -> Self {
        self.calendar = Some(provider);
        self
    }

    pub fn with_integration_key(mut self, key: IntegrationKey) -> Self {
        self.integration_key = Some(Arc::new(key));
        self
    }

    pub fn with_list_settings(mut self, settings: ListSettings) -> Self {
        self.list_settings = settings;
        self
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    pub fn list_settings(&self) -> ListSettings {
        self.list_settings
    }

    /// The configured calendar provider.
    pub fn calendar(&self) -> Result<&Arc<dyn CalendarProvider>, ApiError> {
        self.calendar
            .as_ref()
            .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "Calendar integration is disabled"))
    }
}

/// Health check response.
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Everything here sits behind the bearer gate
    let mut user_routes = Router::new()
        .route("/todos", get(todos::list).post(todos::create))
        .route("/todos/reorder", put(todos::reorder))
        .route("/todos/{id}", put(todos::update).delete(todos::delete))
        .route("/todos/{id}/subtasks", post(subtasks::add))
        .route(
            "/todos/{id}/subtasks/{index}",
            put(subtasks::update).delete(subtasks::delete),
        );

    let mut public_routes = Router::new()
        .route("/auth/register", post(accounts::register))
        .route("/auth/login", post(accounts::login))
        .route("/health", get(health));

    if state.calendar.is_some() {
        user_routes = user_routes
            .route("/calendar/auth/google", get(calendar::auth_url))
            .route("/calendar/status", get(calendar::status))
            .route("/calendar/events", get(calendar::list_events))
            .route("/calendar/events/task/{id}", post(calendar::create_event))
            .route("/calendar/sync", post(calendar::sync));
        // The provider redirects here without our bearer token
        public_routes =
            public_routes.route("/calendar/auth/google/callback", get(calendar::callback));
    }

    let user_routes = user_routes.route_layer(middleware::from_fn_with_state(
        Arc::clone(&state.tokens),
        require_bearer,
    ));

    let mut app = Router::new().merge(public_routes).merge(user_routes);

    if let Some(key) = &state.integration_key {
        let integration_routes = Router::new()
            .route("/appian/todos", get(legacy::list).post(legacy::create))
            .route("/appian/todos/{id}", put(legacy::update).delete(legacy::delete))
            .route_layer(middleware::from_fn_with_state(
                Arc::clone(key),
                require_api_key,
            ));
        app = app.merge(integration_routes);
    }

    app.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle for a running server.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the server is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}

/// Bind and start serving in a background task.
pub async fn start_server(state: AppState, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Server listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Server shutting down");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(ServerHandle {
        addr: bound_addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}
