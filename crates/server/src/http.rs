// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use axum::{
    Router, extract::DefaultBodyLimit, http::StatusCode, response::IntoResponse, routing::get,
};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::ResultExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;

use super::ServiceHandler;
use crate::{BindSnafu, ParseAddressSnafu, Result};

/// Default maximum HTTP request body size (1 MiB)
pub const DEFAULT_MAX_HTTP_BODY_SIZE: usize = 1024 * 1024;

/// A boxed route handler, for mixing closures and functions in one list.
pub type RouteHandler = Box<dyn Fn(Router) -> Router + Send + Sync>;

/// Configuration options for a REST server
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, bon::Builder)]
#[serde(default)]
pub struct RestServerConfig {
    /// The address to bind the REST server
    #[default = "0.0.0.0:80"]
    #[builder(default = "0.0.0.0:80".to_string(), into)]
    pub bind_address:  String,
    /// Maximum HTTP request body size in bytes
    #[default(DEFAULT_MAX_HTTP_BODY_SIZE)]
    #[builder(default = DEFAULT_MAX_HTTP_BODY_SIZE)]
    pub max_body_size: usize,
    /// Whether to enable CORS
    #[default = true]
    #[builder(default = true)]
    pub enable_cors:   bool,
    /// Directory served under `/static`
    #[builder(into)]
    pub static_dir:    Option<PathBuf>,
}

/// Starts the REST server and returns a handle for managing its lifecycle.
///
/// The listener is bound before this returns, so a taken port is reported
/// here rather than inside the server task. Route handlers are applied in
/// order, then the shared layers (tracing, body limit, CORS) wrap them all.
///
/// # Example
///
/// ```rust,no_run
/// use axum::{Router, routing::get};
/// use parley_server::http::{RestServerConfig, start_rest_server};
///
/// fn my_routes(router: Router) -> Router {
///     router.route("/hello", get(|| async { "Hello, World!" }))
/// }
///
/// # async fn run() -> parley_server::Result<()> {
/// let mut handle = start_rest_server(RestServerConfig::default(), vec![my_routes]).await?;
/// handle.wait_for_start().await;
/// # Ok(())
/// # }
/// ```
pub async fn start_rest_server<F>(
    config: RestServerConfig,
    route_handlers: Vec<F>,
) -> Result<ServiceHandler>
where
    F: Fn(Router) -> Router + Send + Sync + 'static,
{
    let bind_addr = config
        .bind_address
        .parse::<std::net::SocketAddr>()
        .context(ParseAddressSnafu {
            addr: config.bind_address.clone(),
        })?;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .context(BindSnafu {
            addr: config.bind_address.clone(),
        })?;
    let local_addr = listener.local_addr().context(BindSnafu {
        addr: config.bind_address.clone(),
    })?;

    let mut router = Router::new().route("/health", get(health_check));
    for handler in &route_handlers {
        router = handler(router);
    }
    if let Some(dir) = &config.static_dir {
        info!(dir = %dir.display(), "Serving static files under /static");
        router = router.nest_service("/static", ServeDir::new(dir));
    }

    router = router
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(TraceLayer::new_for_http());
    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    let cancellation_token = CancellationToken::new();
    let (started_tx, started_rx) = oneshot::channel::<()>();
    let shutdown = cancellation_token.clone();
    let join_handle = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = started_tx.send(());
                info!("REST server (on {}) started", local_addr);
                shutdown.cancelled().await;
                info!("REST server (on {}) received shutdown signal", local_addr);
            })
            .await;

        info!(
            "REST server (on {}) task completed: {:?}",
            local_addr, result
        );
    });

    Ok(ServiceHandler {
        join_handle,
        cancellation_token,
        started_rx: Some(started_rx),
        local_addr,
    })
}

/// Health check endpoint for the REST server
async fn health_check() -> impl IntoResponse { (StatusCode::OK, "OK") }

/// Health check handler that returns detailed health information
async fn api_health_handler() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "parley",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Adds `/api/v1/health` with detailed health information.
pub fn health_routes(router: Router) -> Router {
    router.route("/api/v1/health", get(api_health_handler))
}
