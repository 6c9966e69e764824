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

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use bon::Builder;
use parley_chat::{BusConfig, NotificationBus, Pipeline, UserDirectory};
use parley_common_telemetry::{LoggingOptions, init_global_logging, set_panic_hook};
use parley_server::{
    ServiceHandler,
    http::{RestServerConfig, RouteHandler, health_routes, start_rest_server},
    routes::{ChatState, chat_routes, metrics_routes},
};
use parley_storage::{Storage, StorageConfig};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::{ResultExt, Whatever};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const APP_NAME: &str = "parley";

/// Represents the main application with lifecycle management
#[derive(SmartDefault)]
pub struct App {
    /// Application configuration
    pub config:  AppConfig,
    /// Controls if the application should continue running
    #[default(_code = "Arc::new(AtomicBool::new(false))")]
    pub running: Arc<AtomicBool>,
    /// Cancelled once shutdown has fully completed
    #[default(_code = "CancellationToken::new()")]
    pub stopped: CancellationToken,
}

/// Configuration for the application
#[derive(Debug, Clone, Serialize, Deserialize, SmartDefault, Builder)]
#[serde(default)]
pub struct AppConfig {
    /// REST server configuration
    #[builder(default)]
    pub http:                     RestServerConfig,
    #[builder(default)]
    pub storage:                  StorageConfig,
    #[builder(default)]
    pub bus:                      BusConfig,
    #[builder(default)]
    pub logging:                  LoggingOptions,
    /// Also stop on Ctrl+C and SIGTERM
    #[default = true]
    #[builder(default = true)]
    pub enable_graceful_shutdown: bool,
}

impl AppConfig {
    #[must_use]
    pub fn open(self) -> App {
        App {
            config: self,
            ..Default::default()
        }
    }
}

/// Handle for controlling a running application
pub struct AppHandle {
    /// Sender for triggering shutdown
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Application running flag
    running:     Arc<AtomicBool>,
    stopped:     CancellationToken,
    local_addr:  SocketAddr,
}

impl AppHandle {
    /// Starts a graceful shutdown. Use `wait_for_shutdown()` to wait for it.
    pub fn shutdown(&mut self) {
        info!("Initiating graceful shutdown");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Check if the application is still running
    #[must_use]
    pub fn is_running(&self) -> bool { self.running.load(Ordering::SeqCst) }

    /// Waits until servers are stopped and storage is released.
    pub async fn wait_for_shutdown(&self) { self.stopped.cancelled().await; }

    /// Address the HTTP server listens on.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr { self.local_addr }
}

impl App {
    /// Opens storage, starts the HTTP server and returns a handle for
    /// controlling them.
    pub async fn start(&self) -> Result<AppHandle, Whatever> {
        info!(
            data_dir = %self.config.storage.data_dir.display(),
            in_memory = self.config.storage.in_memory,
            delivery = %self.config.bus.mode,
            "Starting {APP_NAME}"
        );

        let storage = self
            .config
            .storage
            .open()
            .whatever_context("Failed to open storage")?;
        let bus = Arc::new(NotificationBus::new(&self.config.bus));
        let state = ChatState {
            pipeline: Pipeline::new(&storage, Arc::clone(&bus)),
            users:    UserDirectory::new(Arc::clone(&storage.users)),
        };
        let handlers: Vec<RouteHandler> = vec![
            Box::new(chat_routes(state)),
            Box::new(health_routes),
            Box::new(metrics_routes),
        ];

        let mut http_handle = start_rest_server(self.config.http.clone(), handlers)
            .await
            .whatever_context("Failed to start REST server")?;
        http_handle.wait_for_start().await;
        let local_addr = http_handle.local_addr();

        self.running.store(true, Ordering::SeqCst);
        info!(%local_addr, "Application started successfully");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let running = Arc::clone(&self.running);
        let stopped = self.stopped.clone();
        let enable_graceful_shutdown = self.config.enable_graceful_shutdown;

        tokio::spawn(async move {
            if enable_graceful_shutdown {
                shutdown_signal(shutdown_rx).await;
            } else {
                // Just wait for explicit shutdown if graceful shutdown is disabled
                let _ = shutdown_rx.await;
            }

            running.store(false, Ordering::SeqCst);
            stop(&bus, http_handle, storage).await;
            stopped.cancel();
        });

        Ok(AppHandle {
            shutdown_tx: Some(shutdown_tx),
            running: Arc::clone(&self.running),
            stopped: self.stopped.clone(),
            local_addr,
        })
    }

    /// Run the application blocking until it's shut down
    pub async fn run(self) -> Result<(), Whatever> {
        let _guards = init_global_logging(APP_NAME, &self.config.logging);
        set_panic_hook();

        let handle = self.start().await?;
        handle.wait_for_shutdown().await;
        Ok(())
    }
}

/// Closes event streams first so the server can drain, then hands unissued
/// ids back to the counter.
async fn stop(bus: &NotificationBus, http_handle: ServiceHandler, storage: Storage) {
    info!("Shutting down servers");
    bus.close();
    http_handle.shutdown();
    http_handle.wait_for_stop().await;

    let sequence = Arc::clone(&storage.sequence);
    match tokio::task::spawn_blocking(move || sequence.release()).await {
        Ok(Ok(true)) => info!("Returned unused message ids"),
        Ok(Ok(false)) => {}
        Ok(Err(e)) => warn!(error = %e, "Could not return unused message ids"),
        Err(e) => warn!(error = %e, "Id release task failed"),
    }
    info!("Application shutdown complete");
}

async fn shutdown_signal(shutdown_rx: oneshot::Receiver<()>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C signal"); },
        () = terminate => { info!("Received terminate signal"); },
        _ = shutdown_rx => { info!("Received shutdown signal"); },
    }
}
