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

pub mod error;
pub mod http;
pub mod routes;

use std::net::SocketAddr;

use snafu::Snafu;
use tokio::{sync::oneshot::Receiver, task::JoinHandle};
use tokio_util::sync::CancellationToken;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(transparent)]
    Network { source: NetworkError },
}

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum NetworkError {
    #[snafu(display("Failed to bind {addr}"))]
    Bind {
        addr:   String,
        #[snafu(source)]
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to parse address {addr}"))]
    ParseAddress {
        addr:   String,
        #[snafu(source)]
        source: std::net::AddrParseError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Handle for managing a running service.
///
/// This handle provides control over a running service, allowing you to:
/// - Wait for the service to start accepting connections
/// - Signal graceful shutdown
/// - Wait for the service to fully stop
///
/// The handle uses a cancellation token for graceful shutdown.
pub struct ServiceHandler {
    /// Join handle for the server task
    join_handle:        JoinHandle<()>,
    /// Token for signalling shutdown
    cancellation_token: CancellationToken,
    /// Receiver for server start notification
    started_rx:         Option<Receiver<()>>,
    /// Address the listener is bound to
    local_addr:         SocketAddr,
}

impl ServiceHandler {
    /// Waits for the server to start accepting connections.
    ///
    /// Returns immediately when called a second time.
    pub async fn wait_for_start(&mut self) {
        if let Some(started_rx) = self.started_rx.take() {
            // a dropped sender means the task already ended; nothing to wait for
            let _ = started_rx.await;
        }
    }

    /// Waits for the server task to finish. Call `shutdown()` first.
    pub async fn wait_for_stop(self) {
        if let Err(e) = self.join_handle.await {
            tracing::error!(error = %e, "Server task did not finish cleanly");
        }
    }

    /// Signals the server to begin graceful shutdown.
    ///
    /// This method triggers the shutdown process but does not wait for
    /// completion. Use `wait_for_stop()` to wait for the server to fully stop.
    pub fn shutdown(&self) { self.cancellation_token.cancel(); }

    /// The bound address; useful when the configured port was 0.
    pub const fn local_addr(&self) -> SocketAddr { self.local_addr }
}
