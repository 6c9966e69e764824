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
    net::{IpAddr, SocketAddr},
    path::PathBuf,
};

use clap::{Args, Parser, Subcommand};
use parley_app::AppConfig;
use parley_chat::{BusConfig, DeliveryMode, bus::DEFAULT_FAN_OUT_CAPACITY};
use parley_common_telemetry::{LogFormat, LoggingOptions};
use parley_server::http::{DEFAULT_MAX_HTTP_BODY_SIZE, RestServerConfig};
use parley_storage::{DEFAULT_BANDWIDTH, StorageConfig};
use snafu::Whatever;

mod build_info;

#[derive(Debug, Parser)]
#[clap(
name = "parley",
about = "A small chat server with live updates",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Server(ServerArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Starts the parley server.
Examples:

parley server
parley server --port :8080 --data-dir /var/lib/parley
parley server --in-memory --delivery fan-out --static-dir ./web_client/public

")]
struct ServerArgs {
    /// Port to listen on, `80` or `:80`
    #[arg(long, env = "PARLEY_PORT", default_value = ":80", value_parser = parse_port)]
    port:               u16,
    /// Interface to bind
    #[arg(long, env = "PARLEY_HOST", default_value = "0.0.0.0")]
    host:               IpAddr,
    /// Directory holding the database file
    #[arg(long, env = "PARLEY_DATA_DIR", default_value = "database")]
    data_dir:           PathBuf,
    /// Keep all data in memory
    #[arg(long, env = "PARLEY_IN_MEMORY")]
    in_memory:          bool,
    /// Serve this directory under /static
    #[arg(long, env = "PARLEY_STATIC_DIR")]
    static_dir:         Option<PathBuf>,
    /// `compete` hands each event to one waiting stream, `fan-out` to all
    #[arg(long, env = "PARLEY_DELIVERY", default_value_t = DeliveryMode::Compete)]
    delivery:           DeliveryMode,
    /// Per-stream queue length in fan-out mode
    #[arg(long, env = "PARLEY_FAN_OUT_CAPACITY", default_value_t = DEFAULT_FAN_OUT_CAPACITY)]
    fan_out_capacity:   usize,
    /// Ids reserved per counter update
    #[arg(long, env = "PARLEY_SEQUENCE_BANDWIDTH", default_value_t = DEFAULT_BANDWIDTH)]
    sequence_bandwidth: u64,
    /// Largest accepted request body in bytes
    #[arg(long, env = "PARLEY_MAX_BODY_SIZE", default_value_t = DEFAULT_MAX_HTTP_BODY_SIZE)]
    max_body_size:      usize,
    /// Disable permissive CORS headers
    #[arg(long, env = "PARLEY_NO_CORS")]
    no_cors:            bool,
    /// Log filter, e.g. `info` or `debug,tower_http=info`
    #[arg(long, env = "PARLEY_LOG_LEVEL")]
    log_level:          Option<String>,
    /// Write hourly log files here as well
    #[arg(long, env = "PARLEY_LOG_DIR")]
    log_dir:            Option<String>,
    #[arg(long, env = "PARLEY_LOG_FORMAT", default_value_t = LogFormat::Text)]
    log_format:         LogFormat,
}

/// Accepts `80` as well as `:80`.
fn parse_port(raw: &str) -> Result<u16, String> {
    let digits = raw.strip_prefix(':').unwrap_or(raw);
    digits
        .parse::<u16>()
        .map_err(|e| format!("'{raw}' is not a valid port: {e}"))
}

impl ServerArgs {
    fn into_config(self) -> AppConfig {
        let http = RestServerConfig::builder()
            .bind_address(SocketAddr::new(self.host, self.port).to_string())
            .max_body_size(self.max_body_size)
            .enable_cors(!self.no_cors)
            .maybe_static_dir(self.static_dir)
            .build();
        let storage = StorageConfig::builder()
            .data_dir(self.data_dir)
            .in_memory(self.in_memory)
            .sequence_bandwidth(self.sequence_bandwidth)
            .build();
        let bus = BusConfig::builder()
            .mode(self.delivery)
            .fan_out_capacity(self.fan_out_capacity)
            .build();
        let logging = LoggingOptions::builder()
            .dir(self.log_dir.unwrap_or_default())
            .maybe_level(self.log_level)
            .log_format(self.log_format)
            .build();
        AppConfig::builder()
            .http(http)
            .storage(storage)
            .bus(bus)
            .logging(logging)
            .build()
    }

    async fn run(self) -> Result<(), Whatever> { self.into_config().open().run().await }
}

#[tokio::main]
async fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();
    match cli.commands {
        Commands::Server(sa) => sa.run().await,
    }
}
