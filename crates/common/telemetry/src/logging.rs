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
    env,
    io::IsTerminal,
    sync::{Arc, Mutex, Once},
};

use bon::Builder;
use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Deserializer, Serialize, de};
use smart_default::SmartDefault;
use tracing::Subscriber;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter, fmt::MakeWriter, layer::SubscriberExt, prelude::*,
    registry::LookupSpan,
};

/// Deserializes a string value, using `Default::default()` if the string is
/// empty.
///
/// # Errors
/// Returns an error if the non-empty string does not parse into `T`.
pub fn empty_string_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        Ok(T::default())
    } else {
        T::deserialize(de::value::StrDeserializer::new(&s)).map_err(|e: de::value::Error| {
            de::Error::custom(format!("invalid value, expect empty string, err: {e}"))
        })
    }
}

/// Default directory for log files when file logging is enabled from the CLI.
pub const DEFAULT_LOGGING_DIR: &str = "logs";

/// Fallback filter when neither `LoggingOptions::level` nor `RUST_LOG` is set.
const DEFAULT_LOG_TARGETS: &str = "info";

/// Handle for changing the log filter at runtime.
///
/// Populated by [`init_global_logging`]; `None` before that.
pub static RELOAD_HANDLE: OnceCell<tracing_subscriber::reload::Handle<filter::Targets, Registry>> =
    OnceCell::new();

/// Configuration options for the logging system.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct LoggingOptions {
    /// Directory for hourly-rotated log files. Empty disables file logging.
    #[default = ""]
    #[builder(default, into)]
    pub dir: String,

    /// Filter string such as `"info"` or `"debug,tower_http=info"`. Falls
    /// back to `RUST_LOG`, then `"info"`.
    #[builder(into)]
    pub level: Option<String>,

    /// Text for humans, JSON for log shippers.
    #[serde(default, deserialize_with = "empty_string_as_default")]
    #[builder(default)]
    pub log_format: LogFormat,

    /// Rotated files kept per log kind (720 is 30 days of hourly files).
    #[default = 720]
    #[builder(default = 720)]
    pub max_log_files: usize,

    /// Also write to stdout when file logging is on.
    #[default = true]
    #[builder(default = true)]
    pub append_stdout: bool,
}

/// Available log output formats.
#[derive(
    Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize, Default, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per line, with the current span and span list.
    ///
    /// ```json
    /// {"timestamp":"2024-01-01T12:00:00Z","level":"INFO","target":"parley_app","message":"Server started"}
    /// ```
    Json,

    /// Human-readable lines.
    ///
    /// ```text
    /// 2024-01-01T12:00:00.123Z  INFO parley_app: Server started
    /// ```
    #[default]
    Text,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown log format '{other}', expected text or json")),
        }
    }
}

/// Initialize logging for unit and integration tests.
///
/// Logs go to files under `UNITTEST_LOG_DIR` (default
/// `/tmp/__unittest_logs`) at `UNITTEST_LOG_LEVEL`. Safe to call from every
/// test; only the first call does anything.
pub fn init_default_ut_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let mut g = GLOBAL_UT_LOG_GUARD
            .as_ref()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let dir =
            env::var("UNITTEST_LOG_DIR").unwrap_or_else(|_| "/tmp/__unittest_logs".to_string());

        let level = env::var("UNITTEST_LOG_LEVEL").unwrap_or_else(|_| {
            "debug,hyper=warn,tower=warn,reqwest=warn,h2=info,redb=info".to_string()
        });
        let opts = LoggingOptions {
            dir: dir.clone(),
            level: Some(level),
            ..Default::default()
        };
        *g = Some(init_global_logging("unittest", &opts));

        tracing::info!("logs dir = {}", dir);
    });
}

static GLOBAL_UT_LOG_GUARD: Lazy<Arc<Mutex<Option<Vec<WorkerGuard>>>>> =
    Lazy::new(|| Arc::new(Mutex::new(None)));

/// Initialize the global subscriber.
///
/// Layers:
/// - stdout, when `append_stdout` is set or no `dir` is configured
/// - hourly rolling file `<app_name>.*` under `dir`
/// - hourly rolling error-only file `<app_name>-err.*` under `dir`
///
/// Only the first call has an effect.
///
/// # Panics
/// Panics when the log directory cannot be created, the level string does not
/// parse, or another global subscriber was installed first.
#[must_use]
pub fn init_global_logging(app_name: &str, opts: &LoggingOptions) -> Vec<WorkerGuard> {
    static START: Once = Once::new();
    let mut guards = vec![];

    START.call_once(|| {
        LogTracer::init().expect("log tracer must be valid");

        let stdout_logging_layer = if opts.append_stdout || opts.dir.is_empty() {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            guards.push(guard);
            Some(fmt_layer(
                writer,
                opts.log_format,
                std::io::stdout().is_terminal(),
            ))
        } else {
            None
        };

        let file_logging_layer = if opts.dir.is_empty() {
            None
        } else {
            let (writer, guard) =
                tracing_appender::non_blocking(rolling_appender(opts, app_name.to_string()));
            guards.push(guard);
            Some(fmt_layer(writer, opts.log_format, false))
        };

        let err_file_logging_layer = if opts.dir.is_empty() {
            None
        } else {
            let (writer, guard) =
                tracing_appender::non_blocking(rolling_appender(opts, format!("{app_name}-err")));
            guards.push(guard);
            Some(
                fmt_layer(writer, opts.log_format, false)
                    .with_filter(filter::LevelFilter::ERROR)
                    .boxed(),
            )
        };

        let filter = opts
            .level
            .as_deref()
            .or(env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
            .unwrap_or(DEFAULT_LOG_TARGETS)
            .parse::<filter::Targets>()
            .expect("error parsing log level string");

        let (dyn_filter, reload_handle) = tracing_subscriber::reload::Layer::new(filter);

        RELOAD_HANDLE
            .set(reload_handle)
            .expect("reload handle already set, maybe init_global_logging get called twice?");

        let subscriber = Registry::default()
            .with(dyn_filter)
            .with(stdout_logging_layer)
            .with(file_logging_layer)
            .with(err_file_logging_layer);

        tracing::subscriber::set_global_default(subscriber)
            .expect("error setting global tracing subscriber");
    });

    guards
}

fn rolling_appender(opts: &LoggingOptions, prefix: String) -> RollingFileAppender {
    RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(prefix)
        .max_log_files(opts.max_log_files)
        .build(&opts.dir)
        .unwrap_or_else(|e| {
            panic!(
                "initializing rolling file appender at {} failed: {}",
                &opts.dir, e
            )
        })
}

fn fmt_layer<S, W>(writer: W, format: LogFormat, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::Layer::new()
        .with_writer(writer)
        .with_ansi(ansi);
    match format {
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Text => layer.boxed(),
    }
}
