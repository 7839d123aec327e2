//! Shared layer for the device backend lambdas: the API Gateway envelope,
//! response formatting, environment configuration and small helpers that
//! every function in the workspace needs.

pub mod config;
pub mod event;
pub mod response;
pub mod retry;

use chrono::{SecondsFormat, Utc};
use tracing_subscriber::EnvFilter;

pub use config::{dynamodb_client, resolve_table_name, Settings};
pub use event::{ApiEvent, Authorizer, RequestContext};
pub use response::{default_headers, error_response, format_response, handle_error, ApiResponse, Headers};
pub use retry::{retry_with_backoff, Backoff};

/// Installs the JSON tracing subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .init();
}

/// Current UTC time in RFC 3339 with microseconds and an explicit `+00:00` offset.
pub fn current_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
