//! # Errata
//!
//! Centralized error-to-response translation for axum APIs.
//!
//! Every error raised while handling a request, whether it comes from routing,
//! an extractor, a model lookup, a validator, an auth check or an outbound HTTP
//! call, leaves the server as the same JSON envelope:
//!
//! ```json
//! { "message": "Does not exist any instance of order with the given ID", "status": 404 }
//! ```
//!
//! ## Features
//!
//! - **One sum type**: handlers return `Result<T, Exception>` and use `?`
//! - **One dispatch table**: [`HttpExceptionFilter`] maps each kind to its status and message
//! - **Quiet by default**: only unexpected errors reach the reporter
//! - **Debug mode**: `APP_DEBUG=true` renders unexpected errors with their full chain
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use errata::prelude::*;
//!
//! struct Order;
//!
//! async fn show_order(Path(id): Path<u64>) -> Result<Json<serde_json::Value>, Exception> {
//!     Err(Exception::model_not_found_for::<Order>().with_ids([id]))
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = TranslatorConfig::from_env()?;
//!     let router = Router::new().route("/orders/{id}", axum::routing::get(show_order));
//!     let app = ExceptionLayer::new(HttpExceptionFilter::new(config)).attach(router);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod common;
pub mod config;
pub mod error;
pub mod exception;

// Re-export core types
pub use common::{ApiResponse, ErrorEnvelope, ErrorMessage, error_response};
pub use config::{ConfigService, TranslatorConfig};
pub use error::{ErrataError, Result};
pub use exception::http::HttpExceptionFilter;
pub use exception::layer::ExceptionLayer;
pub use exception::{Exception, ExceptionFilter, ExceptionKind, RequestContext, ValidationErrors};

// Re-export commonly used types from dependencies
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use errata::prelude::*;
/// ```
pub mod prelude {
    pub use crate::common::{ApiResponse, ErrorEnvelope, error_response};
    pub use crate::config::{ConfigService, TranslatorConfig};
    pub use crate::exception::http::HttpExceptionFilter;
    pub use crate::exception::layer::ExceptionLayer;
    pub use crate::exception::report::{Reporter, TracingReporter};
    pub use crate::exception::upstream::UpstreamResponseExt;
    pub use crate::exception::{
        Exception, ExceptionFilter, ExceptionKind, RequestContext, ValidationErrors,
    };
    pub use axum::{
        Json, Router,
        extract::{Path, Query, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    };
}
