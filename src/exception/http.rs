use crate::common::response::{ErrorEnvelope, error_response};
use crate::common::status::reason_phrase_or_unknown;
use crate::config::TranslatorConfig;
use crate::exception::report::{Reporter, TracingReporter};
use crate::exception::{Exception, ExceptionFilter, RequestContext, resource_name};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::backtrace::BacktraceStatus;
use std::sync::Arc;

/// Message sent for unexpected errors outside debug mode
pub const UNEXPECTED_MESSAGE: &str = "Unexpected error. Try again later.";

/// Verbose rendering of an unexpected error, only produced in debug mode
#[derive(Debug, Serialize)]
pub struct DebugReport {
    pub message: String,
    pub exception: &'static str,
    pub status: u16,
    pub method: String,
    pub uri: String,
    /// Display of the error followed by each of its sources
    pub chain: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backtrace: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl DebugReport {
    fn new(ctx: &RequestContext, exception: &Exception) -> Self {
        let (chain, backtrace) = match exception {
            Exception::Unexpected(err) => {
                let backtrace = err.backtrace();
                let backtrace = (backtrace.status() == BacktraceStatus::Captured)
                    .then(|| backtrace.to_string());
                (err.chain().map(|e| e.to_string()).collect(), backtrace)
            }
            other => (vec![other.to_string()], None),
        };

        Self {
            message: exception.to_string(),
            exception: exception.kind().into(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            method: ctx.method.to_string(),
            uri: ctx.uri.to_string(),
            chain,
            backtrace,
            timestamp: Utc::now(),
        }
    }
}

impl IntoResponse for DebugReport {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

/// Outcome of classifying an exception
#[derive(Debug)]
pub enum Classified {
    Envelope(ErrorEnvelope),
    Verbose(DebugReport),
}

/// Default exception filter: translates every [`Exception`] into the JSON
/// error envelope.
///
/// | Kind | Status | Message |
/// |---|---|---|
/// | upstream call | upstream's code | upstream body, verbatim |
/// | http | error's code | reason phrase or `Unknown HTTP Error` |
/// | model not found | 404 | `Does not exist any instance of {model} with the given ID` |
/// | validation | 422 | field → messages mapping |
/// | authorization | 403 | error's message |
/// | authentication | 401 | error's message |
/// | unexpected | 500 | generic message, or a [`DebugReport`] in debug mode |
#[derive(Clone)]
pub struct HttpExceptionFilter {
    config: TranslatorConfig,
    reporter: Arc<dyn Reporter>,
}

impl Default for HttpExceptionFilter {
    fn default() -> Self {
        Self::new(TranslatorConfig::default())
    }
}

impl HttpExceptionFilter {
    pub fn new(config: TranslatorConfig) -> Self {
        Self {
            config,
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: impl Reporter) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Map an exception to its envelope, or to a verbose report in debug mode
    pub fn classify(&self, ctx: &RequestContext, exception: &Exception) -> Classified {
        let envelope = match exception {
            Exception::UpstreamCall { status, body } => match StatusCode::from_u16(*status) {
                Ok(status) => ErrorEnvelope::new(body.as_str(), status),
                // Not sendable on the wire; keep the body, drop the code.
                Err(_) => ErrorEnvelope::new(body.as_str(), StatusCode::INTERNAL_SERVER_ERROR),
            },
            Exception::Http { status, .. } => {
                ErrorEnvelope::new(reason_phrase_or_unknown(*status), *status)
            }
            Exception::ModelNotFound { model, .. } => ErrorEnvelope::new(
                format!(
                    "Does not exist any instance of {} with the given ID",
                    resource_name(model)
                ),
                StatusCode::NOT_FOUND,
            ),
            Exception::Validation { errors } => {
                ErrorEnvelope::new(errors.clone(), StatusCode::UNPROCESSABLE_ENTITY)
            }
            Exception::Authorization { message } => {
                ErrorEnvelope::new(message.as_str(), StatusCode::FORBIDDEN)
            }
            Exception::Authentication { message, .. } => {
                ErrorEnvelope::new(message.as_str(), StatusCode::UNAUTHORIZED)
            }
            Exception::Unexpected(_) if self.config.debug => {
                return Classified::Verbose(DebugReport::new(ctx, exception));
            }
            Exception::Unexpected(_) => {
                ErrorEnvelope::new(UNEXPECTED_MESSAGE, StatusCode::INTERNAL_SERVER_ERROR)
            }
        };
        Classified::Envelope(envelope)
    }
}

impl ExceptionFilter for HttpExceptionFilter {
    fn report(&self, ctx: &RequestContext, exception: &Exception) {
        if self.config.should_report(exception.kind()) {
            self.reporter.report(ctx, exception);
        }
    }

    fn render(&self, ctx: &RequestContext, exception: &Exception) -> Response {
        match self.classify(ctx, exception) {
            Classified::Envelope(envelope) => {
                let status = envelope.status_code();
                let mut response = error_response(envelope.message, status);
                if let Exception::Http { headers, .. } = exception {
                    response
                        .headers_mut()
                        .extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                response
            }
            Classified::Verbose(report) => report.into_response(),
        }
    }
}
