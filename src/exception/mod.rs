//! Exceptions raised while processing a request
//!
//! Handlers, extractors and outbound clients raise an [`Exception`]; an
//! [`ExceptionFilter`] turns it into the client-facing response. The default
//! filter is [`http::HttpExceptionFilter`], installed on a router through
//! [`layer::ExceptionLayer`].

use axum::{
    BoxError,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

pub mod http;
pub mod layer;
pub mod report;
pub mod upstream;

/// Default message of an authorization failure
pub const DEFAULT_AUTHORIZATION_MESSAGE: &str = "This action is unauthorized.";

/// Default message of an authentication failure
pub const DEFAULT_AUTHENTICATION_MESSAGE: &str = "Unauthenticated.";

/// Category of an [`Exception`]
///
/// Used as the key of the "do not report" set and as the `kind` field of log
/// records. Displays and parses as snake_case.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ExceptionKind {
    UpstreamCall,
    Http,
    ModelNotFound,
    Validation,
    Authorization,
    Authentication,
    Unexpected,
}

impl ExceptionKind {
    /// Whether the kind has a dedicated translation rule
    pub fn is_classified(self) -> bool {
        !matches!(self, ExceptionKind::Unexpected)
    }
}

/// Field-to-messages mapping produced by a validator
///
/// Fields keep the order in which they were first added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(IndexMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.0.entry(field.into()).or_default().push(message.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl<K, V> FromIterator<(K, Vec<V>)> for ValidationErrors
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Vec<V>)>>(iter: I) -> Self {
        let mut errors = Self::new();
        for (field, messages) in iter {
            let field = field.into();
            let entry = errors.0.entry(field).or_default();
            entry.extend(messages.into_iter().map(Into::into));
        }
        errors
    }
}

/// An error raised into the exception pipeline
#[derive(Debug, Error)]
pub enum Exception {
    /// An outbound call to another HTTP service returned an error status
    #[error("Upstream call failed with status {status}: {body}")]
    UpstreamCall { status: u16, body: String },

    /// Framework-level error carrying an HTTP status
    ///
    /// Raised for unknown routes, wrong methods and rejected extractors.
    #[error("HTTP error {status}{}", detail(.message))]
    Http {
        status: StatusCode,
        message: Option<String>,
        headers: HeaderMap,
    },

    /// A lookup against a named model found nothing
    #[error("No query results for model [{model}]{}", ids_suffix(.ids))]
    ModelNotFound { model: String, ids: Vec<String> },

    #[error("The given data was invalid.")]
    Validation { errors: ValidationErrors },

    #[error("{message}")]
    Authorization { message: String },

    #[error("{message}")]
    Authentication { message: String, guards: Vec<String> },

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

fn detail(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

fn ids_suffix(ids: &[String]) -> String {
    if ids.is_empty() {
        String::new()
    } else {
        format!(" {}", ids.join(", "))
    }
}

impl Exception {
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::UpstreamCall {
            status,
            body: body.into(),
        }
    }

    pub fn http(status: StatusCode) -> Self {
        Self::Http {
            status,
            message: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn not_found() -> Self {
        Self::http(StatusCode::NOT_FOUND)
    }

    /// 405 carrying an `Allow` header listing the accepted methods
    pub fn method_not_allowed(allowed: &[Method]) -> Self {
        let mut exception = Self::http(StatusCode::METHOD_NOT_ALLOWED);
        if !allowed.is_empty() {
            let allow = allowed
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                exception = exception.with_header(header::ALLOW, value);
            }
        }
        exception
    }

    /// Attach an internal detail to an HTTP error
    ///
    /// The detail is logged but never replaces the reason phrase sent to clients.
    pub fn with_message(mut self, detail: impl Into<String>) -> Self {
        if let Self::Http { message, .. } = &mut self {
            *message = Some(detail.into());
        }
        self
    }

    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        if let Self::Http { headers, .. } = &mut self {
            headers.insert(name, value);
        }
        self
    }

    pub fn model_not_found(model: impl Into<String>) -> Self {
        Self::ModelNotFound {
            model: model.into(),
            ids: Vec::new(),
        }
    }

    /// Not-found error naming the Rust type `T` as the model
    pub fn model_not_found_for<T: ?Sized>() -> Self {
        Self::model_not_found(std::any::type_name::<T>())
    }

    pub fn with_ids<I, D>(mut self, lookup: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: fmt::Display,
    {
        if let Self::ModelNotFound { ids, .. } = &mut self {
            ids.extend(lookup.into_iter().map(|id| id.to_string()));
        }
        self
    }

    pub fn validation(errors: impl Into<ValidationErrors>) -> Self {
        Self::Validation {
            errors: errors.into(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    pub fn authorization_denied() -> Self {
        Self::authorization(DEFAULT_AUTHORIZATION_MESSAGE)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            guards: Vec::new(),
        }
    }

    pub fn unauthenticated() -> Self {
        Self::authentication(DEFAULT_AUTHENTICATION_MESSAGE)
    }

    /// Record which guards rejected the request
    pub fn with_guards<I, G>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        if let Self::Authentication { guards, .. } = &mut self {
            guards.extend(names.into_iter().map(Into::into));
        }
        self
    }

    pub fn unexpected(error: impl Into<anyhow::Error>) -> Self {
        Self::Unexpected(error.into())
    }

    pub fn kind(&self) -> ExceptionKind {
        match self {
            Self::UpstreamCall { .. } => ExceptionKind::UpstreamCall,
            Self::Http { .. } => ExceptionKind::Http,
            Self::ModelNotFound { .. } => ExceptionKind::ModelNotFound,
            Self::Validation { .. } => ExceptionKind::Validation,
            Self::Authorization { .. } => ExceptionKind::Authorization,
            Self::Authentication { .. } => ExceptionKind::Authentication,
            Self::Unexpected(_) => ExceptionKind::Unexpected,
        }
    }

    /// Recover an exception from a type-erased service error
    pub fn from_boxed(error: BoxError) -> Self {
        let error = match error.downcast::<Exception>() {
            Ok(exception) => return *exception,
            Err(error) => error,
        };
        let error = match error.downcast::<JsonRejection>() {
            Ok(rejection) => return Self::from(*rejection),
            Err(error) => error,
        };
        let error = match error.downcast::<PathRejection>() {
            Ok(rejection) => return Self::from(*rejection),
            Err(error) => error,
        };
        let error = match error.downcast::<QueryRejection>() {
            Ok(rejection) => return Self::from(*rejection),
            Err(error) => error,
        };
        Self::Unexpected(anyhow::Error::new(Opaque(error)))
    }
}

/// Lowercase base name of a model type
///
/// Strips module paths (`::` or `\`) and generic arguments:
/// `shop::models::Order<Draft>` becomes `order`.
pub fn resource_name(model: &str) -> String {
    let without_generics = match model.find('<') {
        Some(idx) => &model[..idx],
        None => model,
    };
    let base = without_generics
        .rsplit(|c: char| c == ':' || c == '\\')
        .next()
        .unwrap_or(without_generics);
    base.trim().to_lowercase()
}

impl From<ValidationErrors> for Exception {
    fn from(errors: ValidationErrors) -> Self {
        Self::validation(errors)
    }
}

impl From<JsonRejection> for Exception {
    fn from(rejection: JsonRejection) -> Self {
        Self::http(rejection.status()).with_message(rejection.body_text())
    }
}

impl From<PathRejection> for Exception {
    fn from(rejection: PathRejection) -> Self {
        Self::http(rejection.status()).with_message(rejection.body_text())
    }
}

impl From<QueryRejection> for Exception {
    fn from(rejection: QueryRejection) -> Self {
        Self::http(rejection.status()).with_message(rejection.body_text())
    }
}

/// Boxed error kept whole so its source chain survives into `anyhow`
struct Opaque(BoxError);

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for Opaque {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// Method and URI of the request that failed
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
}

impl RequestContext {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self { method, uri }
    }

    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self::new(request.method().clone(), request.uri().clone())
    }
}

/// The ExceptionFilter trait
///
/// Filters handle errors raised during request processing. `report` runs
/// first and may log; `render` must always return a valid response.
pub trait ExceptionFilter: Send + Sync + 'static {
    /// Report or log an exception
    fn report(&self, ctx: &RequestContext, exception: &Exception);

    /// Render an exception into an HTTP response
    fn render(&self, ctx: &RequestContext, exception: &Exception) -> Response;

    fn handle(&self, ctx: &RequestContext, exception: &Exception) -> Response {
        self.report(ctx, exception);
        self.render(ctx, exception)
    }
}

/// Marker left on a response rendered from an [`Exception`]
///
/// [`layer::ExceptionMiddleware`] picks it up to report the exception and
/// re-render it with the configured filter.
#[derive(Clone)]
pub(crate) struct RaisedException(pub(crate) Arc<Exception>);

impl IntoResponse for Exception {
    fn into_response(self) -> Response {
        let exception = Arc::new(self);
        let mut response =
            http::HttpExceptionFilter::default().render(&RequestContext::default(), &exception);
        response
            .extensions_mut()
            .insert(RaisedException(Arc::clone(&exception)));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    struct Order;

    #[test]
    fn test_kind_names() {
        assert_eq!(ExceptionKind::UpstreamCall.to_string(), "upstream_call");
        assert_eq!(
            ExceptionKind::from_str("model_not_found").unwrap(),
            ExceptionKind::ModelNotFound
        );
        assert!(ExceptionKind::from_str("nope").is_err());
        assert_eq!(
            ExceptionKind::iter().filter(|k| k.is_classified()).count(),
            6
        );
    }

    #[test]
    fn test_resource_name() {
        assert_eq!(resource_name("Order"), "order");
        assert_eq!(resource_name("shop::models::OrderLine"), "orderline");
        assert_eq!(resource_name("App\\Models\\Order"), "order");
        assert_eq!(resource_name("shop::Order<shop::Draft>"), "order");
    }

    #[test]
    fn test_model_not_found_for_type() {
        let exception = Exception::model_not_found_for::<Order>().with_ids([42]);
        match &exception {
            Exception::ModelNotFound { model, ids } => {
                assert_eq!(resource_name(model), "order");
                assert_eq!(ids, &vec!["42".to_string()]);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
        assert!(exception.to_string().ends_with("Order] 42"));
    }

    #[test]
    fn test_default_auth_messages() {
        assert_eq!(
            Exception::authorization_denied().to_string(),
            "This action is unauthorized."
        );
        assert_eq!(Exception::unauthenticated().to_string(), "Unauthenticated.");
    }

    #[test]
    fn test_builders_ignore_other_variants() {
        let exception = Exception::authorization("nope").with_ids([1]).with_message("x");
        assert_eq!(exception.kind(), ExceptionKind::Authorization);
        assert_eq!(exception.to_string(), "nope");
    }

    #[test]
    fn test_method_not_allowed_sets_allow() {
        let exception = Exception::method_not_allowed(&[Method::GET, Method::POST]);
        match exception {
            Exception::Http { status, headers, .. } => {
                assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
                assert_eq!(headers.get(header::ALLOW).unwrap(), "GET, POST");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_validation_errors_merge_fields() {
        let errors: ValidationErrors = vec![
            ("email", vec!["required"]),
            ("name", vec!["too short"]),
            ("email", vec!["invalid"]),
        ]
        .into_iter()
        .collect();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.get("email").unwrap(),
            &["required".to_string(), "invalid".to_string()]
        );
        assert_eq!(
            errors.iter().map(|(f, _)| f).collect::<Vec<_>>(),
            vec!["email", "name"]
        );
    }

    #[test]
    fn test_from_boxed_recovers_exception() {
        let boxed: BoxError = Box::new(Exception::model_not_found("Order"));
        assert_eq!(
            Exception::from_boxed(boxed).kind(),
            ExceptionKind::ModelNotFound
        );
    }

    #[test]
    fn test_from_boxed_wraps_unknown_errors() {
        let boxed: BoxError = Box::new(std::io::Error::other("disk on fire"));
        let exception = Exception::from_boxed(boxed);
        assert_eq!(exception.kind(), ExceptionKind::Unexpected);
        assert_eq!(exception.to_string(), "disk on fire");
    }

    #[test]
    fn test_anyhow_converts_with_question_mark() {
        fn load() -> Result<(), Exception> {
            let lookup: Result<(), anyhow::Error> = Err(anyhow::anyhow!("connection reset"));
            lookup?;
            Ok(())
        }
        assert_eq!(load().unwrap_err().kind(), ExceptionKind::Unexpected);
    }
}
