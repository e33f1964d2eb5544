use crate::exception::http::HttpExceptionFilter;
use crate::exception::{Exception, ExceptionFilter, RaisedException, RequestContext};
use axum::{
    BoxError, Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower Layer routing every raised [`Exception`] through one filter
///
/// Responses carrying an exception are reported and re-rendered by the
/// filter; errors returned by the inner service are recovered with
/// [`Exception::from_boxed`] and handled the same way. Any other 4xx/5xx
/// response without a JSON body (a bare extractor rejection, for example)
/// is replaced by an [`Exception::Http`] with the same status.
#[derive(Clone)]
pub struct ExceptionLayer {
    filter: Arc<dyn ExceptionFilter>,
}

impl Default for ExceptionLayer {
    fn default() -> Self {
        Self::new(HttpExceptionFilter::default())
    }
}

impl ExceptionLayer {
    pub fn new(filter: impl ExceptionFilter) -> Self {
        Self {
            filter: Arc::new(filter),
        }
    }

    /// Install the layer on a router
    ///
    /// Unknown paths raise a 404 and known paths hit with the wrong method
    /// raise a 405, so routing errors share the envelope with everything else.
    pub fn attach<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router
            .fallback(route_not_found)
            .method_not_allowed_fallback(method_not_allowed)
            .layer(self)
    }
}

async fn route_not_found() -> Exception {
    Exception::http(StatusCode::NOT_FOUND)
}

async fn method_not_allowed() -> Exception {
    Exception::http(StatusCode::METHOD_NOT_ALLOWED)
}

impl<S> Layer<S> for ExceptionLayer {
    type Service = ExceptionMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ExceptionMiddleware {
            inner,
            filter: self.filter.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ExceptionMiddleware<S> {
    inner: S,
    filter: Arc<dyn ExceptionFilter>,
}

impl<S> Service<Request<Body>> for ExceptionMiddleware<S>
where
    S: Service<Request<Body>> + Clone + Send + 'static,
    S::Response: IntoResponse,
    S::Future: Send + 'static,
    S::Error: Into<BoxError> + Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let filter = self.filter.clone();
        let ctx = RequestContext::from_request(&request);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = match inner.call(request).await {
                Ok(response) => response.into_response(),
                Err(err) => {
                    let exception = Exception::from_boxed(err.into());
                    tracing::debug!(kind = %exception.kind(), "service error intercepted");
                    return Ok(filter.handle(&ctx, &exception));
                }
            };

            let exception = match response.extensions_mut().remove::<RaisedException>() {
                Some(RaisedException(exception)) => {
                    tracing::debug!(kind = %exception.kind(), "exception intercepted");
                    exception
                }
                None if is_bare_error(&response) => {
                    tracing::debug!(status = %response.status(), "bare error response intercepted");
                    Arc::new(Exception::http(response.status()))
                }
                None => return Ok(response),
            };

            let allow = response.headers_mut().remove(header::ALLOW);
            let mut rendered = filter.handle(&ctx, &exception);
            if let Some(allow) = allow {
                rendered.headers_mut().entry(header::ALLOW).or_insert(allow);
            }
            Ok(rendered)
        })
    }
}

/// An error status whose body was not produced as JSON by the application
fn is_bare_error(response: &Response) -> bool {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return false;
    }
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            let mime = value.split(';').next().unwrap_or_default().trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
        .unwrap_or(false);
    !is_json
}
