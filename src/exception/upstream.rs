//! Failures of outbound calls to other HTTP services

use crate::exception::Exception;
use async_trait::async_trait;

/// Turn an upstream error status into [`Exception::UpstreamCall`]
///
/// # Example
/// ```rust,ignore
/// use errata::exception::upstream::UpstreamResponseExt;
///
/// async fn stock(client: &reqwest::Client) -> Result<String, Exception> {
///     let response = client
///         .get("http://inventory/stock/42")
///         .send()
///         .await?
///         .error_for_upstream()
///         .await?;
///     Ok(response.text().await?)
/// }
/// ```
#[async_trait]
pub trait UpstreamResponseExt: Sized {
    /// Pass success statuses through; read the body of a 4xx/5xx and fail with it
    async fn error_for_upstream(self) -> Result<Self, Exception>;
}

#[async_trait]
impl UpstreamResponseExt for reqwest::Response {
    async fn error_for_upstream(self) -> Result<Self, Exception> {
        let status = self.status();
        if !(status.is_client_error() || status.is_server_error()) {
            return Ok(self);
        }

        let body = match self.text().await {
            Ok(body) => body,
            Err(err) => {
                tracing::debug!(error = %err, %status, "upstream error body unreadable");
                String::new()
            }
        };
        Err(Exception::upstream(status.as_u16(), body))
    }
}

/// Transport and decoding failures are unexpected errors
///
/// `reqwest::Error` only carries a status when it came from
/// `error_for_status`, and its text includes the request URL. Use
/// [`UpstreamResponseExt::error_for_upstream`] to keep the upstream status
/// and body; errors reaching this conversion stay internal.
impl From<reqwest::Error> for Exception {
    fn from(err: reqwest::Error) -> Self {
        Exception::Unexpected(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::http::{HttpExceptionFilter, UNEXPECTED_MESSAGE};
    use crate::exception::{ExceptionFilter, ExceptionKind, RequestContext};
    use axum::http::{Method, Uri};

    fn upstream_response(status: u16, body: &str) -> reqwest::Response {
        axum::http::Response::builder()
            .status(status)
            .body(body.to_string())
            .unwrap()
            .into()
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let response = upstream_response(200, "{\"stock\": 3}")
            .error_for_upstream()
            .await
            .unwrap();
        assert_eq!(response.text().await.unwrap(), "{\"stock\": 3}");
    }

    #[tokio::test]
    async fn test_server_error_keeps_body_verbatim() {
        let exception = upstream_response(503, "service unavailable")
            .error_for_upstream()
            .await
            .unwrap_err();
        match exception {
            Exception::UpstreamCall { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "service unavailable");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_error_is_upstream_failure() {
        let exception = upstream_response(404, "{\"error\":\"no such sku\"}")
            .error_for_upstream()
            .await
            .unwrap_err();
        assert_eq!(exception.kind(), ExceptionKind::UpstreamCall);
    }

    #[tokio::test]
    async fn test_reqwest_errors_do_not_leak_the_url() {
        let response: reqwest::Response = axum::http::Response::builder()
            .status(502)
            .body(String::new())
            .unwrap()
            .into();
        let err = response.error_for_status().unwrap_err();
        assert!(err.to_string().contains("http://"));

        let exception = Exception::from(err);
        assert_eq!(exception.kind(), ExceptionKind::Unexpected);

        let ctx = RequestContext::new(Method::GET, Uri::from_static("/stock/42"));
        let response = HttpExceptionFilter::default().render(&ctx, &exception);
        assert_eq!(response.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], UNEXPECTED_MESSAGE);
        assert!(!String::from_utf8_lossy(&bytes).contains("http://"));
    }
}
