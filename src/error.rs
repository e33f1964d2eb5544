use thiserror::Error;

pub type Result<T> = std::result::Result<T, ErrataError>;

#[derive(Debug, Error)]
pub enum ErrataError {
    #[error("Invalid configuration for {key}: {message}")]
    InvalidConfig { key: String, message: String },
}

impl ErrataError {
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl axum::response::IntoResponse for ErrataError {
    fn into_response(self) -> axum::response::Response {
        // Crate errors never reach clients verbatim.
        tracing::error!(error = %self, "errata internal failure");
        crate::common::response::error_response(
            crate::exception::http::UNEXPECTED_MESSAGE,
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn test_internal_errors_render_generic_envelope() {
        let response =
            ErrataError::invalid_config("APP_DEBUG", "expected a boolean").into_response();
        assert_eq!(response.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Unexpected error. Try again later.");
    }
}
