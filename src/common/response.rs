use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::exception::ValidationErrors;

/// Payload of the `message` field of an [`ErrorEnvelope`]
///
/// Most errors carry a single human-readable string. Validation failures carry
/// the full field-to-messages mapping instead, serialized as a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Text(String),
    Fields(ValidationErrors),
}

impl From<&str> for ErrorMessage {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ErrorMessage {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<ValidationErrors> for ErrorMessage {
    fn from(value: ValidationErrors) -> Self {
        Self::Fields(value)
    }
}

/// Uniform error body returned for every classified error
///
/// ```json
/// { "message": "Not Found", "status": 404 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEnvelope {
    pub message: ErrorMessage,
    pub status: u16,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<ErrorMessage>, status: StatusCode) -> Self {
        Self {
            message: message.into(),
            status: status.as_u16(),
        }
    }

    /// The HTTP status this envelope is sent with
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ErrorEnvelope {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

/// Shared formatter for error responses
///
/// Every error path in the crate ends here, so the envelope shape stays the
/// same regardless of which kind of error produced it.
pub fn error_response(message: impl Into<ErrorMessage>, status: StatusCode) -> Response {
    ErrorEnvelope::new(message, status).into_response()
}

/// Success wrapper matching the error envelope style
///
/// # Example
/// ```
/// use errata::common::response::ApiResponse;
/// use axum::http::StatusCode;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Order {
///     id: u64,
/// }
///
/// async fn create_order() -> ApiResponse<Order> {
///     ApiResponse::with_status(Order { id: 7 }, StatusCode::CREATED)
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,

    #[serde(skip)]
    pub http_status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful response with data
    ///
    /// Defaults to HTTP 200 OK.
    pub fn success(data: T) -> Self {
        Self::with_status(data, StatusCode::OK)
    }

    pub fn with_status(data: T, http_status: StatusCode) -> Self {
        Self { data, http_status }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.http_status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::{Value, json};

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_response_text() {
        let response = error_response("Forbidden", StatusCode::FORBIDDEN);
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(response).await,
            json!({ "message": "Forbidden", "status": 403 })
        );
    }

    #[tokio::test]
    async fn test_error_response_fields_keep_order() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "The name field is required.");
        errors.add("email", "The email field is required.");
        errors.add("email", "The email must be a valid email address.");

        let response = error_response(errors, StatusCode::UNPROCESSABLE_ENTITY);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        let expected = concat!(
            r#"{"message":{"name":["The name field is required."],"#,
            r#""email":["The email field is required.","#,
            r#""The email must be a valid email address."]},"status":422}"#,
        );
        assert_eq!(text, expected);
    }

    #[tokio::test]
    async fn test_api_response_success() {
        let response =
            ApiResponse::with_status(json!({ "id": 1 }), StatusCode::CREATED).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await, json!({ "data": { "id": 1 } }));
    }
}
