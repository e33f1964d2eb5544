use axum::http::StatusCode;

/// Message used when a status code has no registered reason phrase
pub const UNKNOWN_HTTP_ERROR: &str = "Unknown HTTP Error";

/// Standard reason phrase for a status code, if one is registered
pub fn reason_phrase(status: StatusCode) -> Option<&'static str> {
    status.canonical_reason()
}

/// Reason phrase, falling back to [`UNKNOWN_HTTP_ERROR`]
pub fn reason_phrase_or_unknown(status: StatusCode) -> &'static str {
    reason_phrase(status).unwrap_or(UNKNOWN_HTTP_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_phrases() {
        assert_eq!(reason_phrase(StatusCode::NOT_FOUND), Some("Not Found"));
        assert_eq!(
            reason_phrase(StatusCode::METHOD_NOT_ALLOWED),
            Some("Method Not Allowed")
        );
        assert_eq!(
            reason_phrase(StatusCode::TOO_MANY_REQUESTS),
            Some("Too Many Requests")
        );
    }

    #[test]
    fn test_unregistered_code_falls_back() {
        let status = StatusCode::from_u16(499).unwrap();
        assert_eq!(reason_phrase(status), None);
        assert_eq!(reason_phrase_or_unknown(status), "Unknown HTTP Error");
    }
}
