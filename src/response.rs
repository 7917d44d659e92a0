//! JSON error-response helpers.
//!
//! Every error surface of the API is a status code plus `{"error": "..."}`.

use axum::Json;
use axum::http::StatusCode;
use serde_json::{Value, json};

fn error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message.into() })))
}

pub fn bad_request(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    error(StatusCode::BAD_REQUEST, message)
}

pub fn unauthorized() -> (StatusCode, Json<Value>) {
    error(StatusCode::UNAUTHORIZED, "Unauthorized")
}

pub fn not_found(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    error(StatusCode::NOT_FOUND, message)
}

pub fn service_unavailable(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    error(StatusCode::SERVICE_UNAVAILABLE, message)
}

pub fn internal_error(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    error(StatusCode::INTERNAL_SERVER_ERROR, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_map_to_expected_status_codes() {
        assert_eq!(bad_request("x").0, StatusCode::BAD_REQUEST);
        assert_eq!(unauthorized().0, StatusCode::UNAUTHORIZED);
        assert_eq!(not_found("x").0, StatusCode::NOT_FOUND);
        assert_eq!(service_unavailable("x").0, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(internal_error("x").0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn body_carries_the_message() {
        let (_, Json(body)) = not_found("Number is not on WhatsApp");
        assert_eq!(body["error"], "Number is not on WhatsApp");
    }
}
