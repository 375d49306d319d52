use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Success body: the payload under a single `data` key. Failures never use
/// it; they go out as [`AppError`](crate::error::AppError).
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    data: T,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_sits_under_data() {
        let body = serde_json::to_value(Envelope::new(json!({ "is_analyzing": false }))).unwrap();
        assert_eq!(body, json!({ "data": { "is_analyzing": false } }));
    }
}
