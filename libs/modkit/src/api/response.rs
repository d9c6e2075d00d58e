use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// 200 OK + JSON
pub fn ok_json<T: serde::Serialize>(value: T) -> Response {
    (StatusCode::OK, Json(value)).into_response()
}

/// 201 Created + JSON
pub fn created_json<T: serde::Serialize>(value: T) -> Response {
    (StatusCode::CREATED, Json(value)).into_response()
}

/// 204 No Content
pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
