use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// `302 Found` pointing at `location`.
///
/// `axum::response::Redirect` only offers 303/307/308; post-then-redirect
/// handlers here answer with a plain 302.
pub fn found(location: impl AsRef<str>) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location.as_ref().to_string())],
    )
        .into_response()
}
