//! Canary service handlers

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;

use crate::http;

pub const HOME_MESSAGE: &str = "This is the canary version";

/// `GET /`
pub fn home() -> Response<Full<Bytes>> {
    http::build_text_response(HOME_MESSAGE.to_string())
}
