//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: route resolution, dispatch to the
//! variant's handlers and access logging.

use crate::config::AppState;
use crate::handler::{canary, form, stable};
use crate::http;
use crate::logger::{self, AccessLogEntry};
use crate::routing::{Endpoint, PathParams, RouteMatch};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderName, CONTENT_LENGTH, CONTENT_TYPE, REFERER, USER_AGENT};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// Main entry point for HTTP request handling
///
/// Generic over the body so tests can drive it with in-memory bodies.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let is_head = req.method() == Method::HEAD;

    let access_entry = state
        .cached_access_log
        .load(Ordering::Relaxed)
        .then(|| start_access_entry(&req, remote_addr));

    // 1. Resolve and dispatch
    let mut response = route_request(req, &state).await;

    // 2. HEAD keeps headers only
    if is_head {
        response = http::strip_body(response);
    }
    http::apply_common_headers(
        &mut response,
        &state.config.http.server_name,
        state.config.http.enable_cors,
    );

    if let Some(mut entry) = access_entry {
        entry.status = response.status().as_u16();
        entry.body_bytes = if is_head {
            0
        } else {
            http::content_length(&response)
        };
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

fn start_access_entry<B>(req: &Request<B>, remote_addr: SocketAddr) -> AccessLogEntry {
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        remote_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = format!("{:?}", req.version())
        .trim_start_matches("HTTP/")
        .to_string();
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry
}

/// Validate Content-Length header and return 413 if exceeded
///
/// Only endpoints that read the body call this.
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get(CONTENT_LENGTH)?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_warning(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

/// Route request based on the variant's route table
async fn route_request<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match state.routes.resolve(req.method(), req.uri().path()) {
        RouteMatch::Found { endpoint, params } => dispatch(endpoint, &params, req, state).await,
        RouteMatch::Options { allow } => http::build_options_response(&allow),
        RouteMatch::MethodNotAllowed { allow } => {
            logger::log_debug(&format!(
                "Method not allowed: {} {}",
                req.method(),
                req.uri().path()
            ));
            http::build_405_response(&allow)
        }
        RouteMatch::NotFound => http::build_404_response(),
    }
}

/// Dispatch to specific endpoint handler
async fn dispatch<B>(
    endpoint: Endpoint,
    params: &PathParams,
    req: Request<B>,
    state: &AppState,
) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match endpoint {
        Endpoint::CanaryHome => canary::home(),
        Endpoint::StableHome => stable::home(),
        Endpoint::ApiData => stable::api_data(),
        Endpoint::Profile => stable::profile(params),
        Endpoint::SubmitForm if req.method() == Method::POST => {
            if let Some(resp) = check_body_size(&req, state.config.http.max_body_size) {
                return resp;
            }
            let content_type = req
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            let fields = form::read_body(req.into_body(), state.config.http.max_body_size)
                .await
                .and_then(|body| form::parse_form(content_type.as_deref(), &body));
            stable::submit_form(fields)
        }
        Endpoint::SubmitForm => stable::show_form(&state.templates),
    }
}
