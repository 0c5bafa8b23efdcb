//! Stable service handlers
//!
//! User-supplied values are echoed verbatim; nothing is HTML-escaped.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use serde::Serialize;

use super::form::{FormError, FormFields};
use super::templates::{TemplateStore, FORM_TEMPLATE};
use crate::http;
use crate::logger;
use crate::routing::PathParams;

pub const HOME_MESSAGE: &str = "This is the stable version";

/// Body of `GET /api/data`; field order is the wire order
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ApiData {
    pub message: &'static str,
    pub status: &'static str,
}

pub const API_DATA: ApiData = ApiData {
    message: "Hello, this is the stable version of the API!",
    status: "success",
};

/// `GET /`
pub fn home() -> Response<Full<Bytes>> {
    http::build_text_response(HOME_MESSAGE.to_string())
}

/// `GET /api/data`
pub fn api_data() -> Response<Full<Bytes>> {
    http::build_json_response(&API_DATA)
}

/// `GET /submit`
pub fn show_form(templates: &TemplateStore) -> Response<Full<Bytes>> {
    match templates.render(FORM_TEMPLATE) {
        Ok(html) => http::build_html_response(html),
        Err(e) => {
            logger::log_error(&format!("Failed to render {FORM_TEMPLATE}: {e}"));
            http::build_500_response()
        }
    }
}

/// `POST /submit`
pub fn submit_form(form: Result<FormFields, FormError>) -> Response<Full<Bytes>> {
    let name = form.and_then(|fields| fields.require("name").map(str::to_owned));
    match name {
        Ok(name) => http::build_text_response(submission_message(&name)),
        Err(e) => {
            logger::log_warning(&format!("Rejected form submission: {e}"));
            e.into_response()
        }
    }
}

/// `GET /profile/<username>`
pub fn profile(params: &PathParams) -> Response<Full<Bytes>> {
    // the route pattern guarantees the parameter
    let username = params.get("username").unwrap_or_default();
    http::build_text_response(profile_message(username))
}

pub fn submission_message(name: &str) -> String {
    format!("Form submitted! Hello, {name}!")
}

pub fn profile_message(username: &str) -> String {
    format!("Welcome to {username}'s profile!")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::form::parse_form;

    #[test]
    fn test_api_data_wire_format() {
        assert_eq!(
            serde_json::to_string(&API_DATA).unwrap(),
            r#"{"message":"Hello, this is the stable version of the API!","status":"success"}"#
        );
    }

    #[test]
    fn test_messages_echo_verbatim() {
        assert_eq!(
            submission_message("<script>alert(1)</script>"),
            "Form submitted! Hello, <script>alert(1)</script>!"
        );
        assert_eq!(profile_message("o'neil"), "Welcome to o'neil's profile!");
    }

    #[test]
    fn test_submit_form_statuses() {
        let ok = submit_form(parse_form(
            Some("application/x-www-form-urlencoded"),
            b"name=Bob",
        ));
        assert_eq!(ok.status(), 200);

        let missing = submit_form(Ok(FormFields::default()));
        assert_eq!(missing.status(), 400);

        let too_large = submit_form(Err(FormError::TooLarge));
        assert_eq!(too_large.status(), 413);
    }

    #[test]
    fn test_show_form_without_template_is_500() {
        let store = TemplateStore::from_sources(Vec::new()).unwrap();
        assert_eq!(show_form(&store).status(), 500);
    }
}
