//! Form body extraction module
//!
//! Reads a request body under a size limit and decodes
//! `application/x-www-form-urlencoded` or `multipart/form-data` fields.

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::Response;
use std::fmt;

use crate::http;

/// Form extraction failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    /// The required field is not in the form
    MissingField(String),
    /// Body is not a form (missing or other content type)
    UnsupportedContentType(Option<String>),
    MalformedMultipart(&'static str),
    /// Transport error while reading the body
    BodyRead(String),
    /// Body exceeded the configured limit
    TooLarge,
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(name) => write!(f, "missing form field '{name}'"),
            Self::UnsupportedContentType(Some(ct)) => {
                write!(f, "unsupported form content type '{ct}'")
            }
            Self::UnsupportedContentType(None) => write!(f, "missing form content type"),
            Self::MalformedMultipart(reason) => write!(f, "malformed multipart body: {reason}"),
            Self::BodyRead(e) => write!(f, "failed to read request body: {e}"),
            Self::TooLarge => write!(f, "request body too large"),
        }
    }
}

impl std::error::Error for FormError {}

impl FormError {
    /// Client error response for this failure
    pub fn into_response(self) -> Response<Full<Bytes>> {
        match self {
            Self::TooLarge => http::build_413_response(),
            _ => http::build_400_response(),
        }
    }
}

/// Decoded form fields in body order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    /// First value submitted under `name`
    pub fn first(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn require(&self, name: &str) -> Result<&str, FormError> {
        self.first(name)
            .ok_or_else(|| FormError::MissingField(name.to_string()))
    }
}

/// Collect a request body, failing with `TooLarge` past `limit` bytes
pub async fn read_body<B>(body: B, limit: u64) -> Result<Bytes, FormError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(FormError::TooLarge),
        Err(e) => Err(FormError::BodyRead(e.to_string())),
    }
}

/// Decode a form body according to its `Content-Type`
pub fn parse_form(content_type: Option<&str>, body: &[u8]) -> Result<FormFields, FormError> {
    let Some(content_type) = content_type else {
        return Err(FormError::UnsupportedContentType(None));
    };

    let mut parts = content_type.split(';');
    let mime = parts.next().unwrap_or_default().trim().to_ascii_lowercase();

    match mime.as_str() {
        "application/x-www-form-urlencoded" => Ok(parse_urlencoded(body)),
        "multipart/form-data" => {
            let boundary = parts
                .filter_map(|param| param.split_once('='))
                .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
                .map(|(_, value)| unquote(value.trim()))
                .filter(|b| !b.is_empty())
                .ok_or(FormError::MalformedMultipart("missing boundary"))?;
            parse_multipart(body, boundary)
        }
        _ => Err(FormError::UnsupportedContentType(Some(
            content_type.to_string(),
        ))),
    }
}

fn parse_urlencoded(body: &[u8]) -> FormFields {
    FormFields(
        url::form_urlencoded::parse(body)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect(),
    )
}

fn parse_multipart(body: &[u8], boundary: &str) -> Result<FormFields, FormError> {
    let delimiter = format!("--{boundary}");
    let next_delimiter = format!("\r\n--{boundary}");

    let start = find(body, delimiter.as_bytes(), 0)
        .ok_or(FormError::MalformedMultipart("boundary not found"))?;
    let mut pos = start + delimiter.len();
    let mut fields = Vec::new();

    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            break;
        }
        pos += if rest.starts_with(b"\r\n") {
            2
        } else if rest.starts_with(b"\n") {
            1
        } else {
            return Err(FormError::MalformedMultipart("bad delimiter line"));
        };

        let end = find(body, next_delimiter.as_bytes(), pos)
            .ok_or(FormError::MalformedMultipart("missing closing boundary"))?;
        if let Some(field) = parse_part(&body[pos..end])? {
            fields.push(field);
        }
        pos = end + next_delimiter.len();
    }

    Ok(FormFields(fields))
}

/// Parse one part; file uploads are not form fields and yield `None`
fn parse_part(part: &[u8]) -> Result<Option<(String, String)>, FormError> {
    let header_end = find(part, b"\r\n\r\n", 0)
        .ok_or(FormError::MalformedMultipart("part without header terminator"))?;
    let headers = String::from_utf8_lossy(&part[..header_end]);
    let value = &part[header_end + 4..];

    let disposition = headers
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-disposition"))
        .map(|(_, value)| value.trim())
        .ok_or(FormError::MalformedMultipart("part without content-disposition"))?;

    let mut name = None;
    for param in disposition.split(';').skip(1) {
        let Some((key, val)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "name" => name = Some(unquote(val.trim()).to_string()),
            "filename" => return Ok(None),
            _ => {}
        }
    }

    let name = name.ok_or(FormError::MalformedMultipart("part without name"))?;
    Ok(Some((name, String::from_utf8_lossy(value).into_owned())))
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| i + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URLENCODED: &str = "application/x-www-form-urlencoded";

    #[test]
    fn test_urlencoded_decoding() {
        let fields = parse_form(Some(URLENCODED), b"name=Ada+Lovelace&city=S%C3%A3o%20Paulo").unwrap();
        assert_eq!(fields.first("name"), Some("Ada Lovelace"));
        assert_eq!(fields.first("city"), Some("São Paulo"));
    }

    #[test]
    fn test_urlencoded_first_value_wins() {
        let fields = parse_form(Some(URLENCODED), b"name=first&name=second").unwrap();
        assert_eq!(fields.first("name"), Some("first"));
    }

    #[test]
    fn test_urlencoded_empty_value_is_present() {
        let fields = parse_form(Some(URLENCODED), b"name=").unwrap();
        assert_eq!(fields.require("name"), Ok(""));
    }

    #[test]
    fn test_content_type_parameters_ignored() {
        let fields =
            parse_form(Some("Application/X-WWW-Form-Urlencoded; charset=UTF-8"), b"name=x").unwrap();
        assert_eq!(fields.first("name"), Some("x"));
    }

    #[test]
    fn test_missing_field() {
        let fields = parse_form(Some(URLENCODED), b"other=1").unwrap();
        assert_eq!(
            fields.require("name"),
            Err(FormError::MissingField("name".to_string()))
        );
    }

    #[test]
    fn test_unsupported_content_types() {
        assert_eq!(
            parse_form(None, b"name=x"),
            Err(FormError::UnsupportedContentType(None))
        );
        assert_eq!(
            parse_form(Some("application/json"), br#"{"name":"x"}"#),
            Err(FormError::UnsupportedContentType(Some(
                "application/json".to_string()
            )))
        );
    }

    #[test]
    fn test_multipart_fields() {
        let body = "--XyZ\r\n\
            Content-Disposition: form-data; name=\"name\"\r\n\
            \r\n\
            Grace Hopper\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
            Content-Type: text/plain\r\n\
            \r\n\
            file contents\r\n\
            --XyZ\r\n\
            content-disposition: form-data; name=\"note\"\r\n\
            \r\n\
            line one\r\nline two\r\n\
            --XyZ--\r\n";
        let fields = parse_form(Some("multipart/form-data; boundary=XyZ"), body.as_bytes()).unwrap();
        assert_eq!(fields.first("name"), Some("Grace Hopper"));
        assert_eq!(fields.first("upload"), None);
        assert_eq!(fields.first("note"), Some("line one\r\nline two"));
    }

    #[test]
    fn test_multipart_quoted_boundary() {
        let body = "--a b\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nx\r\n--a b--";
        let fields =
            parse_form(Some("multipart/form-data; boundary=\"a b\""), body.as_bytes()).unwrap();
        assert_eq!(fields.first("name"), Some("x"));
    }

    #[test]
    fn test_multipart_errors() {
        assert_eq!(
            parse_form(Some("multipart/form-data"), b""),
            Err(FormError::MalformedMultipart("missing boundary"))
        );
        assert_eq!(
            parse_form(Some("multipart/form-data; boundary=q"), b"no delimiters here"),
            Err(FormError::MalformedMultipart("boundary not found"))
        );
        let unterminated = b"--q\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nx";
        assert_eq!(
            parse_form(Some("multipart/form-data; boundary=q"), unterminated),
            Err(FormError::MalformedMultipart("missing closing boundary"))
        );
    }

    #[test]
    fn test_error_responses() {
        assert_eq!(FormError::TooLarge.into_response().status(), 413);
        assert_eq!(
            FormError::MissingField("name".to_string())
                .into_response()
                .status(),
            400
        );
    }

    #[tokio::test]
    async fn test_read_body_limit() {
        let body = Full::new(Bytes::from_static(b"name=abcdef"));
        assert_eq!(read_body(body, 4).await, Err(FormError::TooLarge));

        let body = Full::new(Bytes::from_static(b"name=abc"));
        assert_eq!(read_body(body, 64).await.unwrap(), Bytes::from_static(b"name=abc"));
    }
}
