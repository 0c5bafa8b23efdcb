//! HTTP protocol layer module
//!
//! Response builders shared by the router and the service handlers.

pub mod response;

// Re-export commonly used types
pub use response::{
    apply_common_headers, build_400_response, build_404_response, build_405_response,
    build_413_response, build_500_response, build_html_response, build_json_response,
    build_options_response, build_text_response, content_length, strip_body,
};
