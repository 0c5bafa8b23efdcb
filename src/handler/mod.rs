//! Request handler module
//!
//! Request dispatch plus the canary and stable service handlers.

pub mod canary;
pub mod form;
pub mod router;
pub mod stable;
pub mod templates;

// Re-export main entry point
pub use router::handle_request;
