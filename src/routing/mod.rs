//! Routing module
//!
//! Provides the static route table of each service variant:
//! - Path patterns with `<name>` parameters
//! - Method checks with implicit HEAD and OPTIONS

mod pattern;
mod table;

pub use pattern::PathParams;
pub use table::{Endpoint, RouteMatch, RouteTable};
