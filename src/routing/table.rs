//! Route table module
//!
//! Static method + path → endpoint mapping, built once per service variant.

use hyper::Method;

use super::pattern::{PathParams, PathPattern};
use crate::config::ServiceVariant;

/// Handler an incoming request is dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    CanaryHome,
    StableHome,
    ApiData,
    SubmitForm,
    Profile,
}

/// A single route: accepted methods, path pattern and endpoint
#[derive(Debug, Clone)]
pub struct Route {
    pub methods: Vec<Method>,
    pub pattern: PathPattern,
    pub endpoint: Endpoint,
}

impl Route {
    fn new(methods: &[Method], pattern: &str, endpoint: Endpoint) -> Self {
        Self {
            methods: methods.to_vec(),
            pattern: PathPattern::parse(pattern),
            endpoint,
        }
    }

    /// HEAD is served wherever GET is
    fn accepts(&self, method: &Method) -> bool {
        if *method == Method::HEAD {
            self.methods.contains(&Method::GET)
        } else {
            self.methods.contains(method)
        }
    }
}

/// Result of resolving a request against the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMatch {
    Found {
        endpoint: Endpoint,
        params: PathParams,
    },
    /// `OPTIONS` on a known path
    Options { allow: String },
    MethodNotAllowed { allow: String },
    NotFound,
}

/// Immutable routing table
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub const fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Routes served by each release channel
    pub fn for_variant(variant: ServiceVariant) -> Self {
        match variant {
            ServiceVariant::Canary => Self::new(vec![Route::new(
                &[Method::GET],
                "/",
                Endpoint::CanaryHome,
            )]),
            ServiceVariant::Stable => Self::new(vec![
                Route::new(&[Method::GET], "/", Endpoint::StableHome),
                Route::new(&[Method::GET], "/api/data", Endpoint::ApiData),
                Route::new(&[Method::GET, Method::POST], "/submit", Endpoint::SubmitForm),
                Route::new(&[Method::GET], "/profile/<username>", Endpoint::Profile),
            ]),
        }
    }

    /// Resolve a method and raw request path
    pub fn resolve(&self, method: &Method, path: &str) -> RouteMatch {
        let mut allowed: Vec<Method> = Vec::new();

        for route in &self.routes {
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };
            if *method != Method::OPTIONS && route.accepts(method) {
                return RouteMatch::Found {
                    endpoint: route.endpoint,
                    params,
                };
            }
            allowed.extend(route.methods.iter().cloned());
        }

        if allowed.is_empty() {
            return RouteMatch::NotFound;
        }

        let allow = allow_header(allowed);
        if *method == Method::OPTIONS {
            RouteMatch::Options { allow }
        } else {
            RouteMatch::MethodNotAllowed { allow }
        }
    }
}

/// Build a sorted `Allow` value, adding HEAD for GET and always OPTIONS
fn allow_header(mut methods: Vec<Method>) -> String {
    if methods.contains(&Method::GET) {
        methods.push(Method::HEAD);
    }
    methods.push(Method::OPTIONS);

    let mut names: Vec<&str> = methods.iter().map(Method::as_str).collect();
    names.sort_unstable();
    names.dedup();
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(table: &RouteTable, method: &Method, path: &str) -> Option<Endpoint> {
        match table.resolve(method, path) {
            RouteMatch::Found { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }

    #[test]
    fn test_canary_table() {
        let table = RouteTable::for_variant(ServiceVariant::Canary);
        assert_eq!(found(&table, &Method::GET, "/"), Some(Endpoint::CanaryHome));
        assert_eq!(found(&table, &Method::HEAD, "/"), Some(Endpoint::CanaryHome));
        assert_eq!(table.resolve(&Method::GET, "/api/data"), RouteMatch::NotFound);
    }

    #[test]
    fn test_stable_table() {
        let table = RouteTable::for_variant(ServiceVariant::Stable);
        assert_eq!(found(&table, &Method::GET, "/"), Some(Endpoint::StableHome));
        assert_eq!(found(&table, &Method::GET, "/api/data"), Some(Endpoint::ApiData));
        assert_eq!(found(&table, &Method::GET, "/submit"), Some(Endpoint::SubmitForm));
        assert_eq!(found(&table, &Method::POST, "/submit"), Some(Endpoint::SubmitForm));
        assert_eq!(
            found(&table, &Method::GET, "/profile/bob"),
            Some(Endpoint::Profile)
        );
    }

    #[test]
    fn test_profile_params() {
        let table = RouteTable::for_variant(ServiceVariant::Stable);
        let RouteMatch::Found { params, .. } = table.resolve(&Method::GET, "/profile/o%27neil")
        else {
            panic!("profile route should match");
        };
        assert_eq!(params.get("username"), Some("o'neil"));
    }

    #[test]
    fn test_method_not_allowed() {
        let table = RouteTable::for_variant(ServiceVariant::Stable);
        assert_eq!(
            table.resolve(&Method::POST, "/api/data"),
            RouteMatch::MethodNotAllowed {
                allow: "GET, HEAD, OPTIONS".to_string()
            }
        );
        assert_eq!(
            table.resolve(&Method::DELETE, "/submit"),
            RouteMatch::MethodNotAllowed {
                allow: "GET, HEAD, OPTIONS, POST".to_string()
            }
        );
    }

    #[test]
    fn test_options() {
        let table = RouteTable::for_variant(ServiceVariant::Stable);
        assert_eq!(
            table.resolve(&Method::OPTIONS, "/submit"),
            RouteMatch::Options {
                allow: "GET, HEAD, OPTIONS, POST".to_string()
            }
        );
        assert_eq!(table.resolve(&Method::OPTIONS, "/nope"), RouteMatch::NotFound);
    }

    #[test]
    fn test_not_found() {
        let table = RouteTable::for_variant(ServiceVariant::Stable);
        assert_eq!(table.resolve(&Method::GET, "/profile/"), RouteMatch::NotFound);
        assert_eq!(table.resolve(&Method::GET, "/api/data/"), RouteMatch::NotFound);
        assert_eq!(table.resolve(&Method::POST, "/missing"), RouteMatch::NotFound);
    }
}
