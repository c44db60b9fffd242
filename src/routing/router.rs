//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up matching route for a method and path
//! - Return matched route, method-not-allowed, or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan ordered by specificity (acceptable for typical route counts)
//! - Duplicate (method, path shape) pairs rejected at compile time

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;

use crate::config::schema::RouteConfig;
use crate::routing::spec::{RouteError, RouteSpec};

/// A matched route with its raw (percent-encoded) path params.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<RouteSpec>,
    pub raw_params: Vec<(String, String)>,
}

/// Outcome of a route table lookup.
#[derive(Debug)]
pub enum Lookup {
    Matched(RouteMatch),
    /// The path exists but not for this method.
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

/// The compiled, immutable route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<RouteSpec>>,
}

impl RouteTable {
    /// Compile route declarations, rejecting duplicates.
    pub fn compile(configs: &[RouteConfig]) -> Result<Self, RouteError> {
        let mut seen: HashMap<(Method, String), String> = HashMap::new();
        let mut routes = Vec::with_capacity(configs.len());

        for config in configs {
            let spec = RouteSpec::from_config(config)?;
            let key = (spec.method.clone(), spec.pattern.shape());
            if let Some(first) = seen.get(&key) {
                return Err(RouteError::Duplicate {
                    first: first.clone(),
                    second: spec.name.clone(),
                    method: key.0,
                    shape: key.1,
                });
            }
            seen.insert(key, spec.name.clone());
            routes.push(Arc::new(spec));
        }

        // Stable sort keeps declaration order among equally specific routes
        routes.sort_by(|a, b| b.pattern.specificity().cmp(&a.pattern.specificity()));

        tracing::info!(routes = routes.len(), "Route table compiled");
        Ok(Self { routes })
    }

    pub fn lookup(&self, method: &Method, path: &str) -> Lookup {
        let mut allowed = Vec::new();

        for route in &self.routes {
            if let Some(raw_params) = route.pattern.matches(path) {
                if route.method == *method {
                    return Lookup::Matched(RouteMatch {
                        route: Arc::clone(route),
                        raw_params,
                    });
                }
                if !allowed.contains(&route.method) {
                    allowed.push(route.method.clone());
                }
            }
        }

        if allowed.is_empty() {
            Lookup::NotFound
        } else {
            Lookup::MethodNotAllowed(allowed)
        }
    }

    pub fn routes(&self) -> &[Arc<RouteSpec>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BodyMode;

    fn route(name: &str, method: &str, path: &str) -> RouteConfig {
        RouteConfig {
            name: name.into(),
            method: method.into(),
            path: path.into(),
            upstream_path: "/x".into(),
            forward_query: false,
            body: BodyMode::None,
            auth: false,
            streaming: false,
            cache: None,
            invalidates: Vec::new(),
        }
    }

    #[test]
    fn test_literal_beats_param() {
        let table = RouteTable::compile(&[
            route("detail", "GET", "/spaces/{id}"),
            route("new", "GET", "/spaces/new"),
        ])
        .unwrap();

        match table.lookup(&Method::GET, "/spaces/new") {
            Lookup::Matched(m) => assert_eq!(m.route.name, "new"),
            other => panic!("unexpected lookup: {other:?}"),
        }
        match table.lookup(&Method::GET, "/spaces/7") {
            Lookup::Matched(m) => {
                assert_eq!(m.route.name, "detail");
                assert_eq!(m.raw_params, vec![("id".to_string(), "7".to_string())]);
            }
            other => panic!("unexpected lookup: {other:?}"),
        }
    }

    #[test]
    fn test_method_fallthrough() {
        let table = RouteTable::compile(&[
            route("new", "GET", "/spaces/new"),
            route("update", "PATCH", "/spaces/{id}"),
        ])
        .unwrap();

        // PATCH on a literal-matching path still reaches the param route
        assert!(matches!(
            table.lookup(&Method::PATCH, "/spaces/new"),
            Lookup::Matched(_)
        ));
    }

    #[test]
    fn test_method_not_allowed_and_not_found() {
        let table = RouteTable::compile(&[route("detail", "GET", "/spaces/{id}")]).unwrap();

        match table.lookup(&Method::DELETE, "/spaces/1") {
            Lookup::MethodNotAllowed(methods) => assert_eq!(methods, vec![Method::GET]),
            other => panic!("unexpected lookup: {other:?}"),
        }
        assert!(matches!(
            table.lookup(&Method::GET, "/nothing"),
            Lookup::NotFound
        ));
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = RouteTable::compile(&[
            route("a", "GET", "/departments/{id}"),
            route("b", "GET", "/departments/{department_id}"),
        ])
        .unwrap_err();
        assert!(matches!(err, RouteError::Duplicate { .. }));
    }

    #[test]
    fn test_same_path_different_methods_allowed() {
        let table = RouteTable::compile(&[
            route("get", "GET", "/departments/{id}"),
            route("delete", "DELETE", "/departments/{id}"),
        ])
        .unwrap();
        assert_eq!(table.len(), 2);
    }
}
