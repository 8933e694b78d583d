//! Ordered route table.

use super::path::PathMatcher;
use super::when::WhenCondition;
use crate::behavior::Behavior;
use crate::request::{GenericRequest, Protocol};
use hyper::Method;
use std::collections::HashMap;
use tracing::trace;

/// Protocol + method + path predicate
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    pub protocol: Protocol,
    pub method: Method,
    pub path: PathMatcher,
}

impl RouteMatcher {
    pub fn new(protocol: Protocol, method: Method, path: PathMatcher) -> Self {
        Self {
            protocol,
            method,
            path,
        }
    }

    /// Path parameters when protocol, method and path all match.
    pub fn matches(&self, request: &GenericRequest) -> Option<HashMap<String, String>> {
        if self.protocol != request.protocol || self.method != request.method {
            return None;
        }
        self.path.matches(&request.operation)
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    pub matcher: RouteMatcher,
    pub behavior: Behavior,
    pub priority: i32,
    pub id: Option<String>,
    pub when: Option<WhenCondition>,
}

impl Route {
    pub fn new(matcher: RouteMatcher, behavior: Behavior, priority: i32) -> Self {
        Self {
            matcher,
            behavior,
            priority,
            id: None,
            when: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_when(mut self, when: WhenCondition) -> Self {
        self.when = (!when.is_empty()).then_some(when);
        self
    }

    fn condition_holds(&self, request: &GenericRequest) -> bool {
        self.when.as_ref().map_or(true, |w| w.matches(request))
    }
}

/// A successful route lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    /// Path parameters merged with the first value of each query parameter
    pub params: HashMap<String, String>,
}

/// Immutable table sorted by priority (highest first). Equal priorities
/// keep declaration order.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new(mut routes: Vec<Route>) -> Self {
        // sort_by is stable
        routes.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First route whose matcher and condition both hold. A route whose path
    /// matches but whose condition fails does not end the scan.
    pub fn find(&self, request: &GenericRequest) -> Option<RouteMatch<'_>> {
        for route in &self.routes {
            let Some(path_params) = route.matcher.matches(request) else {
                continue;
            };
            if !route.condition_holds(request) {
                trace!(
                    route = route.id.as_deref().unwrap_or("-"),
                    path = %request.operation,
                    "when-condition failed, continuing scan"
                );
                continue;
            }
            return Some(RouteMatch {
                route,
                params: merge_params(path_params, request),
            });
        }
        None
    }
}

fn merge_params(
    mut params: HashMap<String, String>,
    request: &GenericRequest,
) -> HashMap<String, String> {
    for (key, values) in &request.query {
        if let Some(first) = values.first() {
            params.insert(key.clone(), first.clone());
        }
    }
    params
}
