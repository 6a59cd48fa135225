//! A module's own route table.
//!
//! Patterns are matched segment by segment against the part of the path
//! below the module's prefix. `:name` segments capture a value. Anything
//! unmatched goes to the module's not-found component.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;

use crate::auth::Session;

use super::Page;

/// Everything a component sees while rendering.
#[derive(Debug, Clone, Default)]
pub struct RouteContext {
    /// Full path that was navigated to
    pub path: String,
    /// Path below the module prefix, always starting with `/`
    pub subpath: String,
    pub params: BTreeMap<String, String>,
    pub session: Option<Session>,
}

impl RouteContext {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// A renderable unit inside a module.
pub trait Component: Send + Sync {
    fn render(&self, ctx: &RouteContext) -> Result<Page>;
}

impl<F> Component for F
where
    F: Fn(&RouteContext) -> Result<Page> + Send + Sync,
{
    fn render(&self, ctx: &RouteContext) -> Result<Page> {
        self(ctx)
    }
}

/// Pin a closure to the component signature so its types can be inferred.
pub fn component<F>(render: F) -> F
where
    F: Fn(&RouteContext) -> Result<Page> + Send + Sync,
{
    render
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

struct Route {
    pattern: String,
    segments: Vec<Segment>,
    component: Arc<dyn Component>,
}

/// Result of dispatching a subpath.
#[derive(Clone)]
pub struct Dispatch {
    pub component: Arc<dyn Component>,
    pub params: BTreeMap<String, String>,
    /// The matched pattern, `None` for the not-found component
    pub pattern: Option<String>,
}

pub struct RouteTable {
    routes: Vec<Route>,
    not_found: Arc<dyn Component>,
}

impl RouteTable {
    pub fn new(not_found: impl Component + 'static) -> Self {
        Self {
            routes: Vec::new(),
            not_found: Arc::new(not_found),
        }
    }

    /// Add a route. Earlier routes win when two patterns match.
    pub fn route(mut self, pattern: &str, component: impl Component + 'static) -> Self {
        let segments = split(pattern)
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();
        self.routes.push(Route {
            pattern: normalize_subpath(pattern),
            segments,
            component: Arc::new(component),
        });
        self
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.pattern.as_str())
    }

    pub fn dispatch(&self, subpath: &str) -> Dispatch {
        let parts: Vec<&str> = split(subpath).collect();

        for route in &self.routes {
            if route.segments.len() != parts.len() {
                continue;
            }
            let mut params = BTreeMap::new();
            let matched = route.segments.iter().zip(&parts).all(|(segment, part)| match segment {
                Segment::Literal(lit) => lit == *part,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                    true
                }
            });
            if matched {
                return Dispatch {
                    component: route.component.clone(),
                    params,
                    pattern: Some(route.pattern.clone()),
                };
            }
        }

        Dispatch {
            component: self.not_found.clone(),
            params: BTreeMap::new(),
            pattern: None,
        }
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// `""`, `"/"` and `"a/b/"` become `"/"`, `"/"` and `"/a/b"`.
pub fn normalize_subpath(path: &str) -> String {
    let joined = split(path).collect::<Vec<_>>().join("/");
    format!("/{}", joined)
}
