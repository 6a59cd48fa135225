//! Lazily loaded modules and the routing around them.
//!
//! - `registry`: descriptors, coalesced loading, mounts
//! - `router`: what a navigation resolves to
//! - `route`: each module's own route table
//! - `nav`: the static navigation menu

pub mod nav;
mod page;
pub mod registry;
pub mod route;
pub mod router;

pub use nav::{NavItem, NavTable};
pub use page::{Page, PageAction, Section};
pub use registry::{
    LoadFuture, LoadState, LoadedModule, ModuleDescriptor, ModuleLoadError, ModuleLoader, ModuleRegistry, Mount,
    RouteError,
};
pub use route::{component, Component, RouteContext, RouteTable};
pub use router::{Navigation, Router, LOGIN_ROUTE};
