//! Path resolution for the shell.
//!
//! Decides what a navigation means before anything is loaded: the login
//! route, a redirect for gated prefixes without a session, a module, or the
//! shell's own 404.

use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::SessionView;

use super::registry::{LoadedModule, ModuleDescriptor, ModuleLoadError, ModuleRegistry, Mount, RouteError};
use super::route::normalize_subpath;

pub const LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Clone)]
pub enum Navigation {
    Login,
    /// Gated prefix without a session; `requested` is where to go after sign-in
    RedirectToLogin { requested: String },
    Module {
        descriptor: Arc<ModuleDescriptor>,
        path: String,
    },
    NotFound { path: String },
}

pub struct Router {
    registry: Arc<ModuleRegistry>,
    session: SessionView,
    default_route: String,
}

impl Router {
    pub fn new(registry: Arc<ModuleRegistry>, session: SessionView, default_route: &str) -> Self {
        Self {
            registry,
            session,
            default_route: normalize_subpath(default_route),
        }
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn default_route(&self) -> &str {
        &self.default_route
    }

    pub fn navigate(&self, path: &str) -> Navigation {
        let mut path = normalize_subpath(path);
        if path == "/" {
            debug!(to = %self.default_route, "Redirecting root");
            path = self.default_route.clone();
        }
        if path == LOGIN_ROUTE {
            return Navigation::Login;
        }

        match self.registry.resolve(&path) {
            Ok(descriptor) if descriptor.gated && !self.session.is_authenticated() => {
                info!(%path, module = %descriptor.id, "Redirecting unauthenticated navigation to login");
                Navigation::RedirectToLogin { requested: path }
            }
            Ok(descriptor) => Navigation::Module { descriptor, path },
            Err(RouteError::NoModuleMatched(path)) => Navigation::NotFound { path },
        }
    }

    /// Load the module if needed and mount the route for `path`.
    pub async fn mount(&self, descriptor: &ModuleDescriptor, path: &str) -> Result<Mount, ModuleLoadError> {
        let module = self.registry.load(descriptor).await?;
        Ok(Mount::new(descriptor, &module, path))
    }

    /// Mount synchronously when the module is already loaded.
    pub fn mount_loaded(&self, descriptor: &ModuleDescriptor, path: &str) -> Option<Mount> {
        let module: Arc<LoadedModule> = self.registry.loaded(&descriptor.id)?;
        Some(Mount::new(descriptor, &module, path))
    }
}
