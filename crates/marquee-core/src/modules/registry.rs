//! Module registry: descriptors, lazy loading and mounting.
//!
//! Each descriptor's module goes through three states:
//!
//! ```text
//! Unloaded ──load()──▶ Loading (waiters share one future) ──ok──▶ Loaded
//!    ▲                              │
//!    └────────────── err ───────────┘   (retry by navigating again)
//! ```
//!
//! A loader runs at most once per successful load. Navigations that arrive
//! while a load is in flight await the same shared future.

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::auth::Session;
use crate::boundary::{panic_message, CrashBoundary};

use super::route::{normalize_subpath, Component, RouteContext, RouteTable};
use super::Page;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleLoadError {
    #[error("Failed to load module {module}: {message}")]
    Fetch { module: String, message: String },
}

impl ModuleLoadError {
    pub fn fetch(module: impl Into<String>, message: impl Into<String>) -> Self {
        ModuleLoadError::Fetch {
            module: module.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("No module matches {0}")]
    NoModuleMatched(String),
}

/// A loaded module: its own route table.
pub struct LoadedModule {
    pub routes: RouteTable,
}

impl LoadedModule {
    pub fn new(routes: RouteTable) -> Self {
        Self { routes }
    }
}

pub type LoadFuture = BoxFuture<'static, Result<LoadedModule, ModuleLoadError>>;

/// Fetches a module's code and data on first navigation.
pub trait ModuleLoader: Send + Sync {
    fn load(&self) -> LoadFuture;
}

impl<F> ModuleLoader for F
where
    F: Fn() -> LoadFuture + Send + Sync,
{
    fn load(&self) -> LoadFuture {
        self()
    }
}

/// Static description of a module mounted under a path prefix.
pub struct ModuleDescriptor {
    pub id: String,
    pub label: String,
    pub path_prefix: String,
    /// Requires a signed-in session
    pub gated: bool,
    loader: Arc<dyn ModuleLoader>,
}

impl std::fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("id", &self.id)
            .field("path_prefix", &self.path_prefix)
            .field("gated", &self.gated)
            .finish()
    }
}

impl ModuleDescriptor {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        path_prefix: &str,
        loader: impl ModuleLoader + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            path_prefix: normalize_subpath(path_prefix),
            gated: false,
            loader: Arc::new(loader),
        }
    }

    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    /// Prefix match on whole path segments.
    pub fn matches(&self, path: &str) -> bool {
        if self.path_prefix == "/" {
            return true;
        }
        match path.strip_prefix(self.path_prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// The part of `path` below this module's prefix.
    pub fn subpath(&self, path: &str) -> String {
        if self.path_prefix == "/" {
            return normalize_subpath(path);
        }
        normalize_subpath(path.strip_prefix(self.path_prefix.as_str()).unwrap_or(path))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
}

type SharedLoad = Shared<BoxFuture<'static, Result<Arc<LoadedModule>, ModuleLoadError>>>;

enum Slot {
    Loading(SharedLoad),
    Loaded(Arc<LoadedModule>),
}

pub struct ModuleRegistry {
    descriptors: Vec<Arc<ModuleDescriptor>>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl ModuleRegistry {
    pub fn new(descriptors: Vec<ModuleDescriptor>) -> Self {
        Self {
            descriptors: descriptors.into_iter().map(Arc::new).collect(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn descriptors(&self) -> &[Arc<ModuleDescriptor>] {
        &self.descriptors
    }

    pub fn descriptor(&self, id: &str) -> Option<Arc<ModuleDescriptor>> {
        self.descriptors.iter().find(|d| d.id == id).cloned()
    }

    /// The descriptor with the longest prefix matching `path`.
    pub fn resolve(&self, path: &str) -> Result<Arc<ModuleDescriptor>, RouteError> {
        let path = normalize_subpath(path);
        self.descriptors
            .iter()
            .filter(|d| d.matches(&path))
            .max_by_key(|d| d.path_prefix.len())
            .cloned()
            .ok_or(RouteError::NoModuleMatched(path))
    }

    pub fn load_state(&self, id: &str) -> LoadState {
        match self.slots().get(id) {
            None => LoadState::Unloaded,
            Some(Slot::Loading(_)) => LoadState::Loading,
            Some(Slot::Loaded(_)) => LoadState::Loaded,
        }
    }

    /// The loaded module, if its load has completed.
    pub fn loaded(&self, id: &str) -> Option<Arc<LoadedModule>> {
        match self.slots().get(id) {
            Some(Slot::Loaded(module)) => Some(module.clone()),
            _ => None,
        }
    }

    /// Load a module, joining an in-flight load if there is one.
    pub async fn load(&self, descriptor: &ModuleDescriptor) -> Result<Arc<LoadedModule>, ModuleLoadError> {
        let load = {
            let mut slots = self.slots();
            match slots.get(&descriptor.id) {
                Some(Slot::Loaded(module)) => return Ok(module.clone()),
                Some(Slot::Loading(load)) => {
                    debug!(module = %descriptor.id, "Joining in-flight module load");
                    load.clone()
                }
                None => {
                    info!(module = %descriptor.id, "Loading module");
                    let loader = descriptor.loader.clone();
                    let id = descriptor.id.clone();
                    // A panicking loader settles as an error so the slot can be retried
                    let load = AssertUnwindSafe(async move { loader.load().await })
                        .catch_unwind()
                        .map(move |outcome| match outcome {
                            Ok(result) => result.map(Arc::new),
                            Err(payload) => Err(ModuleLoadError::fetch(
                                id,
                                format!("loader panicked: {}", panic_message(payload.as_ref())),
                            )),
                        })
                        .boxed()
                        .shared();
                    slots.insert(descriptor.id.clone(), Slot::Loading(load.clone()));
                    load
                }
            }
        };

        let result = load.clone().await;

        let mut slots = self.slots();
        let still_current = matches!(
            slots.get(&descriptor.id),
            Some(Slot::Loading(current)) if current.ptr_eq(&load)
        );
        if still_current {
            match &result {
                Ok(module) => {
                    info!(module = %descriptor.id, "Module loaded");
                    slots.insert(descriptor.id.clone(), Slot::Loaded(module.clone()));
                }
                Err(e) => {
                    warn!(module = %descriptor.id, error = %e, "Module load failed");
                    slots.remove(&descriptor.id);
                }
            }
        }
        result
    }
}

/// One mounted instance of a module route, with its own crash boundary.
pub struct Mount {
    pub module_id: String,
    pub path: String,
    pub subpath: String,
    pub pattern: Option<String>,
    params: BTreeMap<String, String>,
    component: Arc<dyn Component>,
    boundary: CrashBoundary,
}

impl Mount {
    /// Dispatch `path` through the module's route table.
    pub fn new(descriptor: &ModuleDescriptor, module: &LoadedModule, path: &str) -> Self {
        let path = normalize_subpath(path);
        let subpath = descriptor.subpath(&path);
        let dispatch = module.routes.dispatch(&subpath);
        debug!(module = %descriptor.id, %subpath, pattern = ?dispatch.pattern, "Mounting route");

        Self {
            module_id: descriptor.id.clone(),
            path,
            subpath,
            pattern: dispatch.pattern,
            params: dispatch.params,
            component: dispatch.component,
            boundary: CrashBoundary::new(descriptor.label.clone()),
        }
    }

    pub fn boundary(&self) -> &CrashBoundary {
        &self.boundary
    }

    /// Render the mounted component inside this mount's boundary.
    pub fn render(&mut self, session: Option<Session>) -> Page {
        let ctx = RouteContext {
            path: self.path.clone(),
            subpath: self.subpath.clone(),
            params: self.params.clone(),
            session,
        };
        let component = self.component.clone();
        self.boundary.render(|| component.render(&ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::route::component;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_loader(calls: Arc<AtomicUsize>, delay: Duration) -> impl ModuleLoader {
        move || -> LoadFuture {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                Ok(LoadedModule::new(
                    RouteTable::new(component(|_| Ok(Page::new("Missing"))))
                        .route("/", component(|_| Ok(Page::new("Index"))))
                        .route("/:id", component(|ctx| {
                            Ok(Page::new(format!("Item {}", ctx.param("id").unwrap_or("?"))))
                        })),
                ))
            }
            .boxed()
        }
    }

    fn registry() -> ModuleRegistry {
        let noop = || -> LoadFuture { async { Ok(LoadedModule::new(RouteTable::new(component(|_| Ok(Page::new("x")))))) }.boxed() };
        ModuleRegistry::new(vec![
            ModuleDescriptor::new("home", "Home", "/", noop),
            ModuleDescriptor::new("blog", "Blog", "/blog", noop),
            ModuleDescriptor::new("blog-admin", "Blog admin", "/blog/admin", noop).gated(),
            ModuleDescriptor::new("labs", "Labs", "/labs", noop).gated(),
        ])
    }

    fn registry_without_root() -> ModuleRegistry {
        let noop = || -> LoadFuture { async { Ok(LoadedModule::new(RouteTable::new(component(|_| Ok(Page::new("x")))))) }.boxed() };
        ModuleRegistry::new(vec![
            ModuleDescriptor::new("blog", "Blog", "/blog", noop),
            ModuleDescriptor::new("labs", "Labs", "/labs", noop),
        ])
    }

    #[test]
    fn test_resolve_longest_prefix() {
        let registry = registry();
        assert_eq!(registry.resolve("/blog").unwrap().id, "blog");
        assert_eq!(registry.resolve("/blog/post-1").unwrap().id, "blog");
        assert_eq!(registry.resolve("/blog/admin").unwrap().id, "blog-admin");
        assert_eq!(registry.resolve("/blog/admin/users").unwrap().id, "blog-admin");
        assert_eq!(registry.resolve("/labs/").unwrap().id, "labs");
        assert_eq!(registry.resolve("/pricing").unwrap().id, "home");
    }

    #[test]
    fn test_resolve_respects_segment_boundaries() {
        let registry = registry_without_root();
        assert_eq!(
            registry.resolve("/blogger").unwrap_err(),
            RouteError::NoModuleMatched("/blogger".to_string())
        );
        assert!(registry.resolve("/").is_err());
    }

    #[test]
    fn test_subpath() {
        let registry = registry();
        let blog = registry.descriptor("blog").unwrap();
        assert_eq!(blog.subpath("/blog"), "/");
        assert_eq!(blog.subpath("/blog/post-1/"), "/post-1");
        let home = registry.descriptor("home").unwrap();
        assert_eq!(home.subpath("/pricing"), "/pricing");
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_once_and_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = ModuleRegistry::new(vec![ModuleDescriptor::new(
            "labs",
            "Labs",
            "/labs",
            counting_loader(calls.clone(), Duration::from_millis(100)),
        )]);
        let descriptor = registry.descriptor("labs").unwrap();

        assert_eq!(registry.load_state("labs"), LoadState::Unloaded);
        registry.load(&descriptor).await.unwrap();
        assert_eq!(registry.load_state("labs"), LoadState::Loaded);
        registry.load(&descriptor).await.unwrap();
        assert!(registry.loaded("labs").is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_loads_coalesce() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = ModuleRegistry::new(vec![ModuleDescriptor::new(
            "labs",
            "Labs",
            "/labs",
            counting_loader(calls.clone(), Duration::from_millis(500)),
        )]);
        let descriptor = registry.descriptor("labs").unwrap();

        let (a, b) = tokio::join!(registry.load(&descriptor), registry.load(&descriptor));
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.load_state("labs"), LoadState::Loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_state_while_in_flight() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(ModuleRegistry::new(vec![ModuleDescriptor::new(
            "labs",
            "Labs",
            "/labs",
            counting_loader(calls.clone(), Duration::from_secs(1)),
        )]));
        let descriptor = registry.descriptor("labs").unwrap();

        let mut pending = Box::pin(registry.load(&descriptor));
        assert!(futures::poll!(pending.as_mut()).is_pending());
        assert_eq!(registry.load_state("labs"), LoadState::Loading);

        // A late navigation joins instead of starting a second load
        let late = registry.load(&descriptor);
        let (a, b) = tokio::join!(pending, late);
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_retryable() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = {
            let calls = calls.clone();
            move || -> LoadFuture {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(ModuleLoadError::fetch("labs", "connection refused"))
                    } else {
                        Ok(LoadedModule::new(RouteTable::new(component(|_| Ok(Page::new("x"))))))
                    }
                }
                .boxed()
            }
        };
        let registry = ModuleRegistry::new(vec![ModuleDescriptor::new("labs", "Labs", "/labs", loader)]);
        let descriptor = registry.descriptor("labs").unwrap();

        let err = registry.load(&descriptor).await.err().unwrap();
        assert_eq!(err, ModuleLoadError::fetch("labs", "connection refused"));
        assert_eq!(registry.load_state("labs"), LoadState::Unloaded);

        registry.load(&descriptor).await.unwrap();
        assert_eq!(registry.load_state("labs"), LoadState::Loaded);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_loader_is_retryable() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = {
            let calls = calls.clone();
            move || -> LoadFuture {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        panic!("bundle missing");
                    }
                    Ok(LoadedModule::new(RouteTable::new(component(|_| Ok(Page::new("x"))))))
                }
                .boxed()
            }
        };
        let registry = ModuleRegistry::new(vec![ModuleDescriptor::new("labs", "Labs", "/labs", loader)]);
        let descriptor = registry.descriptor("labs").unwrap();

        let err = registry.load(&descriptor).await.err().unwrap();
        assert_eq!(err, ModuleLoadError::fetch("labs", "loader panicked: bundle missing"));
        assert_eq!(registry.load_state("labs"), LoadState::Unloaded);

        registry.load(&descriptor).await.unwrap();
        assert_eq!(registry.load_state("labs"), LoadState::Loaded);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_dispatches_subpath() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = ModuleRegistry::new(vec![ModuleDescriptor::new(
            "labs",
            "Labs",
            "/labs",
            counting_loader(calls, Duration::ZERO),
        )]);
        let descriptor = registry.descriptor("labs").unwrap();
        let module = registry.load(&descriptor).await.unwrap();

        let mut index = Mount::new(&descriptor, &module, "/labs");
        assert_eq!(index.render(None).title, "Index");

        let mut item = Mount::new(&descriptor, &module, "/labs/42");
        assert_eq!(item.pattern.as_deref(), Some("/:id"));
        assert_eq!(item.render(None).title, "Item 42");

        let mut missing = Mount::new(&descriptor, &module, "/labs/a/b");
        assert!(missing.pattern.is_none());
        assert_eq!(missing.render(None).title, "Missing");
    }

    #[tokio::test]
    async fn test_crash_is_contained_per_mount() {
        let loader = || -> LoadFuture {
            async {
                Ok(LoadedModule::new(
                    RouteTable::new(component(|_| Ok(Page::new("Missing"))))
                        .route("/", component(|_| Ok(Page::new("Fine"))))
                        .route("/broken", component(|_| -> anyhow::Result<Page> { panic!("bad data") })),
                ))
            }
            .boxed()
        };
        let registry = ModuleRegistry::new(vec![ModuleDescriptor::new("labs", "Labs", "/labs", loader)]);
        let descriptor = registry.descriptor("labs").unwrap();
        let module = registry.load(&descriptor).await.unwrap();

        let mut broken = Mount::new(&descriptor, &module, "/labs/broken");
        let page = broken.render(None);
        assert!(broken.boundary().is_faulted());
        assert_eq!(page.title, "Labs is unavailable");

        // A sibling mount of the same module is unaffected
        let mut fine = Mount::new(&descriptor, &module, "/labs");
        assert_eq!(fine.render(None).title, "Fine");
        assert!(!fine.boundary().is_faulted());
    }
}
