//! The demo site: module descriptors and the navigation menu.
//!
//! Content modules (home, blog, industries) are public. The dashboard and
//! labs sit behind the login gate.

mod blog;
mod dashboard;
mod home;
mod industries;
mod labs;

use anyhow::Result;
use marquee_core::modules::{component, Component, NavItem, NavTable, RouteContext};
use marquee_core::{ApiClient, ModuleRegistry, Page};

/// Where `/` and a cancelled sign-in lead.
pub const DEFAULT_ROUTE: &str = "/home";

pub const NAV: NavTable = NavTable::new(&[
    NavItem { label: "Home", target: "/home" },
    NavItem { label: "Blog", target: "/blog" },
    NavItem { label: "Industries", target: "/industries" },
    NavItem { label: "Dashboard", target: "/dashboard" },
    NavItem { label: "Labs", target: "/labs" },
]);

/// Every module the shell can mount.
pub fn registry(api: &ApiClient) -> ModuleRegistry {
    ModuleRegistry::new(vec![
        home::descriptor(),
        blog::descriptor(),
        industries::descriptor(),
        dashboard::descriptor(api.clone()),
        labs::descriptor(),
    ])
}

/// Placeholder shown while a module is being fetched.
pub fn loading_page(label: &str) -> Page {
    Page::new(label).section(None, [format!("Loading {}...", label)])
}

/// Shell-level 404 for paths no module claims.
pub fn shell_not_found(path: &str) -> Page {
    Page::new("Page not found").section(
        None,
        [
            format!("Nothing lives at {}.", path),
            String::new(),
            "Use the menu above to find your way back.".to_string(),
        ],
    )
}

/// A module's own not-found page.
fn not_found(module: &'static str) -> impl Component {
    component(move |ctx: &RouteContext| -> Result<Page> {
        Ok(Page::new(format!("{}: page not found", module)).section(
            None,
            [format!("{} has no page at {}.", module, ctx.subpath)],
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_nav_targets_resolve_to_modules() {
        let api = ApiClient::new("http://localhost:5000/api", Duration::from_secs(1)).unwrap();
        let registry = registry(&api);
        for item in NAV.items() {
            let descriptor = registry.resolve(item.target).unwrap();
            assert_eq!(descriptor.label, item.label);
        }
    }

    #[test]
    fn test_gated_modules() {
        let api = ApiClient::new("http://localhost:5000/api", Duration::from_secs(1)).unwrap();
        let registry = registry(&api);
        let gated: Vec<&str> = registry
            .descriptors()
            .iter()
            .filter(|d| d.gated)
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(gated, vec!["dashboard", "labs"]);
    }

    #[test]
    fn test_module_not_found_page() {
        let page = not_found("Blog")
            .render(&RouteContext {
                subpath: "/nope".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.title, "Blog: page not found");
        assert!(page.text_lines().any(|l| l.contains("/nope")));
    }
}
