//! Experiments in progress. Gated.

use anyhow::Result;
use futures::FutureExt;
use marquee_core::modules::{component, LoadFuture, LoadedModule, ModuleDescriptor, RouteContext, RouteTable};
use marquee_core::Page;

struct Experiment {
    slug: &'static str,
    name: &'static str,
    status: &'static str,
    notes: &'static [&'static str],
}

const EXPERIMENTS: &[Experiment] = &[
    Experiment {
        slug: "instant-search",
        name: "Instant search",
        status: "beta",
        notes: &["Results update on every keystroke.", "Index rebuilt nightly."],
    },
    Experiment {
        slug: "dark-mode",
        name: "Dark mode",
        status: "shipped",
        notes: &["Follows the system preference."],
    },
    Experiment {
        slug: "fault-injection",
        name: "Fault injection",
        status: "internal",
        notes: &["Opening this experiment deliberately crashes its page."],
    },
];

pub fn descriptor() -> ModuleDescriptor {
    ModuleDescriptor::new("labs", "Labs", "/labs", load).gated()
}

fn load() -> LoadFuture {
    async { Ok(LoadedModule::new(routes())) }.boxed()
}

fn routes() -> RouteTable {
    RouteTable::new(super::not_found("Labs"))
        .route("/", component(index))
        .route("/:slug", component(experiment))
}

fn index(_ctx: &RouteContext) -> Result<Page> {
    Ok(Page::new("Labs").section(
        Some("Experiments"),
        EXPERIMENTS
            .iter()
            .map(|e| format!("{:<18} [{}]  /labs/{}", e.name, e.status, e.slug)),
    ))
}

fn experiment(ctx: &RouteContext) -> Result<Page> {
    let slug = ctx.param("slug").unwrap_or_default();
    let Some(experiment) = EXPERIMENTS.iter().find(|e| e.slug == slug) else {
        return Ok(Page::new("Experiment not found").section(None, [format!("No experiment called \"{}\".", slug)]));
    };
    if experiment.slug == "fault-injection" {
        panic!("fault-injection experiment crashed while rendering");
    }

    let status = format!("Status: {}", experiment.status);
    Ok(Page::new(experiment.name).section(Some(status.as_str()), experiment.notes.iter().copied()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_core::modules::Component;
    use marquee_core::CrashBoundary;

    fn mount_render(subpath: &str) -> (Page, bool) {
        let dispatch = routes().dispatch(subpath);
        let ctx = RouteContext {
            params: dispatch.params.clone(),
            ..Default::default()
        };
        let mut boundary = CrashBoundary::new("Labs");
        let page = boundary.render(|| dispatch.component.render(&ctx));
        (page, boundary.is_faulted())
    }

    #[test]
    fn test_experiment_page() {
        let (page, faulted) = mount_render("/dark-mode");
        assert_eq!(page.title, "Dark mode");
        assert!(!faulted);
    }

    #[test]
    fn test_fault_injection_is_contained() {
        let (page, faulted) = mount_render("/fault-injection");
        assert!(faulted);
        assert_eq!(page.title, "Labs is unavailable");
    }
}
