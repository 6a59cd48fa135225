use anyhow::Result;
use futures::FutureExt;
use marquee_core::modules::{component, LoadFuture, LoadedModule, ModuleDescriptor, RouteContext, RouteTable};
use marquee_core::Page;

struct Industry {
    id: &'static str,
    name: &'static str,
    pitch: &'static str,
}

const INDUSTRIES: &[Industry] = &[
    Industry {
        id: "retail",
        name: "Retail",
        pitch: "Storefronts that stay up on the busiest day of the year.",
    },
    Industry {
        id: "logistics",
        name: "Logistics",
        pitch: "Live fleet dashboards for dispatch teams.",
    },
    Industry {
        id: "healthcare",
        name: "Healthcare",
        pitch: "Patient portals with accessibility built in.",
    },
];

pub fn descriptor() -> ModuleDescriptor {
    ModuleDescriptor::new("industries", "Industries", "/industries", load)
}

fn load() -> LoadFuture {
    async { Ok(LoadedModule::new(routes())) }.boxed()
}

fn routes() -> RouteTable {
    RouteTable::new(super::not_found("Industries"))
        .route("/", component(index))
        .route("/:id", component(detail))
}

fn index(_ctx: &RouteContext) -> Result<Page> {
    Ok(Page::new("Industries").section(
        Some("Who we work with"),
        INDUSTRIES
            .iter()
            .map(|i| format!("{:<12} {}  (/industries/{})", i.name, i.pitch, i.id)),
    ))
}

fn detail(ctx: &RouteContext) -> Result<Page> {
    let id = ctx.param("id").unwrap_or_default();
    match INDUSTRIES.iter().find(|i| i.id == id) {
        Some(industry) => Ok(Page::new(industry.name).section(None, [industry.pitch])),
        None => Ok(Page::new("Industry not found").section(None, [format!("We have no page for \"{}\".", id)])),
    }
}
