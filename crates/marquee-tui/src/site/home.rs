use anyhow::Result;
use futures::FutureExt;
use marquee_core::modules::{component, LoadFuture, LoadedModule, ModuleDescriptor, RouteContext, RouteTable};
use marquee_core::Page;

pub fn descriptor() -> ModuleDescriptor {
    ModuleDescriptor::new("home", "Home", "/home", load)
}

fn load() -> LoadFuture {
    async { Ok(LoadedModule::new(routes())) }.boxed()
}

fn routes() -> RouteTable {
    RouteTable::new(super::not_found("Home")).route("/", component(index))
}

fn index(ctx: &RouteContext) -> Result<Page> {
    let greeting = match ctx.session {
        Some(ref session) => format!("Welcome back, {}.", session.display_name),
        None => "Welcome to Marquee.".to_string(),
    };

    Ok(Page::new("Home")
        .section(
            Some(greeting.as_str()),
            [
                "Marquee builds storefronts, dashboards and experiments for teams",
                "that ship every week.",
            ],
        )
        .section(
            Some("Explore"),
            [
                "Blog         Notes from the team",
                "Industries   Who we work with",
                "Dashboard    Live widgets (sign-in required)",
                "Labs         Experiments in progress (sign-in required)",
            ],
        ))
}
