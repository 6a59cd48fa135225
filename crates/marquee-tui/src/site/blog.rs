use anyhow::Result;
use futures::FutureExt;
use marquee_core::modules::{component, LoadFuture, LoadedModule, ModuleDescriptor, RouteContext, RouteTable};
use marquee_core::Page;

struct Post {
    slug: &'static str,
    title: &'static str,
    date: &'static str,
    summary: &'static str,
    body: &'static [&'static str],
}

const POSTS: &[Post] = &[
    Post {
        slug: "shipping-weekly",
        title: "Shipping every week without breaking things",
        date: "2024-03-04",
        summary: "How small modules and a thin shell keep releases boring.",
        body: &[
            "Each part of the site is its own module with its own routes.",
            "The shell only knows where a module lives and how to load it.",
            "A broken module shows an apology page; the rest keeps working.",
        ],
    },
    Post {
        slug: "lazy-loading",
        title: "Load it when you need it",
        date: "2024-02-12",
        summary: "Why the dashboard is not downloaded until someone opens it.",
        body: &[
            "Modules are fetched on first visit and kept for the session.",
            "Two tabs asking for the same module share one download.",
        ],
    },
    Post {
        slug: "hello",
        title: "Hello, world",
        date: "2024-01-08",
        summary: "The first post on the new site.",
        body: &["We rebuilt the site. This is the first post."],
    },
];

pub fn descriptor() -> ModuleDescriptor {
    ModuleDescriptor::new("blog", "Blog", "/blog", load)
}

fn load() -> LoadFuture {
    async { Ok(LoadedModule::new(routes())) }.boxed()
}

fn routes() -> RouteTable {
    RouteTable::new(super::not_found("Blog"))
        .route("/", component(index))
        .route("/:slug", component(post))
}

fn index(_ctx: &RouteContext) -> Result<Page> {
    let mut page = Page::new("Blog");
    for post in POSTS {
        page = page.section(
            Some(post.title),
            [
                format!("{}  /blog/{}", post.date, post.slug),
                post.summary.to_string(),
            ],
        );
    }
    Ok(page)
}

fn post(ctx: &RouteContext) -> Result<Page> {
    let slug = ctx.param("slug").unwrap_or_default();
    let Some(post) = POSTS.iter().find(|p| p.slug == slug) else {
        return Ok(Page::new("Post not found").section(None, [format!("No post called \"{}\".", slug)]));
    };

    Ok(Page::new(post.title)
        .section(Some(post.date), post.body.iter().copied())
        .section(None, ["Back to all posts: /blog"]))
}
