//! Live widgets from the site backend. Gated.
//!
//! The widget list is fetched once, when the module loads. A response with
//! an unexpected shape loads fine but fails to render, which the mount's
//! crash boundary turns into its fallback page.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::FutureExt;
use marquee_core::modules::{
    component, LoadFuture, LoadedModule, ModuleDescriptor, ModuleLoadError, RouteContext, RouteTable,
};
use marquee_core::{ApiClient, Page};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const MODULE_ID: &str = "dashboard";

/// Backend endpoint listing the widgets.
const WIDGETS_ENDPOINT: &str = "/widgets";

#[derive(Debug, Clone, Deserialize)]
struct Widget {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    unit: Option<String>,
}

impl Widget {
    fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Widget #{}", self.id))
    }

    fn reading(&self) -> String {
        match (self.value, self.unit.as_deref()) {
            (Some(value), Some(unit)) => format!("{} {}", value, unit),
            (Some(value), None) => value.to_string(),
            (None, _) => "-".to_string(),
        }
    }
}

pub fn descriptor(api: ApiClient) -> ModuleDescriptor {
    let loader = move || -> LoadFuture {
        let api = api.clone();
        async move {
            let payload = api
                .get(WIDGETS_ENDPOINT)
                .await
                .map_err(|e| ModuleLoadError::fetch(MODULE_ID, e.user_message()))?;
            let data = Arc::new(payload.into_value());
            debug!(module = MODULE_ID, "Widget data fetched");
            Ok(LoadedModule::new(routes(data)))
        }
        .boxed()
    };
    ModuleDescriptor::new(MODULE_ID, "Dashboard", "/dashboard", loader).gated()
}

/// Accepts a bare array or a `{"widgets": [...]}` envelope. A single
/// widget object is treated as a list of one.
fn widgets(data: &Value) -> Result<Vec<Widget>> {
    let list = match data {
        Value::Object(map) if map.contains_key("widgets") => map["widgets"].clone(),
        Value::Object(_) => Value::Array(vec![data.clone()]),
        other => other.clone(),
    };
    serde_json::from_value(list).context("Widget data has an unexpected shape")
}

fn routes(data: Arc<Value>) -> RouteTable {
    let index_data = data.clone();
    RouteTable::new(super::not_found("Dashboard"))
        .route(
            "/",
            component(move |ctx: &RouteContext| index(ctx, &index_data)),
        )
        .route(
            "/:id",
            component(move |ctx: &RouteContext| detail(ctx, &data)),
        )
}

fn index(ctx: &RouteContext, data: &Value) -> Result<Page> {
    let widgets = widgets(data)?;
    let viewer = ctx
        .session
        .as_ref()
        .map(|s| format!("Signed in as {} ({})", s.display_name, s.age_display()))
        .unwrap_or_default();

    let lines: Vec<String> = if widgets.is_empty() {
        vec!["No widgets yet.".to_string()]
    } else {
        widgets
            .iter()
            .map(|w| format!("{:>4}  {:<24} {}", w.id, w.label(), w.reading()))
            .collect()
    };

    Ok(Page::new("Dashboard")
        .section(None, [viewer])
        .section(Some("Widgets"), lines))
}

fn detail(ctx: &RouteContext, data: &Value) -> Result<Page> {
    let raw = ctx.param("id").unwrap_or_default();
    let id: u64 = raw
        .parse()
        .with_context(|| format!("Widget id \"{}\" is not a number", raw))?;

    match widgets(data)?.into_iter().find(|w| w.id == id) {
        Some(widget) => Ok(Page::new(widget.label()).section(
            None,
            [format!("Id: {}", widget.id), format!("Reading: {}", widget.reading())],
        )),
        None => Ok(Page::new("Widget not found").section(None, [format!("No widget with id {}.", id)])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_core::modules::Component;
    use serde_json::json;

    fn render(data: Value, subpath: &str) -> Result<Page> {
        let table = routes(Arc::new(data));
        let dispatch = table.dispatch(subpath);
        let ctx = RouteContext {
            subpath: subpath.to_string(),
            params: dispatch.params.clone(),
            ..Default::default()
        };
        dispatch.component.render(&ctx)
    }

    #[test]
    fn test_single_widget_object() {
        let page = render(json!({"id": 1}), "/").unwrap();
        assert!(page.text_lines().any(|l| l.contains("Widget #1")));
    }

    #[test]
    fn test_widget_list_and_envelope() {
        let list = json!([{"id": 1, "name": "Orders", "value": 42.0}, {"id": 2, "name": "Latency", "value": 120.0, "unit": "ms"}]);
        let page = render(list.clone(), "/").unwrap();
        assert!(page.text_lines().any(|l| l.contains("Latency") && l.contains("120 ms")));

        let page = render(json!({"widgets": list}), "/2").unwrap();
        assert_eq!(page.title, "Latency");
    }

    #[test]
    fn test_malformed_data_fails_render() {
        let err = render(json!("maintenance"), "/").unwrap_err();
        assert!(format!("{:#}", err).contains("unexpected shape"));
    }

    #[test]
    fn test_unknown_and_invalid_ids() {
        let data = json!([{"id": 1}]);
        assert_eq!(render(data.clone(), "/9").unwrap().title, "Widget not found");
        assert!(render(data, "/abc").is_err());
    }
}
