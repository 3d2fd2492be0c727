/* src/server/adapter/axum/src/handler/mod.rs */

mod page;
mod routes;
mod session;
mod widget;


use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::routing::{MethodFilter, get, on};
use serde_json::{Map, Value};
use trellis_server::page::join_url;
use trellis_server::{
  ActionKind, AuthService, ErrorFilter, MountedAction, NavEntry, Page, PageContent, SessionManager,
  SiteConfig, SiteParts, StaticPage, TemplateRenderer, TrellisError, WidgetMount,
  describe_widget,
};

use routes::RouteTable;
use crate::error::AxumError;

pub(crate) use session::Visit;

pub(crate) struct StaticRoute {
  pub page: StaticPage,
  pub sub_navigation: Vec<NavEntry>,
}

pub(crate) struct AppState {
  pub root: Page,
  pub sessions: SessionManager,
  pub auth: Arc<dyn AuthService>,
  pub renderer: Arc<dyn TemplateRenderer>,
  pub errors: ErrorFilter,
  pub config: SiteConfig,
  pub static_pages: HashMap<String, StaticRoute>,
  pub navigation: Vec<NavEntry>,
}

impl AppState {
  /// Breadcrumbs and site navigation every rendered page receives.
  pub fn ambient_data(&self, request_path: &str) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("Breadcrumbs".into(), to_value(&self.root.breadcrumbs(request_path)));
    data.insert("Navigation".into(), to_value(&self.navigation));
    data
  }

  pub fn render(&self, template: &str, data: &Value) -> Result<String, TrellisError> {
    self.renderer.render(template, data)
  }
}

fn to_value<T: serde::Serialize + ?Sized>(value: &T) -> Value {
  serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Walk the page tree. Static pages become routes at their tree path; widget
/// pages are collected for the description phase. Earlier pages shadow later
/// ones with the same URL.
fn collect_pages(
  page: &Page,
  url: &str,
  statics: &mut HashMap<String, StaticRoute>,
  mounts: &mut Vec<(String, WidgetMount)>,
) {
  match page.content() {
    PageContent::Static(inner) => {
      statics.entry(url.to_string()).or_insert_with(|| StaticRoute {
        page: inner.clone(),
        sub_navigation: page.navigation(url),
      });
    }
    PageContent::Widget(mount) => mounts.push((url.to_string(), mount.clone())),
  }
  for child in page.children() {
    collect_pages(child, &join_url(url, child.name()), statics, mounts);
  }
}

fn method_filter(kind: ActionKind) -> MethodFilter {
  match kind {
    ActionKind::Get | ActionKind::Raw => MethodFilter::GET,
    ActionKind::Head => MethodFilter::HEAD,
    ActionKind::Post => MethodFilter::POST,
    ActionKind::Put => MethodFilter::PUT,
    ActionKind::Patch => MethodFilter::PATCH,
    ActionKind::Delete => MethodFilter::DELETE,
    ActionKind::Connect => MethodFilter::CONNECT,
    ActionKind::Options => MethodFilter::OPTIONS,
    ActionKind::Trace => MethodFilter::TRACE,
  }
}

pub(crate) async fn build_router(parts: SiteParts) -> Router {
  let mut static_pages = HashMap::new();
  let mut mounts = Vec::new();
  collect_pages(&parts.root, "/", &mut static_pages, &mut mounts);

  let mut router = Router::new();
  let mut table = RouteTable::new();

  let mut urls: Vec<String> = static_pages.keys().cloned().collect();
  urls.sort();
  for url in urls {
    if let Err(reason) = table.claim("GET", &url) {
      tracing::error!(%url, %reason, "static page not mounted");
      static_pages.remove(&url);
      continue;
    }
    router = router.route(&url, get(page::handle_page));
  }

  // Description phase: one catalogue fetch per widget, cached in the routes.
  for (base, mount) in &mounts {
    for action in describe_widget(&mount.widget, &mount.service).await {
      let path = action.route_path(base);
      if let Err(reason) = table.claim(action.method(), &path) {
        tracing::error!(
          widget = %mount.widget,
          action = %action.action.name,
          method = action.method(),
          %path,
          %reason,
          "action not mounted"
        );
        continue;
      }
      tracing::debug!(widget = %mount.widget, action = %action.action.name, %path, "mounted");
      let filter = method_filter(action.action.kind);
      let action = Arc::new(action);
      router = router.route(
        &path,
        on(filter, move |req: axum::extract::Request| {
          let action: Arc<MountedAction> = action.clone();
          async move { widget::handle_action(action, req).await }
        }),
      );
    }
  }

  let navigation = parts.root.navigation("/");
  let state = Arc::new(AppState {
    root: parts.root,
    sessions: parts.sessions,
    auth: parts.auth,
    renderer: parts.renderer,
    errors: parts.errors,
    config: parts.config,
    static_pages,
    navigation,
  });

  router
    .fallback(handle_not_found)
    .layer(axum::middleware::from_fn_with_state(state, session::visit_layer))
}

async fn handle_not_found(uri: axum::http::Uri) -> AxumError {
  TrellisError::not_found(format!("no route for {}", uri.path())).into()
}
