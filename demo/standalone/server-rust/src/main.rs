/* demo/standalone/server-rust/src/main.rs */

mod widgets;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use trellis_server::{
  LocalWidgetService, Page, RoleTable, Site, SlotRenderer, WidgetManager, WidgetService,
  load_site_config,
};
use trellis_server_axum::IntoAxumRouter;

use widgets::guestbook::Guestbook;
use widgets::remote::OfflineBackend;

const DEFAULT_FILTER: &str =
  "trellis_server=debug,trellis_server_axum=debug,trellis_demo=debug,info";

fn site_tree() -> Page {
  Page::static_page("", "home")
    .child(Page::static_page("about", "about"))
    .child(
      Page::static_page("admin", "admin")
        .guarded("site", "manage")
        .child(Page::static_page("roles", "role").guarded("site", "manage")),
    )
    .child(Page::static_page("error", "error").hidden())
    .child(Page::static_page("unauthorized", "unauthorized").hidden())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config_path = std::env::var_os("TRELLIS_CONFIG")
    .map_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("site.toml"), PathBuf::from);
  let config = load_site_config(&config_path)?;
  let templates = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates");
  let renderer = SlotRenderer::new().load_dir(&templates)?;

  let mut manager = WidgetManager::new();
  widgets::guestbook::register(&mut manager, Arc::new(Guestbook::default()));
  widgets::account::register(&mut manager);
  let local: Arc<dyn WidgetService> = Arc::new(LocalWidgetService::new(manager));

  let listen = config.site.listen.clone();
  tracing::info!(config = %config_path.display(), widgets = config.widgets.len(), "booting demo");
  Site::new(site_tree())
    .config(config)
    .auth(Arc::new(RoleTable::new().grant("alice", "site", "manage")))
    .renderer(Arc::new(renderer))
    .widget_backend("guestbook", local.clone())
    .widget_backend("account", local)
    .widget_backend("weather", Arc::new(OfflineBackend::new("weather.internal:7000")))
    .serve(&listen)
    .await
}
