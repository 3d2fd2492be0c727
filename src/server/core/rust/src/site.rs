/* src/server/core/rust/src/site.rs */

use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::{AllowAll, AuthService};
use crate::config::SiteConfig;
use crate::errors::ErrorFilter;
use crate::page::Page;
use crate::protocol::WidgetService;
use crate::render::{SlotRenderer, TemplateRenderer};
use crate::session::{CookieSettings, MemorySessionStore, SessionManager, SessionStore};

/// Framework-agnostic parts extracted from `Site`.
/// Adapter crates consume this to build framework-specific routers.
pub struct SiteParts {
  pub root: Page,
  pub sessions: SessionManager,
  pub auth: Arc<dyn AuthService>,
  pub renderer: Arc<dyn TemplateRenderer>,
  pub errors: ErrorFilter,
  pub config: SiteConfig,
}

pub struct Site {
  root: Page,
  config: SiteConfig,
  store: Arc<dyn SessionStore>,
  auth: Arc<dyn AuthService>,
  renderer: Arc<dyn TemplateRenderer>,
  backends: HashMap<String, Arc<dyn WidgetService>>,
}

impl Site {
  pub fn new(root: Page) -> Self {
    Self {
      root,
      config: SiteConfig::default(),
      store: Arc::new(MemorySessionStore::new()),
      auth: Arc::new(AllowAll),
      renderer: Arc::new(SlotRenderer::new()),
      backends: HashMap::new(),
    }
  }

  pub fn config(mut self, config: SiteConfig) -> Self {
    self.config = config;
    self
  }

  pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
    self.store = store;
    self
  }

  pub fn auth(mut self, auth: Arc<dyn AuthService>) -> Self {
    self.auth = auth;
    self
  }

  pub fn renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
    self.renderer = renderer;
    self
  }

  /// Backend serving the configured widget `name`.
  pub fn widget_backend(
    mut self,
    name: impl Into<String>,
    service: Arc<dyn WidgetService>,
  ) -> Self {
    self.backends.insert(name.into(), service);
    self
  }

  /// Consume the builder. Every `[[widgets]]` entry is attached to the page
  /// tree at its configured path; entries without a backend or without an
  /// existing parent page are skipped with a warning.
  pub fn into_parts(self) -> SiteParts {
    let mut root = self.root;
    for entry in &self.config.widgets {
      let Some(service) = self.backends.get(&entry.name) else {
        tracing::warn!(widget = %entry.name, "no backend registered, widget skipped");
        continue;
      };
      let path = entry.path.trim_end_matches('/');
      let split = path.rsplit_once('/').filter(|(_, leaf)| !leaf.is_empty());
      let Some((parent, leaf)) = split else {
        tracing::warn!(widget = %entry.name, path = %entry.path, "widget path has no segment");
        continue;
      };
      let page = Page::widget(leaf, entry.name.clone(), service.clone());
      if root.attach_at(parent, page).is_err() {
        tracing::warn!(widget = %entry.name, path = %entry.path, "parent page missing, skipped");
      }
    }

    let cookie = CookieSettings::from_config(&self.config.session, &self.config.site.domain);
    let errors = ErrorFilter::new().allow(self.config.errors.allow.iter().cloned());

    SiteParts {
      root,
      sessions: SessionManager::new(self.store, cookie),
      auth: self.auth,
      renderer: self.renderer,
      errors,
      config: self.config,
    }
  }
}
