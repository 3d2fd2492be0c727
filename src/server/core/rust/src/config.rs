/* src/server/core/rust/src/config.rs */

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteConfig {
  #[serde(default)]
  pub site: SiteSection,
  #[serde(default)]
  pub session: SessionSection,
  #[serde(default)]
  pub errors: ErrorsSection,
  #[serde(default)]
  pub widgets: Vec<WidgetSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteSection {
  /// Cookie `Domain` attribute. Empty omits it.
  #[serde(default)]
  pub domain: String,
  #[serde(default = "default_listen")]
  pub listen: String,
  #[serde(default = "default_error_page")]
  pub error_page: String,
  #[serde(default = "default_unauthorized_page")]
  pub unauthorized_page: String,
}

impl Default for SiteSection {
  fn default() -> Self {
    Self {
      domain: String::new(),
      listen: default_listen(),
      error_page: default_error_page(),
      unauthorized_page: default_unauthorized_page(),
    }
  }
}

fn default_listen() -> String {
  "0.0.0.0:3000".to_string()
}

fn default_error_page() -> String {
  "/error".to_string()
}

fn default_unauthorized_page() -> String {
  "/unauthorized".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
  #[serde(default = "default_cookie_name")]
  pub cookie_name: String,
  /// Rolling expiry, refreshed on every request.
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for SessionSection {
  fn default() -> Self {
    Self { cookie_name: default_cookie_name(), timeout_secs: default_timeout_secs() }
  }
}

fn default_cookie_name() -> String {
  "trellis-session".to_string()
}

fn default_timeout_secs() -> u64 {
  86_400
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorsSection {
  /// Extra error identifiers a widget may surface to visitors.
  #[serde(default)]
  pub allow: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WidgetSection {
  pub name: String,
  pub path: String,
}

impl SiteConfig {
  pub fn validate(&self) -> Result<()> {
    if self.session.timeout_secs == 0 {
      bail!("session.timeout_secs must be greater than zero");
    }
    let name = &self.session.cookie_name;
    if name.is_empty() {
      bail!("session.cookie_name must not be empty");
    }
    if name.chars().any(|c| c == ';' || c == '=' || c == ',' || c.is_whitespace()) {
      bail!("session.cookie_name \"{name}\" contains a reserved character");
    }
    let domain = &self.site.domain;
    if !domain.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-') {
      bail!("site.domain \"{}\" is not a plain host name", domain.escape_debug());
    }
    let pages = [
      ("site.error_page", &self.site.error_page),
      ("site.unauthorized_page", &self.site.unauthorized_page),
    ];
    for (key, page) in pages {
      if !page.starts_with('/') {
        bail!("{key} must start with '/', got \"{page}\"");
      }
    }

    let mut seen = HashSet::new();
    for widget in &self.widgets {
      if widget.name.is_empty() {
        bail!("widgets: name must not be empty");
      }
      if !seen.insert(widget.name.as_str()) {
        bail!("duplicate widget name: {}", widget.name);
      }
      if !widget.path.starts_with('/') {
        bail!("widget \"{}\" path must start with '/', got \"{}\"", widget.name, widget.path);
      }
    }
    Ok(())
  }
}

pub fn load_site_config(path: &Path) -> Result<SiteConfig> {
  let content =
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
  let config = parse_site_config(&content)
    .with_context(|| format!("invalid site config {}", path.display()))?;
  Ok(config)
}

pub fn parse_site_config(content: &str) -> Result<SiteConfig> {
  let config: SiteConfig = toml::from_str(content).context("failed to parse site config")?;
  config.validate()?;
  Ok(config)
}
