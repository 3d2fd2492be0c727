/* src/server/core/rust/src/page.rs */

use std::sync::Arc;

use serde::Serialize;

use crate::auth::AccessGuard;
use crate::protocol::WidgetService;

/// Display key of the site root in breadcrumbs.
pub const HOME_KEY: &str = "PageHome";

/// A page rendered from a template, optionally behind an access guard.
#[derive(Debug, Clone)]
pub struct StaticPage {
  pub template: String,
  pub guard: Option<AccessGuard>,
}

/// A widget mounted at this page's path.
#[derive(Clone)]
pub struct WidgetMount {
  pub widget: String,
  pub service: Arc<dyn WidgetService>,
}

pub enum PageContent {
  Static(StaticPage),
  Widget(WidgetMount),
}

/// A named mount point in the site tree. A page owns its subtree.
pub struct Page {
  name: String,
  visible: bool,
  content: PageContent,
  children: Vec<Page>,
}

/// Result of resolving a slash-separated path below a page.
#[derive(Clone, Copy)]
pub enum PathLookup<'a> {
  /// Every segment resolved.
  Found(&'a Page),
  /// A segment was missing; carries the deepest page reached.
  Partial(&'a Page),
}

impl<'a> PathLookup<'a> {
  pub fn found(self) -> Option<&'a Page> {
    match self {
      Self::Found(page) => Some(page),
      Self::Partial(_) => None,
    }
  }

  pub fn deepest(self) -> &'a Page {
    match self {
      Self::Found(page) | Self::Partial(page) => page,
    }
  }

  pub fn is_found(self) -> bool {
    matches!(self, Self::Found(_))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavEntry {
  #[serde(rename = "displayKey")]
  pub display_key: String,
  pub url: String,
}

impl Page {
  pub fn static_page(name: impl Into<String>, template: impl Into<String>) -> Self {
    let page = StaticPage { template: template.into(), guard: None };
    Self::with_content(name, PageContent::Static(page))
  }

  pub fn widget(
    name: impl Into<String>,
    widget: impl Into<String>,
    service: Arc<dyn WidgetService>,
  ) -> Self {
    Self::with_content(name, PageContent::Widget(WidgetMount { widget: widget.into(), service }))
  }

  pub fn with_content(name: impl Into<String>, content: PageContent) -> Self {
    Self { name: name.into(), visible: true, content, children: Vec::new() }
  }

  /// Keep the page routable but out of generated navigation.
  pub fn hidden(mut self) -> Self {
    self.visible = false;
    self
  }

  /// Require `action` on `resource_group` before rendering. No effect on
  /// widget pages, whose clients check authorization per operation.
  pub fn guarded(mut self, resource_group: impl Into<String>, action: impl Into<String>) -> Self {
    if let PageContent::Static(ref mut page) = self.content {
      page.guard = Some(AccessGuard::new(resource_group, action));
    }
    self
  }

  pub fn child(mut self, page: Page) -> Self {
    self.add_sub_page(page);
    self
  }

  /// Append a child. Names are not checked for uniqueness; lookups return the
  /// first match.
  pub fn add_sub_page(&mut self, page: Page) {
    self.children.push(page);
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn is_visible(&self) -> bool {
    self.visible
  }

  pub fn content(&self) -> &PageContent {
    &self.content
  }

  pub fn children(&self) -> &[Page] {
    &self.children
  }

  pub fn sub_page(&self, name: &str) -> Option<&Page> {
    if name.is_empty() {
      return None;
    }
    self.children.iter().find(|p| p.name == name)
  }

  pub fn sub_page_mut(&mut self, name: &str) -> Option<&mut Page> {
    if name.is_empty() {
      return None;
    }
    self.children.iter_mut().find(|p| p.name == name)
  }

  /// Attach `page` below the page at `parent_path`. Hands the page back when
  /// the parent does not exist.
  pub fn attach_at(&mut self, parent_path: &str, page: Page) -> Result<(), Page> {
    let mut parent = self;
    for segment in parent_path.split('/').filter(|s| !s.is_empty()) {
      let Some(next) = parent.sub_page_mut(segment) else {
        return Err(page);
      };
      parent = next;
    }
    parent.add_sub_page(page);
    Ok(())
  }

  /// Resolve `a/b/c` segment by segment. Stops at the first missing segment
  /// and reports the deepest page reached as `Partial`.
  pub fn sub_page_with_path(&self, path: &str) -> PathLookup<'_> {
    let mut current = self;
    for segment in path.split('/') {
      match current.sub_page(segment) {
        Some(next) => current = next,
        None => return PathLookup::Partial(current),
      }
    }
    PathLookup::Found(current)
  }

  /// Visible children with their URLs below `base_url`.
  pub fn navigation(&self, base_url: &str) -> Vec<NavEntry> {
    self
      .children
      .iter()
      .filter(|p| p.visible)
      .map(|p| NavEntry { display_key: display_key(&p.name), url: join_url(base_url, &p.name) })
      .collect()
  }

  /// Breadcrumbs for a request path, starting at the root. Best effort: stops
  /// at the first segment that does not resolve to a page.
  pub fn breadcrumbs(&self, request_path: &str) -> Vec<NavEntry> {
    let mut crumbs = vec![NavEntry { display_key: HOME_KEY.to_string(), url: "/".to_string() }];
    let mut current = self;
    let mut url = String::new();
    for segment in request_path.split('/').filter(|s| !s.is_empty()) {
      let Some(next) = current.sub_page(segment) else {
        break;
      };
      url = join_url(&url, segment);
      crumbs.push(NavEntry { display_key: display_key(segment), url: url.clone() });
      current = next;
    }
    crumbs
  }
}

/// `user-admin` -> `PageUserAdmin`.
pub fn display_key(name: &str) -> String {
  let mut key = String::from("Page");
  for part in name.split(['-', '_', ' ', '.']).filter(|p| !p.is_empty()) {
    let mut chars = part.chars();
    if let Some(first) = chars.next() {
      key.extend(first.to_uppercase());
      key.push_str(chars.as_str());
    }
  }
  key
}

/// Join a base URL and a relative path with exactly one slash.
pub fn join_url(base: &str, path: &str) -> String {
  let base = base.trim_end_matches('/');
  let path = path.trim_start_matches('/');
  if path.is_empty() {
    return if base.is_empty() { "/".to_string() } else { base.to_string() };
  }
  format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
  use super::*;

  fn site() -> Page {
    Page::static_page("", "home")
      .child(
        Page::static_page("admin", "admin")
          .child(Page::static_page("role", "role"))
          .child(Page::static_page("user-list", "users").hidden()),
      )
      .child(Page::static_page("about", "about"))
  }

  #[test]
  fn sub_page_by_name() {
    let root = site();
    assert_eq!(root.sub_page("about").map(Page::name), Some("about"));
    assert!(root.sub_page("nope").is_none());
    assert!(root.sub_page("").is_none());
  }

  #[test]
  fn first_match_shadows_duplicates() {
    let root = Page::static_page("", "home")
      .child(Page::static_page("dup", "first"))
      .child(Page::static_page("dup", "second"));
    let PageContent::Static(page) = root.sub_page("dup").unwrap().content() else {
      panic!("expected static page");
    };
    assert_eq!(page.template, "first");
  }

  #[test]
  fn path_resolves_fully() {
    let root = site();
    let lookup = root.sub_page_with_path("admin/role");
    assert!(lookup.is_found());
    assert_eq!(lookup.found().map(Page::name), Some("role"));
  }

  #[test]
  fn path_falls_back_to_deepest_ancestor() {
    let root = site();
    let lookup = root.sub_page_with_path("admin/missing");
    assert!(!lookup.is_found());
    assert!(lookup.found().is_none());
    assert_eq!(lookup.deepest().name(), "admin");
  }

  #[test]
  fn empty_path_is_partial_root() {
    let root = site();
    let lookup = root.sub_page_with_path("");
    assert!(!lookup.is_found());
    assert_eq!(lookup.deepest().name(), "");
  }

  #[test]
  fn navigation_skips_hidden_children() {
    let root = site();
    let admin = root.sub_page("admin").unwrap();
    assert_eq!(
      admin.navigation("/admin"),
      [NavEntry { display_key: "PageRole".into(), url: "/admin/role".into() }]
    );
    assert_eq!(root.navigation("/").len(), 2);
    assert_eq!(root.navigation("/")[0].url, "/admin");
  }

  #[test]
  fn breadcrumbs_stop_at_unknown_segment() {
    let root = site();
    let crumbs = root.breadcrumbs("/admin/role/42");
    let keys: Vec<&str> = crumbs.iter().map(|c| c.display_key.as_str()).collect();
    assert_eq!(keys, ["PageHome", "PageAdmin", "PageRole"]);
    assert_eq!(crumbs[2].url, "/admin/role");

    let crumbs = root.breadcrumbs("/missing/role");
    assert_eq!(crumbs.len(), 1);
  }

  #[test]
  fn display_key_camel_cases() {
    assert_eq!(display_key("user-admin"), "PageUserAdmin");
    assert_eq!(display_key("forum"), "PageForum");
    assert_eq!(display_key("my_blog_posts"), "PageMyBlogPosts");
  }

  #[test]
  fn join_url_normalizes_slashes() {
    assert_eq!(join_url("/", "admin"), "/admin");
    assert_eq!(join_url("", "admin"), "/admin");
    assert_eq!(join_url("/admin/", "/role"), "/admin/role");
    assert_eq!(join_url("/admin", "/"), "/admin");
    assert_eq!(join_url("/", ""), "/");
  }

  #[test]
  fn attach_below_existing_parent() {
    let mut root = site();
    assert!(root.attach_at("/admin/role", Page::static_page("audit", "audit")).is_ok());
    assert!(root.sub_page_with_path("admin/role/audit").is_found());

    let Err(rejected) = root.attach_at("/missing", Page::static_page("x", "x")) else {
      panic!("expected the page back");
    };
    assert_eq!(rejected.name(), "x");
  }

  #[test]
  fn guard_only_applies_to_static_pages() {
    let page = Page::static_page("admin", "admin").guarded("site", "manage");
    let PageContent::Static(inner) = page.content() else {
      panic!("expected static page");
    };
    assert_eq!(inner.guard.as_ref().map(|g| g.action.as_str()), Some("manage"));
  }
}
