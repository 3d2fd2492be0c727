/* src/server/adapter/axum/src/handler/routes.rs */

use std::collections::HashSet;

/// Paths already handed to the router, checked against a shadow of axum's
/// own matcher so a path axum would reject is refused instead of panicking.
pub(super) struct RouteTable {
  matcher: matchit::Router<()>,
  paths: HashSet<String>,
  taken: HashSet<(&'static str, String)>,
}

impl RouteTable {
  pub fn new() -> Self {
    Self { matcher: matchit::Router::new(), paths: HashSet::new(), taken: HashSet::new() }
  }

  /// Reserve `method path`. Several methods may share one path; anything the
  /// matcher cannot hold alongside the paths already claimed is an error.
  pub fn claim(&mut self, method: &'static str, path: &str) -> Result<(), String> {
    if self.taken.contains(&(method, path.to_string())) {
      return Err("route already taken".to_string());
    }
    if !self.paths.contains(path) {
      check_segments(path)?;
      self.matcher.insert(path, ()).map_err(|e| e.to_string())?;
      self.paths.insert(path.to_string());
    }
    self.taken.insert((method, path.to_string()));
    Ok(())
  }
}

// axum refuses these before the matcher sees them.
fn check_segments(path: &str) -> Result<(), String> {
  if !path.starts_with('/') {
    return Err("path must start with '/'".to_string());
  }
  match path.split('/').find(|s| s.starts_with(':') || s.starts_with('*')) {
    Some(segment) => Err(format!("segment '{segment}' uses the old parameter syntax")),
    None => Ok(()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn methods_share_a_path() {
    let mut table = RouteTable::new();
    assert!(table.claim("GET", "/forum/{id}").is_ok());
    assert!(table.claim("POST", "/forum/{id}").is_ok());
    assert!(table.claim("GET", "/forum/{id}").is_err());
  }

  #[test]
  fn renamed_parameter_conflicts() {
    let mut table = RouteTable::new();
    assert!(table.claim("POST", "/forum/{id}").is_ok());
    assert!(table.claim("GET", "/forum/{thread}").is_err());
  }

  #[test]
  fn malformed_markers_are_refused() {
    let mut table = RouteTable::new();
    assert!(table.claim("GET", "/bad/{").is_err());
    assert!(table.claim("GET", "/bad/:id").is_err());
    assert!(table.claim("GET", "/bad/*rest").is_err());
    assert!(table.claim("GET", "bad").is_err());
    assert!(table.claim("GET", "/bad/{id}").is_ok());
  }
}
