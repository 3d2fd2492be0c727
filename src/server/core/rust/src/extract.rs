/* src/server/core/rust/src/extract.rs */

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::context::{RequestContext, USER_ID_KEY};
use crate::protocol::RemoteAction;
use crate::session::Session;

// `{name}` or catch-all `{*name}` segments, axum route syntax.
static PARAM_MARKER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\{\*?([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));

/// Names of the parameter markers in a path pattern, in order.
pub fn path_param_names(pattern: &str) -> Vec<String> {
  PARAM_MARKER.captures_iter(pattern).map(|c| c[1].to_string()).collect()
}

/// Raw request pieces the adapter hands to an extractor.
#[derive(Debug, Default)]
pub struct RequestParts<'a> {
  pub path_values: &'a [(String, String)],
  pub query: &'a [(String, String)],
  pub form: &'a [(String, String)],
  pub session: Option<&'a Session>,
  pub url: &'a str,
}

/// Per-action rules for building a `RequestContext`. Built once at mount
/// time from the action descriptor.
#[derive(Debug, Clone)]
pub struct ContextExtractor {
  path_params: Vec<String>,
  query_names: Vec<String>,
  reads_form: bool,
}

impl ContextExtractor {
  pub fn for_action(action: &RemoteAction) -> Self {
    Self {
      path_params: path_param_names(&action.path),
      query_names: action.query_names.clone(),
      reads_form: action.kind.carries_body(),
    }
  }

  pub fn path_params(&self) -> &[String] {
    &self.path_params
  }

  pub fn reads_form(&self) -> bool {
    self.reads_form
  }

  /// Build the data bag. Only declared query names are forwarded; repeated
  /// query names keep their first value. Form fields are read only for
  /// body-bearing verbs, and repeated form fields become arrays.
  pub fn extract(&self, parts: &RequestParts<'_>) -> RequestContext {
    let mut ctx = RequestContext::new();

    for name in &self.path_params {
      if let Some((_, value)) = parts.path_values.iter().find(|(k, _)| k == name) {
        ctx.set_path_param(name, value.clone());
      }
    }

    for name in &self.query_names {
      if let Some((_, value)) = parts.query.iter().find(|(k, _)| k == name) {
        ctx.set_query(name, value.clone());
      }
    }

    if self.reads_form {
      ctx.set_form(form_map(parts.form));
    }

    if let Some(session) = parts.session {
      ctx.set_session(session);
      ctx.set_identity(session.get(USER_ID_KEY), parts.url);
    } else {
      ctx.set_identity(None, parts.url);
    }
    ctx
  }
}

fn form_map(fields: &[(String, String)]) -> Map<String, Value> {
  let mut form = Map::new();
  for (k, v) in fields {
    let value = Value::String(v.clone());
    match form.get_mut(k) {
      Some(Value::Array(items)) => items.push(value),
      Some(existing) => {
        let first = existing.take();
        *existing = Value::Array(vec![first, value]);
      }
      None => {
        form.insert(k.clone(), value);
      }
    }
  }
  form
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use serde_json::json;

  use super::*;
  use crate::widget::ActionKind;

  fn action(kind: ActionKind, path: &str, query: &[&str]) -> RemoteAction {
    RemoteAction {
      kind,
      name: "a".into(),
      path: path.into(),
      query_names: query.iter().map(|s| s.to_string()).collect(),
    }
  }

  fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  #[test]
  fn scans_param_markers() {
    assert_eq!(path_param_names("/post/{id}/comment/{cid}"), ["id", "cid"]);
    assert_eq!(path_param_names("/files/{*rest}"), ["rest"]);
    assert!(path_param_names("/static/page").is_empty());
  }

  #[test]
  fn only_declared_query_names_are_forwarded() {
    let ex = ContextExtractor::for_action(&action(ActionKind::Get, "/", &["a"]));
    let query = pairs(&[("a", "1"), ("b", "2")]);
    let ctx = ex.extract(&RequestParts { query: &query, url: "/?a=1&b=2", ..Default::default() });
    assert_eq!(ctx.get_str("query/a"), Some("1"));
    assert!(ctx.values().keys().all(|k| !k.contains('b')));
  }

  #[test]
  fn repeated_query_keeps_first_value() {
    let ex = ContextExtractor::for_action(&action(ActionKind::Get, "/", &["tag"]));
    let query = pairs(&[("tag", "x"), ("tag", "y")]);
    let ctx = ex.extract(&RequestParts { query: &query, ..Default::default() });
    assert_eq!(ctx.query("tag"), Some("x"));
  }

  #[test]
  fn path_and_query_of_same_name_do_not_collide() {
    let ex = ContextExtractor::for_action(&action(ActionKind::Get, "/item/{id}", &["id"]));
    let path_values = pairs(&[("id", "7")]);
    let query = pairs(&[("id", "9")]);
    let ctx =
      ex.extract(&RequestParts { path_values: &path_values, query: &query, ..Default::default() });
    assert_eq!(ctx.path_param("id"), Some("7"));
    assert_eq!(ctx.query("id"), Some("9"));
  }

  #[test]
  fn body_verbs_read_form_others_do_not() {
    let form = pairs(&[("title", "hi"), ("tag", "a"), ("tag", "b")]);
    let post = ContextExtractor::for_action(&action(ActionKind::Post, "/", &[]));
    let ctx = post.extract(&RequestParts { form: &form, ..Default::default() });
    assert_eq!(ctx.get("Form"), Some(&json!({"title": "hi", "tag": ["a", "b"]})));

    let get = ContextExtractor::for_action(&action(ActionKind::Get, "/", &[]));
    let ctx = get.extract(&RequestParts { form: &form, ..Default::default() });
    assert!(ctx.get("Form").is_none());
  }

  #[test]
  fn session_and_identity_are_injected() {
    let session = Session::from_data(BTreeMap::from([
      ("UserId".to_string(), "alice".to_string()),
      ("lang".to_string(), "fr".to_string()),
    ]));
    let ex = ContextExtractor::for_action(&action(ActionKind::Get, "/", &[]));
    let ctx =
      ex.extract(&RequestParts { session: Some(&session), url: "/forum", ..Default::default() });
    assert_eq!(ctx.session("lang"), Some("fr"));
    assert_eq!(ctx.user_id(), Some("alice"));
    assert_eq!(ctx.url(), Some("/forum"));
  }
}
