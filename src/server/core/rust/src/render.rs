/* src/server/core/rust/src/render.rs */

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::errors::TrellisError;

/// Template engine capability consumed by the dispatch layer.
pub trait TemplateRenderer: Send + Sync {
  fn render(&self, template: &str, data: &Value) -> Result<String, TrellisError>;
}

const SLOT_OPEN: &str = "<!--trellis:";
const SLOT_CLOSE: &str = "-->";

/// Minimal slot renderer over a set of named templates.
///
/// `<!--trellis:a.b-->` inserts the HTML-escaped value at `a.b`;
/// `<!--trellis:a.b:html-->` inserts it verbatim. Missing values render empty.
#[derive(Debug, Default, Clone)]
pub struct SlotRenderer {
  templates: HashMap<String, String>,
}

impl SlotRenderer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
    self.templates.insert(name.into(), source.into());
    self
  }

  /// Load every `*.html` file in `dir`, named by file stem.
  pub fn load_dir(mut self, dir: &Path) -> std::io::Result<Self> {
    for entry in std::fs::read_dir(dir)? {
      let path = entry?.path();
      if path.extension().and_then(|e| e.to_str()) != Some("html") {
        continue;
      }
      if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        let source = std::fs::read_to_string(&path)?;
        self.templates.insert(stem.to_string(), source);
      }
    }
    Ok(self)
  }
}

impl TemplateRenderer for SlotRenderer {
  fn render(&self, template: &str, data: &Value) -> Result<String, TrellisError> {
    let source = self
      .templates
      .get(template)
      .ok_or_else(|| TrellisError::technical(format!("template '{template}' not found")))?;
    Ok(fill_slots(source, data))
  }
}

fn fill_slots(source: &str, data: &Value) -> String {
  let mut out = String::with_capacity(source.len());
  let mut rest = source;
  while let Some(start) = rest.find(SLOT_OPEN) {
    out.push_str(&rest[..start]);
    let after = &rest[start + SLOT_OPEN.len()..];
    let Some(end) = after.find(SLOT_CLOSE) else {
      out.push_str(&rest[start..]);
      return out;
    };
    let slot = after[..end].trim();
    let (path, raw) = match slot.strip_suffix(":html") {
      Some(path) => (path, true),
      None => (slot, false),
    };
    let value = resolve(path, data).map(stringify).unwrap_or_default();
    if raw {
      out.push_str(&value);
    } else {
      out.push_str(&escape_html(&value));
    }
    rest = &after[end + SLOT_CLOSE.len()..];
  }
  out.push_str(rest);
  out
}

pub(crate) fn resolve<'a>(path: &str, data: &'a Value) -> Option<&'a Value> {
  let mut current = data;
  for key in path.split('.') {
    current = current.get(key)?;
  }
  Some(current)
}

pub(crate) fn stringify(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

pub fn escape_html(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#x27;"),
      _ => out.push(c),
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn render(source: &str, data: Value) -> String {
    SlotRenderer::new().template("t", source).render("t", &data).unwrap()
  }

  #[test]
  fn text_slot_basic() {
    assert_eq!(render("<p><!--trellis:name--></p>", json!({"name": "Alice"})), "<p>Alice</p>");
  }

  #[test]
  fn text_slot_escapes_html() {
    assert_eq!(
      render("<p><!--trellis:msg--></p>", json!({"msg": "<b>\"x\"</b>"})),
      "<p>&lt;b&gt;&quot;x&quot;&lt;/b&gt;</p>"
    );
  }

  #[test]
  fn html_slot_is_verbatim() {
    assert_eq!(render("<!--trellis:body:html-->", json!({"body": "<b>x</b>"})), "<b>x</b>");
  }

  #[test]
  fn nested_path_and_namespaced_keys() {
    let data = json!({"Session": {"lang": "fr"}, "path/id": "7"});
    assert_eq!(render("<!--trellis:Session.lang-->/<!--trellis:path/id-->", data), "fr/7");
  }

  #[test]
  fn missing_value_renders_empty() {
    assert_eq!(render("[<!--trellis:nope-->]", json!({})), "[]");
  }

  #[test]
  fn unterminated_slot_is_left_alone() {
    assert_eq!(render("a<!--trellis:x", json!({"x": 1})), "a<!--trellis:x");
  }

  #[test]
  fn unknown_template_is_technical_error() {
    let err = SlotRenderer::new().render("missing", &json!({})).unwrap_err();
    assert_eq!(err.code(), "TECHNICAL_ERROR");
  }
}
