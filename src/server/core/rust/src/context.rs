/* src/server/core/rust/src/context.rs */

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::session::Session;

pub const PATH_PREFIX: &str = "path/";
pub const QUERY_PREFIX: &str = "query/";
pub const FORM_KEY: &str = "Form";
pub const SESSION_KEY: &str = "Session";
pub const USER_ID_KEY: &str = "UserId";
pub const URL_KEY: &str = "Url";

/// A file submitted through a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
  pub field: String,
  pub file_name: String,
  pub content_type: Option<String>,
  pub data: Bytes,
}

/// Per-request data bag handed to a widget action.
///
/// Keys keep insertion order. Path parameters live under `path/<name>`,
/// declared query parameters under `query/<name>`, submitted form fields under
/// `Form`, and the visitor session snapshot under `Session`.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
  values: Map<String, Value>,
  files: Vec<UploadedFile>,
}

impl RequestContext {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
    self.values.insert(key.into(), value.into());
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.values.get(key)
  }

  pub fn get_str(&self, key: &str) -> Option<&str> {
    self.values.get(key).and_then(Value::as_str)
  }

  pub fn set_path_param(&mut self, name: &str, value: impl Into<String>) {
    self.insert(format!("{PATH_PREFIX}{name}"), value.into());
  }

  pub fn path_param(&self, name: &str) -> Option<&str> {
    self.get_str(&format!("{PATH_PREFIX}{name}"))
  }

  pub fn set_query(&mut self, name: &str, value: impl Into<String>) {
    self.insert(format!("{QUERY_PREFIX}{name}"), value.into());
  }

  pub fn query(&self, name: &str) -> Option<&str> {
    self.get_str(&format!("{QUERY_PREFIX}{name}"))
  }

  pub fn set_form(&mut self, form: Map<String, Value>) {
    self.values.insert(FORM_KEY.to_string(), Value::Object(form));
  }

  /// A submitted form field. Repeated fields yield their first value.
  pub fn form(&self, name: &str) -> Option<&str> {
    match self.values.get(FORM_KEY)?.get(name)? {
      Value::String(s) => Some(s),
      Value::Array(items) => items.first().and_then(Value::as_str),
      _ => None,
    }
  }

  pub fn set_session(&mut self, session: &Session) {
    self.values.insert(SESSION_KEY.to_string(), session.snapshot());
  }

  pub fn session(&self, key: &str) -> Option<&str> {
    self.values.get(SESSION_KEY)?.get(key)?.as_str()
  }

  pub fn set_identity(&mut self, user_id: Option<&str>, url: &str) {
    self.insert(USER_ID_KEY, user_id.unwrap_or_default());
    self.insert(URL_KEY, url);
  }

  /// The signed-in visitor, if any. An empty id means anonymous.
  pub fn user_id(&self) -> Option<&str> {
    self.get_str(USER_ID_KEY).filter(|id| !id.is_empty())
  }

  pub fn url(&self) -> Option<&str> {
    self.get_str(URL_KEY)
  }

  pub fn attach_files(&mut self, files: Vec<UploadedFile>) {
    self.files = files;
  }

  pub fn files(&self) -> &[UploadedFile] {
    &self.files
  }

  pub fn file(&self, field: &str) -> Option<&UploadedFile> {
    self.files.iter().find(|f| f.field == field)
  }

  pub fn values(&self) -> &Map<String, Value> {
    &self.values
  }

  /// Merge render data returned by a widget; later keys overwrite earlier ones.
  pub fn merge(&mut self, data: Map<String, Value>) {
    for (k, v) in data {
      self.values.insert(k, v);
    }
  }

  pub fn into_value(self) -> Value {
    Value::Object(self.values)
  }
}
