/* src/server/core/rust/src/protocol.rs */

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::{RequestContext, SESSION_KEY, UploadedFile};
use crate::errors::TrellisError;
use crate::widget::{ActionKind, ActionOutcome, RenderOutcome, WidgetManager};

/// Wire descriptor of one widget action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAction {
  pub kind: ActionKind,
  pub name: String,
  pub path: String,
  #[serde(default, rename = "queryNames")]
  pub query_names: Vec<String>,
}

/// Raw result of `process` as it crosses a process boundary.
///
/// A non-empty `redirect` wins. Otherwise a non-empty `template` means the
/// payload is a JSON object of render data; an empty `template` means the
/// payload is raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReply {
  pub redirect: String,
  pub template: String,
  pub payload: Bytes,
}

impl ProcessReply {
  pub fn redirect(target: impl Into<String>) -> Self {
    Self { redirect: target.into(), ..Self::default() }
  }

  pub fn raw(payload: impl Into<Bytes>) -> Self {
    Self { payload: payload.into(), ..Self::default() }
  }

  pub fn render(template: impl Into<String>, data: &Map<String, Value>) -> Self {
    let payload = serde_json::to_vec(data).unwrap_or_else(|_| b"{}".to_vec());
    Self { template: template.into(), payload: payload.into(), ..Self::default() }
  }

  /// Encode an in-process outcome. Session entries travel under the reserved
  /// `Session` key of the payload object.
  pub fn from_outcome(outcome: ActionOutcome) -> Self {
    match outcome {
      ActionOutcome::Redirect(target) => Self::redirect(target),
      ActionOutcome::Raw(bytes) => Self::raw(bytes),
      ActionOutcome::Render(render) => {
        let mut data = render.data;
        if !render.session.is_empty() {
          let session = render.session.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
          data.insert(SESSION_KEY.to_string(), Value::Object(session));
        }
        Self::render(render.template, &data)
      }
    }
  }

  /// Decode into an outcome. `Raw` actions always yield raw bytes unless a
  /// redirect was requested.
  pub fn into_outcome(self, kind: ActionKind) -> Result<ActionOutcome, TrellisError> {
    if !self.redirect.is_empty() {
      return Ok(ActionOutcome::Redirect(self.redirect));
    }
    if kind.is_raw() || self.template.is_empty() {
      return Ok(ActionOutcome::Raw(self.payload));
    }

    let mut data: Map<String, Value> = serde_json::from_slice(&self.payload)
      .map_err(|e| TrellisError::technical(format!("unreadable widget payload: {e}")))?;

    let mut session = BTreeMap::new();
    if let Some(raw) = data.remove(SESSION_KEY) {
      let Value::Object(entries) = raw else {
        return Err(TrellisError::technical("widget session payload is not an object"));
      };
      for (k, v) in entries {
        let value = match v {
          Value::String(s) => s,
          Value::Null => String::new(),
          other => other.to_string(),
        };
        session.insert(k, value);
      }
    }

    Ok(ActionOutcome::Render(RenderOutcome { template: self.template, data, session }))
  }
}

/// Uniform capability of a widget backend, in-process or remote.
#[async_trait]
pub trait WidgetService: Send + Sync {
  async fn get_desc(&self, widget: &str) -> Result<Vec<RemoteAction>, TrellisError>;

  async fn process(
    &self,
    widget: &str,
    action: &str,
    ctx: RequestContext,
    files: Vec<UploadedFile>,
  ) -> Result<ProcessReply, TrellisError>;
}

/// Serves the widgets of a `WidgetManager` through `WidgetService`.
pub struct LocalWidgetService {
  manager: Arc<WidgetManager>,
}

impl LocalWidgetService {
  pub fn new(manager: WidgetManager) -> Self {
    Self { manager: Arc::new(manager) }
  }

  pub fn shared(manager: Arc<WidgetManager>) -> Self {
    Self { manager }
  }
}

#[async_trait]
impl WidgetService for LocalWidgetService {
  async fn get_desc(&self, widget: &str) -> Result<Vec<RemoteAction>, TrellisError> {
    self
      .manager
      .widget(widget)
      .map(|w| w.describe())
      .ok_or_else(|| TrellisError::not_found(format!("widget '{widget}' is not registered")))
  }

  async fn process(
    &self,
    widget: &str,
    action: &str,
    mut ctx: RequestContext,
    files: Vec<UploadedFile>,
  ) -> Result<ProcessReply, TrellisError> {
    let handler = self
      .manager
      .widget(widget)
      .and_then(|w| w.action(action))
      .map(|a| a.handler.clone())
      .ok_or_else(|| TrellisError::not_found(format!("action '{widget}.{action}' not found")))?;
    ctx.attach_files(files);
    let outcome = handler(ctx).await?;
    Ok(ProcessReply::from_outcome(outcome))
  }
}
