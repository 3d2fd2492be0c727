/* src/server/core/rust/src/widget.rs */

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::RequestContext;
use crate::errors::TrellisError;
use crate::protocol::RemoteAction;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

pub type ActionHandler =
  Arc<dyn Fn(RequestContext) -> BoxFuture<Result<ActionOutcome, TrellisError>> + Send + Sync>;

/// HTTP verb of an action, plus the `Raw` pseudo-verb.
///
/// Serialized as its ordinal, which is stable on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ActionKind {
  Get,
  Head,
  Post,
  Put,
  Patch,
  Delete,
  Connect,
  Options,
  Trace,
  /// Respond with raw bytes and a sniffed content type. Mounted as GET.
  Raw,
}

const KINDS: [ActionKind; 10] = [
  ActionKind::Get,
  ActionKind::Head,
  ActionKind::Post,
  ActionKind::Put,
  ActionKind::Patch,
  ActionKind::Delete,
  ActionKind::Connect,
  ActionKind::Options,
  ActionKind::Trace,
  ActionKind::Raw,
];

impl ActionKind {
  pub fn ordinal(self) -> u8 {
    self as u8
  }

  pub fn from_ordinal(n: u8) -> Option<Self> {
    KINDS.get(usize::from(n)).copied()
  }

  /// The HTTP method the action is mounted under.
  pub fn method(self) -> &'static str {
    match self {
      Self::Get | Self::Raw => "GET",
      Self::Head => "HEAD",
      Self::Post => "POST",
      Self::Put => "PUT",
      Self::Patch => "PATCH",
      Self::Delete => "DELETE",
      Self::Connect => "CONNECT",
      Self::Options => "OPTIONS",
      Self::Trace => "TRACE",
    }
  }

  pub fn carries_body(self) -> bool {
    matches!(self, Self::Post | Self::Put | Self::Patch)
  }

  pub fn is_raw(self) -> bool {
    self == Self::Raw
  }
}

impl From<ActionKind> for u8 {
  fn from(kind: ActionKind) -> Self {
    kind.ordinal()
  }
}

impl TryFrom<u8> for ActionKind {
  type Error = String;

  fn try_from(n: u8) -> Result<Self, Self::Error> {
    Self::from_ordinal(n).ok_or_else(|| format!("unknown action kind {n}"))
  }
}

/// Data for a template render, plus session entries the widget wants stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOutcome {
  pub template: String,
  pub data: Map<String, Value>,
  pub session: BTreeMap<String, String>,
}

impl RenderOutcome {
  pub fn new(template: impl Into<String>) -> Self {
    Self { template: template.into(), ..Self::default() }
  }

  pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.data.insert(key.into(), value.into());
    self
  }

  pub fn store_session(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.session.insert(key.into(), value.into());
    self
  }
}

/// The three disjoint results of running an action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
  Redirect(String),
  Render(RenderOutcome),
  Raw(Bytes),
}

impl ActionOutcome {
  pub fn redirect(target: impl Into<String>) -> Self {
    Self::Redirect(target.into())
  }

  pub fn render(template: impl Into<String>) -> RenderOutcome {
    RenderOutcome::new(template)
  }

  pub fn raw(bytes: impl Into<Bytes>) -> Self {
    Self::Raw(bytes.into())
  }
}

impl From<RenderOutcome> for ActionOutcome {
  fn from(render: RenderOutcome) -> Self {
    Self::Render(render)
  }
}

#[derive(Clone)]
pub struct Action {
  pub kind: ActionKind,
  pub path: String,
  pub query_names: Vec<String>,
  pub handler: ActionHandler,
}

impl std::fmt::Debug for Action {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Action")
      .field("kind", &self.kind)
      .field("path", &self.path)
      .field("query_names", &self.query_names)
      .finish_non_exhaustive()
  }
}

/// Named set of actions one in-process widget exposes.
#[derive(Debug, Default)]
pub struct Widget {
  name: String,
  actions: BTreeMap<String, Action>,
}

impl Widget {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), actions: BTreeMap::new() }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn add_action<F, Fut>(
    &mut self,
    name: &str,
    kind: ActionKind,
    path: &str,
    handler: F,
  ) -> &mut Self
  where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ActionOutcome, TrellisError>> + Send + 'static,
  {
    self.add_action_with_query(name, kind, path, &[], handler)
  }

  /// Register an action forwarding the given query parameters. A previous
  /// action with the same name is replaced.
  pub fn add_action_with_query<F, Fut>(
    &mut self,
    name: &str,
    kind: ActionKind,
    path: &str,
    query_names: &[&str],
    handler: F,
  ) -> &mut Self
  where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ActionOutcome, TrellisError>> + Send + 'static,
  {
    let mut names: Vec<String> = Vec::with_capacity(query_names.len());
    for q in query_names {
      if !names.iter().any(|n| n == q) {
        names.push((*q).to_string());
      }
    }
    let handler: ActionHandler = Arc::new(
      move |ctx| -> BoxFuture<Result<ActionOutcome, TrellisError>> { Box::pin(handler(ctx)) },
    );
    self.actions.insert(
      name.to_string(),
      Action { kind, path: path.to_string(), query_names: names, handler },
    );
    self
  }

  pub fn action(&self, name: &str) -> Option<&Action> {
    self.actions.get(name)
  }

  pub fn len(&self) -> usize {
    self.actions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.actions.is_empty()
  }

  /// Serializable projection of every action.
  pub fn describe(&self) -> Vec<RemoteAction> {
    self
      .actions
      .iter()
      .map(|(name, action)| RemoteAction {
        kind: action.kind,
        name: name.clone(),
        path: action.path.clone(),
        query_names: action.query_names.clone(),
      })
      .collect()
  }
}

/// Catalogue of in-process widgets, keyed by name.
#[derive(Debug, Default)]
pub struct WidgetManager {
  widgets: HashMap<String, Widget>,
}

impl WidgetManager {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns the widget registered under `name`, creating it when absent.
  pub fn create_widget(&mut self, name: &str) -> &mut Widget {
    self.widgets.entry(name.to_string()).or_insert_with(|| Widget::new(name))
  }

  pub fn widget(&self, name: &str) -> Option<&Widget> {
    self.widgets.get(name)
  }
}
