/* src/server/core/rust/src/dispatch.rs */

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use crate::context::{RequestContext, UploadedFile};
use crate::errors::TrellisError;
use crate::extract::ContextExtractor;
use crate::page::join_url;
use crate::protocol::{RemoteAction, WidgetService};
use crate::session::{Session, SharedSession, lock_session};
use crate::sniff::sniff_content_type;
use crate::widget::ActionOutcome;

/// One widget action bound to a route. Built once at mount time from the
/// cached description and shared read-only by every request.
#[derive(Clone)]
pub struct MountedAction {
  pub widget: String,
  pub action: RemoteAction,
  pub extractor: ContextExtractor,
  service: Arc<dyn WidgetService>,
}

impl std::fmt::Debug for MountedAction {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MountedAction")
      .field("widget", &self.widget)
      .field("action", &self.action)
      .finish_non_exhaustive()
  }
}

/// How the HTTP layer must answer a dispatched request.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
  Redirect(String),
  Render { template: String, data: Value },
  Raw { content_type: &'static str, body: Bytes },
}

impl MountedAction {
  pub fn new(
    widget: impl Into<String>,
    action: RemoteAction,
    service: Arc<dyn WidgetService>,
  ) -> Self {
    let extractor = ContextExtractor::for_action(&action);
    Self { widget: widget.into(), action, extractor, service }
  }

  /// Full route for this action below the widget's mount path.
  pub fn route_path(&self, base: &str) -> String {
    join_url(base, &self.action.path)
  }

  /// HTTP method of the generated route. `Raw` actions are served as GET.
  pub fn method(&self) -> &'static str {
    self.action.kind.method()
  }

  /// Call `process` and decode the reply into an outcome.
  pub async fn invoke(
    &self,
    ctx: RequestContext,
    files: Vec<UploadedFile>,
  ) -> Result<ActionOutcome, TrellisError> {
    let reply = self.service.process(&self.widget, &self.action.name, ctx, files).await?;
    reply.into_outcome(self.action.kind)
  }

  /// Invoke the action and resolve its outcome against the visitor session.
  pub async fn dispatch(
    &self,
    ctx: RequestContext,
    files: Vec<UploadedFile>,
    session: &SharedSession,
  ) -> Result<Resolution, TrellisError> {
    let outcome = self.invoke(ctx.clone(), files).await?;
    let mut session = lock_session(session);
    Ok(resolve_outcome(outcome, ctx, &mut session))
  }
}

/// Fetch a widget's action catalogue and bind every action. A failed
/// description mounts nothing and never fails the boot.
pub async fn describe_widget(
  widget: &str,
  service: &Arc<dyn WidgetService>,
) -> Vec<MountedAction> {
  match service.get_desc(widget).await {
    Ok(actions) => {
      tracing::debug!(widget, actions = actions.len(), "widget described");
      actions.into_iter().map(|a| MountedAction::new(widget, a, service.clone())).collect()
    }
    Err(e) => {
      tracing::error!(widget, error = %e, "widget description failed, not mounted");
      Vec::new()
    }
  }
}

/// Turn an outcome into a response plan. For renders, widget session entries
/// are stored before the render data is finalized, so the template sees the
/// post-merge session.
pub fn resolve_outcome(
  outcome: ActionOutcome,
  mut ctx: RequestContext,
  session: &mut Session,
) -> Resolution {
  match outcome {
    ActionOutcome::Redirect(target) => Resolution::Redirect(target),
    ActionOutcome::Raw(body) => Resolution::Raw { content_type: sniff_content_type(&body), body },
    ActionOutcome::Render(render) => {
      ctx.merge(render.data);
      for (key, value) in &render.session {
        session.store(key, value);
      }
      ctx.set_session(session);
      Resolution::Render { template: render.template, data: ctx.into_value() }
    }
  }
}
