/* demo/standalone/server-rust/src/widgets/remote.rs */

use async_trait::async_trait;
use trellis_server::{
  ProcessReply, RemoteAction, RequestContext, TrellisError, UploadedFile, WidgetService,
};

/// Backend for a widget hosted in another process that is never reachable.
///
/// Mounting it shows the fail-open description phase: the site boots and the
/// widget's page simply has no routes.
pub struct OfflineBackend {
  endpoint: String,
}

impl OfflineBackend {
  pub fn new(endpoint: impl Into<String>) -> Self {
    Self { endpoint: endpoint.into() }
  }
}

#[async_trait]
impl WidgetService for OfflineBackend {
  async fn get_desc(&self, widget: &str) -> Result<Vec<RemoteAction>, TrellisError> {
    Err(TrellisError::transport(format!("{widget}: no route to {}", self.endpoint)))
  }

  async fn process(
    &self,
    widget: &str,
    action: &str,
    _ctx: RequestContext,
    _files: Vec<UploadedFile>,
  ) -> Result<ProcessReply, TrellisError> {
    Err(TrellisError::transport(format!("{widget}.{action}: no route to {}", self.endpoint)))
  }
}
