/* src/server/adapter/axum/src/lib.rs */

mod error;
mod handler;

use std::future::Future;

use trellis_server::Site;

/// Re-export trellis-server core for convenience
pub use trellis_server;

/// Extension trait that converts a `Site` into an Axum router.
///
/// Building the router runs the description phase: every mounted widget is
/// asked once for its action catalogue.
pub trait IntoAxumRouter {
  fn into_axum_router(self) -> impl Future<Output = axum::Router> + Send;
  fn serve(
    self,
    addr: &str,
  ) -> impl Future<Output = Result<(), Box<dyn std::error::Error>>> + Send;
}

impl IntoAxumRouter for Site {
  async fn into_axum_router(self) -> axum::Router {
    handler::build_router(self.into_parts()).await
  }

  async fn serve(self, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let router = self.into_axum_router().await;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, "trellis site listening");
    axum::serve(listener, router).await?;
    Ok(())
  }
}
