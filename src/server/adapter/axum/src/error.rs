/* src/server/adapter/axum/src/error.rs */

use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use trellis_server::{ErrorFilter, SiteConfig, TrellisError};

/// Newtype wrapper to implement `IntoResponse` for `TrellisError`.
///
/// The error rides in the response extensions; the visit layer turns it into
/// a redirect once it can see the site configuration.
pub(crate) struct AxumError(pub TrellisError);

impl IntoResponse for AxumError {
  fn into_response(self) -> Response {
    let status =
      StatusCode::from_u16(self.0.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = status.into_response();
    response.extensions_mut().insert(self.0);
    response
  }
}

impl From<TrellisError> for AxumError {
  fn from(err: TrellisError) -> Self {
    Self(err)
  }
}

/// Redirect target for a failed request. Authorization failures go to the
/// not-authorized page, everything else to the error page with the
/// visitor-safe identifier.
pub(crate) fn error_target(
  err: &TrellisError,
  filter: &ErrorFilter,
  config: &SiteConfig,
) -> String {
  if err.is_not_authorized() {
    tracing::info!(reason = err.message(), "not authorized");
    return config.site.unauthorized_page.clone();
  }
  let id = filter.public_id(err);
  format!("{}?error={id}", config.site.error_page)
}

/// Final response for an error. A failure on the error page itself answers
/// with the bare status to avoid a redirect loop.
pub(crate) fn error_response(
  err: &TrellisError,
  filter: &ErrorFilter,
  config: &SiteConfig,
  request_path: &str,
) -> Response {
  let target = error_target(err, filter, config);
  let target_path = target.split('?').next().unwrap_or_default();
  if target_path == request_path {
    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    return status.into_response();
  }
  Redirect::to(&target).into_response()
}
