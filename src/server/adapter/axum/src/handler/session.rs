/* src/server/adapter/axum/src/handler/session.rs */

use std::sync::{Arc, Mutex};

use axum::extract::{Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::Instrument;
use trellis_server::TrellisError;
use trellis_server::session::{SessionId, SharedSession, lock_session, read_cookie};

use super::AppState;
use crate::error::error_response;

/// Per-request context passed explicitly to every handler: the visitor
/// session, the request span, and the site it belongs to.
#[derive(Clone)]
pub(crate) struct Visit {
  pub session_id: SessionId,
  pub session: SharedSession,
  pub span: tracing::Span,
  pub site: Arc<AppState>,
}

fn session_cookie(req: &Request, name: &str) -> Option<String> {
  req
    .headers()
    .get_all(COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .find_map(|header| read_cookie(header, name))
    .map(str::to_owned)
}

/// Resolve the session, run the request inside its `visit` span, convert
/// errors into redirects, persist the session if it changed and refresh the
/// cookie.
pub(super) async fn visit_layer(
  State(site): State<Arc<AppState>>,
  mut req: Request,
  next: Next,
) -> Response {
  let cookie = session_cookie(&req, &site.sessions.cookie().name);
  let resolved = match site.sessions.resolve(cookie.as_deref()).await {
    Ok(resolved) => resolved,
    Err(e) => {
      // No id to hand out; redirecting would loop through this layer again.
      tracing::error!(error = %e, "session id generation failed");
      return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
  };

  let path = req.uri().path().to_string();
  let span = tracing::info_span!(
    "visit",
    session = resolved.id,
    fresh = resolved.fresh,
    method = %req.method(),
    path = %path,
  );

  let session: SharedSession = Arc::new(Mutex::new(resolved.session));
  req.extensions_mut().insert(Visit {
    session_id: resolved.id,
    session: session.clone(),
    span: span.clone(),
    site: site.clone(),
  });

  let mut response = next.run(req).instrument(span.clone()).await;

  if let Some(err) = response.extensions_mut().remove::<TrellisError>() {
    response = span.in_scope(|| error_response(&err, &site.errors, &site.config, &path));
  }

  let record = lock_session(&session).clone();
  site.sessions.finish(resolved.id, &record).instrument(span).await;

  let header = site.sessions.cookie().header_value(resolved.id);
  match HeaderValue::from_str(&header) {
    Ok(value) => {
      response.headers_mut().append(SET_COOKIE, value);
    }
    Err(e) => tracing::error!(error = %e, "session cookie is not a valid header value"),
  }
  response
}
