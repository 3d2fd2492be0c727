/* src/server/adapter/axum/src/handler/page.rs */

use axum::Extension;
use axum::extract::{MatchedPath, Query};
use axum::http::Uri;
use axum::response::Html;
use trellis_server::context::USER_ID_KEY;
use trellis_server::session::lock_session;
use trellis_server::{RequestContext, TrellisError};

use super::{Visit, to_value};
use crate::error::AxumError;

pub(super) async fn handle_page(
  Extension(visit): Extension<Visit>,
  matched: MatchedPath,
  uri: Uri,
) -> Result<Html<String>, AxumError> {
  let site = visit.site.clone();
  let route = site
    .static_pages
    .get(matched.as_str())
    .ok_or_else(|| TrellisError::not_found(format!("no page at {}", matched.as_str())))?;

  let url = uri.path_and_query().map_or(uri.path(), |pq| pq.as_str());
  let mut ctx = {
    let session = lock_session(&visit.session);
    let mut ctx = RequestContext::new();
    ctx.set_session(&session);
    ctx.set_identity(session.get(USER_ID_KEY), url);
    ctx
  };
  // Static pages see every query value, first occurrence wins.
  let query = Query::<Vec<(String, String)>>::try_from_uri(&uri).map(|q| q.0).unwrap_or_default();
  for (name, value) in query {
    if ctx.query(&name).is_none() {
      ctx.set_query(&name, value);
    }
  }

  if let Some(guard) = &route.page.guard {
    guard.check(site.auth.as_ref(), ctx.user_id()).await?;
  }

  ctx.merge(site.ambient_data(uri.path()));
  ctx.insert("SubNavigation", to_value(&route.sub_navigation));
  let html = site.render(&route.page.template, &ctx.into_value())?;
  Ok(Html(html))
}
