/* src/server/adapter/axum/src/handler/widget.rs */

use std::sync::Arc;

use axum::extract::{Form, FromRequest, FromRequestParts, Multipart, Path, Query, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde_json::Value;
use tracing::Instrument;
use trellis_server::extract::RequestParts;
use trellis_server::session::lock_session;
use trellis_server::{MountedAction, Resolution, TrellisError, UploadedFile};

use super::{AppState, Visit};
use crate::error::AxumError;

type Pairs = Vec<(String, String)>;

pub(super) async fn handle_action(
  action: Arc<MountedAction>,
  req: Request,
) -> Result<Response, AxumError> {
  let (mut parts, body) = req.into_parts();
  let visit = parts
    .extensions
    .get::<Visit>()
    .cloned()
    .ok_or_else(|| TrellisError::technical("request reached a widget without a visit"))?;

  let path_values = read_path(&mut parts, &action).await?;
  let query = Query::<Pairs>::try_from_uri(&parts.uri).map(|q| q.0).unwrap_or_default();
  let url = parts.uri.path_and_query().map_or(parts.uri.path(), |pq| pq.as_str()).to_string();
  let request_path = parts.uri.path().to_string();

  let (form, files) = if action.extractor.reads_form() {
    read_body(Request::from_parts(parts, body)).await?
  } else {
    (Vec::new(), Vec::new())
  };

  let ctx = {
    let session = lock_session(&visit.session);
    action.extractor.extract(&RequestParts {
      path_values: &path_values,
      query: &query,
      form: &form,
      session: Some(&session),
      url: &url,
    })
  };

  let span = tracing::debug_span!(
    parent: &visit.span,
    "process",
    widget = %action.widget,
    action = %action.action.name,
  );
  tracing::debug!(session = visit.session_id, files = files.len(), "dispatching");
  let resolution = action.dispatch(ctx, files, &visit.session).instrument(span).await?;
  respond(&visit.site, resolution, &request_path)
}

async fn read_path(parts: &mut Parts, action: &MountedAction) -> Result<Pairs, TrellisError> {
  if action.extractor.path_params().is_empty() {
    return Ok(Vec::new());
  }
  let Path(values) = Path::<Pairs>::from_request_parts(parts, &())
    .await
    .map_err(|e| TrellisError::technical(format!("path rejected: {}", e.body_text())))?;
  Ok(values)
}

/// Read form fields and uploaded files. Any read failure aborts before the
/// widget is called.
async fn read_body(req: Request) -> Result<(Pairs, Vec<UploadedFile>), TrellisError> {
  let content_type = req
    .headers()
    .get(CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .unwrap_or_default()
    .to_ascii_lowercase();

  if content_type.starts_with("multipart/form-data") {
    let multipart = Multipart::from_request(req, &())
      .await
      .map_err(|e| TrellisError::technical(format!("multipart rejected: {}", e.body_text())))?;
    return read_multipart(multipart).await;
  }
  if content_type.starts_with("application/x-www-form-urlencoded") {
    let Form(fields) = Form::<Pairs>::from_request(req, &())
      .await
      .map_err(|e| TrellisError::technical(format!("form rejected: {}", e.body_text())))?;
    return Ok((fields, Vec::new()));
  }
  Ok((Vec::new(), Vec::new()))
}

async fn read_multipart(
  mut multipart: Multipart,
) -> Result<(Pairs, Vec<UploadedFile>), TrellisError> {
  let mut fields = Vec::new();
  let mut files = Vec::new();
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| TrellisError::technical(format!("multipart read failed: {e}")))?
  {
    let name = field.name().unwrap_or_default().to_string();
    let file_name = field.file_name().map(str::to_owned);
    let content_type = field.content_type().map(str::to_owned);
    let data = field
      .bytes()
      .await
      .map_err(|e| TrellisError::technical(format!("upload of '{name}' failed: {e}")))?;
    match file_name {
      Some(file_name) => files.push(UploadedFile { field: name, file_name, content_type, data }),
      None => fields.push((name, String::from_utf8_lossy(&data).into_owned())),
    }
  }
  Ok((fields, files))
}

fn respond(
  site: &AppState,
  resolution: Resolution,
  request_path: &str,
) -> Result<Response, AxumError> {
  match resolution {
    Resolution::Redirect(target) => Ok(Redirect::to(&target).into_response()),
    Resolution::Raw { content_type, body } => {
      Ok(([(CONTENT_TYPE, content_type)], body).into_response())
    }
    Resolution::Render { template, mut data } => {
      if let Value::Object(map) = &mut data {
        for (key, value) in site.ambient_data(request_path) {
          map.entry(key).or_insert(value);
        }
      }
      let html = site.render(&template, &data)?;
      Ok(Html(html).into_response())
    }
  }
}
