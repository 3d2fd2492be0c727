/* demo/standalone/server-rust/src/widgets/guestbook.rs */

use std::sync::{Arc, PoisonError, RwLock};

use trellis_server::render::escape_html;
use trellis_server::{ActionKind, ActionOutcome, RequestContext, TrellisError, WidgetManager};

// 1x1 transparent GIF.
const AVATAR: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00!\xf9\x04\x01\
  \x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";

#[derive(Debug, Clone)]
struct Entry {
  id: u64,
  name: String,
  message: String,
}

#[derive(Default)]
pub struct Guestbook {
  entries: RwLock<Vec<Entry>>,
}

impl Guestbook {
  fn snapshot(&self) -> Vec<Entry> {
    self.entries.read().unwrap_or_else(PoisonError::into_inner).clone()
  }

  fn add(&self, name: &str, message: &str) -> Result<u64, TrellisError> {
    let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
    if entries.iter().any(|e| e.name == name && e.message == message) {
      return Err(TrellisError::widget("ErrorDuplicateEntry"));
    }
    let id = entries.last().map_or(1, |e| e.id + 1);
    entries.push(Entry { id, name: name.to_string(), message: message.to_string() });
    Ok(id)
  }
}

async fn list(book: Arc<Guestbook>, ctx: RequestContext) -> Result<ActionOutcome, TrellisError> {
  let entries = book.snapshot();
  let base = ctx.url().and_then(|u| u.split('?').next()).unwrap_or_default();
  let base = base.trim_end_matches('/');
  let items: String = entries
    .iter()
    .map(|e| {
      format!(
        "<li><a href=\"{base}/entry/{}\">{}</a>: {}</li>",
        e.id,
        escape_html(&e.name),
        escape_html(&e.message)
      )
    })
    .collect();
  let last_name = ctx.session("LastName").unwrap_or_default().to_string();
  Ok(
    ActionOutcome::render("guestbook")
      .with("Count", entries.len())
      .with("Items", items)
      .with("LastName", last_name)
      .into(),
  )
}

async fn sign(book: Arc<Guestbook>, ctx: RequestContext) -> Result<ActionOutcome, TrellisError> {
  let name = ctx.form("name").map(str::trim).unwrap_or_default().to_string();
  let message = ctx.form("message").map(str::trim).unwrap_or_default().to_string();
  if name.is_empty() || message.is_empty() {
    return Err(TrellisError::widget("ErrorInvalidInput"));
  }
  let id = book.add(&name, &message)?;
  tracing::info!(id, %name, "guestbook signed");
  Ok(
    ActionOutcome::render("signed")
      .with("Id", id)
      .with("Name", name.clone())
      .store_session("LastName", name)
      .into(),
  )
}

async fn entry(book: Arc<Guestbook>, ctx: RequestContext) -> Result<ActionOutcome, TrellisError> {
  let id: u64 = ctx
    .path_param("id")
    .and_then(|v| v.parse().ok())
    .ok_or_else(|| TrellisError::validation("entry id must be a number"))?;
  let found = book.snapshot().into_iter().find(|e| e.id == id);
  let Some(found) = found else {
    return Err(TrellisError::not_found(format!("guestbook entry {id}")));
  };
  let outcome = ActionOutcome::render("entry").with("Name", found.name);
  Ok(outcome.with("Message", found.message).into())
}

async fn avatar(_ctx: RequestContext) -> Result<ActionOutcome, TrellisError> {
  Ok(ActionOutcome::raw(AVATAR))
}

async fn lang(ctx: RequestContext) -> Result<ActionOutcome, TrellisError> {
  let mut outcome = ActionOutcome::render("lang");
  if let Some(choice) = ctx.query("set").filter(|v| !v.is_empty()) {
    outcome = outcome.store_session("lang", choice);
  }
  Ok(outcome.into())
}

/// Register the guestbook actions on `manager`.
pub fn register(manager: &mut WidgetManager, book: Arc<Guestbook>) {
  let widget = manager.create_widget("guestbook");

  let b = book.clone();
  widget.add_action("list", ActionKind::Get, "/", move |ctx| list(b.clone(), ctx));
  let b = book.clone();
  widget.add_action("sign", ActionKind::Post, "/", move |ctx| sign(b.clone(), ctx));
  widget.add_action("entry", ActionKind::Get, "/entry/{id}", move |ctx| entry(book.clone(), ctx));
  widget.add_action("avatar", ActionKind::Raw, "/avatar", avatar);
  widget.add_action_with_query("lang", ActionKind::Get, "/lang", &["set"], lang);
}
