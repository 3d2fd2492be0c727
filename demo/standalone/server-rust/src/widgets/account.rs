/* demo/standalone/server-rust/src/widgets/account.rs */

use trellis_server::context::USER_ID_KEY;
use trellis_server::{ActionKind, ActionOutcome, RequestContext, TrellisError, WidgetManager};

async fn login(ctx: RequestContext) -> Result<ActionOutcome, TrellisError> {
  let user = ctx.form("user").map(str::trim).unwrap_or_default();
  if user.is_empty() || !user.chars().all(|c| c.is_ascii_alphanumeric()) {
    return Err(TrellisError::widget("ErrorInvalidInput"));
  }
  tracing::info!(user, "signed in");
  Ok(
    ActionOutcome::render("welcome")
      .with("User", user)
      .store_session(USER_ID_KEY, user)
      .into(),
  )
}

async fn logout(ctx: RequestContext) -> Result<ActionOutcome, TrellisError> {
  if let Some(user) = ctx.user_id() {
    tracing::info!(user, "signed out");
  }
  // An empty value removes the key from the session.
  Ok(ActionOutcome::render("welcome").store_session(USER_ID_KEY, "").into())
}

async fn whoami(ctx: RequestContext) -> Result<ActionOutcome, TrellisError> {
  let user = ctx.user_id().unwrap_or("guest").to_string();
  Ok(ActionOutcome::render("welcome").with("User", user).into())
}

pub fn register(manager: &mut WidgetManager) {
  let widget = manager.create_widget("account");
  widget.add_action("whoami", ActionKind::Get, "/", whoami);
  widget.add_action("login", ActionKind::Post, "/login", login);
  widget.add_action("logout", ActionKind::Get, "/logout", logout);
}
