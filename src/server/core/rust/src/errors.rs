/* src/server/core/rust/src/errors.rs */

use std::collections::HashSet;
use std::fmt;

/// Visitor-facing identifier for any failure that must not leak detail.
pub const ERROR_TECHNICAL: &str = "ErrorTechnical";
pub const ERROR_NOT_AUTHORIZED: &str = "ErrorNotAuthorized";
pub const ERROR_NOT_FOUND: &str = "ErrorNotFound";
pub const ERROR_INVALID_INPUT: &str = "ErrorInvalidInput";

#[derive(Debug, Clone)]
pub struct TrellisError {
  code: String,
  message: String,
  status: u16,
}

fn default_status(code: &str) -> u16 {
  match code {
    "VALIDATION_ERROR" => 400,
    "NOT_AUTHORIZED" => 403,
    "NOT_FOUND" => 404,
    "WIDGET_ERROR" => 422,
    "TRANSPORT_ERROR" => 502,
    "TECHNICAL_ERROR" => 500,
    _ => 500,
  }
}

impl TrellisError {
  pub fn new(code: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
    Self { code: code.into(), message: message.into(), status }
  }

  pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
    let code = code.into();
    let status = default_status(&code);
    Self { code, message: message.into(), status }
  }

  pub fn validation(msg: impl Into<String>) -> Self {
    Self::with_code("VALIDATION_ERROR", msg)
  }

  pub fn not_found(msg: impl Into<String>) -> Self {
    Self::with_code("NOT_FOUND", msg)
  }

  pub fn technical(msg: impl Into<String>) -> Self {
    Self::with_code("TECHNICAL_ERROR", msg)
  }

  pub fn not_authorized(msg: impl Into<String>) -> Self {
    Self::with_code("NOT_AUTHORIZED", msg)
  }

  /// A business error raised by a widget. The message is expected to be a
  /// user-safe identifier such as `ErrorDuplicateName`.
  pub fn widget(msg: impl Into<String>) -> Self {
    Self::with_code("WIDGET_ERROR", msg)
  }

  pub fn transport(msg: impl Into<String>) -> Self {
    Self::with_code("TRANSPORT_ERROR", msg)
  }

  pub fn code(&self) -> &str {
    &self.code
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn status(&self) -> u16 {
    self.status
  }

  pub fn is_not_authorized(&self) -> bool {
    self.code == "NOT_AUTHORIZED"
  }
}

impl fmt::Display for TrellisError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.code, self.message)
  }
}

impl std::error::Error for TrellisError {}

/// Allow-list of error identifiers that may be shown to a visitor.
#[derive(Debug, Clone)]
pub struct ErrorFilter {
  allowed: HashSet<String>,
}

impl ErrorFilter {
  pub fn new() -> Self {
    let allowed = [ERROR_TECHNICAL, ERROR_NOT_AUTHORIZED, ERROR_NOT_FOUND, ERROR_INVALID_INPUT]
      .into_iter()
      .map(String::from)
      .collect();
    Self { allowed }
  }

  pub fn allow(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
    self.allowed.extend(ids.into_iter().map(Into::into));
    self
  }

  pub fn is_allowed(&self, id: &str) -> bool {
    self.allowed.contains(id)
  }

  /// Map an error to the identifier a visitor is allowed to see.
  /// Everything that is not explicitly allowed collapses to `ErrorTechnical`
  /// and is logged with its original message.
  pub fn public_id(&self, err: &TrellisError) -> String {
    let id = match err.code() {
      "NOT_AUTHORIZED" => ERROR_NOT_AUTHORIZED,
      "NOT_FOUND" => ERROR_NOT_FOUND,
      "VALIDATION_ERROR" => ERROR_INVALID_INPUT,
      "WIDGET_ERROR" if self.is_allowed(err.message()) => return err.message().to_string(),
      _ => ERROR_TECHNICAL,
    };
    if id == ERROR_TECHNICAL {
      tracing::error!(code = err.code(), message = err.message(), "request failed");
    } else {
      tracing::debug!(code = err.code(), message = err.message(), "request rejected");
    }
    id.to_string()
  }
}

impl Default for ErrorFilter {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_status_known_codes() {
    assert_eq!(default_status("VALIDATION_ERROR"), 400);
    assert_eq!(default_status("NOT_AUTHORIZED"), 403);
    assert_eq!(default_status("NOT_FOUND"), 404);
    assert_eq!(default_status("WIDGET_ERROR"), 422);
    assert_eq!(default_status("TRANSPORT_ERROR"), 502);
    assert_eq!(default_status("TECHNICAL_ERROR"), 500);
  }

  #[test]
  fn default_status_unknown_code() {
    assert_eq!(default_status("CUSTOM_ERROR"), 500);
  }

  #[test]
  fn display_format() {
    let err = TrellisError::not_found("missing");
    assert_eq!(err.to_string(), "NOT_FOUND: missing");
  }

  #[test]
  fn allowed_widget_error_passes_through() {
    let filter = ErrorFilter::new().allow(["ErrorDuplicateName"]);
    let err = TrellisError::widget("ErrorDuplicateName");
    assert_eq!(filter.public_id(&err), "ErrorDuplicateName");
  }

  #[test]
  fn unknown_widget_error_is_masked() {
    let filter = ErrorFilter::new();
    let err = TrellisError::widget("pq: relation \"posts\" does not exist");
    assert_eq!(filter.public_id(&err), ERROR_TECHNICAL);
  }

  #[test]
  fn transport_error_is_always_technical() {
    let filter = ErrorFilter::new().allow(["connection refused"]);
    let err = TrellisError::transport("connection refused");
    assert_eq!(filter.public_id(&err), ERROR_TECHNICAL);
  }

  #[test]
  fn authorization_maps_to_not_authorized() {
    let filter = ErrorFilter::new();
    assert_eq!(filter.public_id(&TrellisError::not_authorized("role")), ERROR_NOT_AUTHORIZED);
  }
}
