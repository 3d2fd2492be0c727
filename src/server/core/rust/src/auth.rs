/* src/server/core/rust/src/auth.rs */

use std::collections::HashSet;

use async_trait::async_trait;

use crate::errors::TrellisError;

/// Authorization decision function. Any error means "not authorized".
#[async_trait]
pub trait AuthService: Send + Sync {
  async fn auth_query(
    &self,
    actor: &str,
    resource_group: &str,
    action: &str,
  ) -> Result<(), TrellisError>;
}

pub struct AllowAll;

#[async_trait]
impl AuthService for AllowAll {
  async fn auth_query(&self, _: &str, _: &str, _: &str) -> Result<(), TrellisError> {
    Ok(())
  }
}

pub struct DenyAll;

#[async_trait]
impl AuthService for DenyAll {
  async fn auth_query(&self, actor: &str, group: &str, action: &str) -> Result<(), TrellisError> {
    Err(TrellisError::not_authorized(format!("'{actor}' may not {action} on {group}")))
  }
}

/// In-memory grant table of `(actor, resource_group, action)` triples.
#[derive(Debug, Default)]
pub struct RoleTable {
  grants: HashSet<(String, String, String)>,
}

impl RoleTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn grant(mut self, actor: &str, resource_group: &str, action: &str) -> Self {
    self.grants.insert((actor.to_string(), resource_group.to_string(), action.to_string()));
    self
  }
}

#[async_trait]
impl AuthService for RoleTable {
  async fn auth_query(&self, actor: &str, group: &str, action: &str) -> Result<(), TrellisError> {
    let key = (actor.to_string(), group.to_string(), action.to_string());
    if self.grants.contains(&key) {
      Ok(())
    } else {
      Err(TrellisError::not_authorized(format!("'{actor}' may not {action} on {group}")))
    }
  }
}

/// Access requirement of a guarded static page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGuard {
  pub resource_group: String,
  pub action: String,
}

impl AccessGuard {
  pub fn new(resource_group: impl Into<String>, action: impl Into<String>) -> Self {
    Self { resource_group: resource_group.into(), action: action.into() }
  }

  /// Anonymous visitors are checked as the empty actor.
  pub async fn check(
    &self,
    auth: &dyn AuthService,
    actor: Option<&str>,
  ) -> Result<(), TrellisError> {
    let actor = actor.unwrap_or_default();
    match auth.auth_query(actor, &self.resource_group, &self.action).await {
      Ok(()) => Ok(()),
      Err(e) => {
        tracing::info!(
          actor,
          group = %self.resource_group,
          action = %self.action,
          reason = %e,
          "access denied"
        );
        Err(TrellisError::not_authorized(e.message()))
      }
    }
  }
}
