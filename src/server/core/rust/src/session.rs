/* src/server/core/rust/src/session.rs */

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SessionSection;
use crate::errors::TrellisError;

pub type SessionId = u64;

/// Session shared between the session middleware and the action handler of
/// one request.
pub type SharedSession = Arc<Mutex<Session>>;

pub fn lock_session(shared: &SharedSession) -> MutexGuard<'_, Session> {
  shared.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, thiserror::Error)]
pub enum CookieError {
  #[error("invalid session cookie encoding: {0}")]
  Encoding(#[from] base64::DecodeError),
  #[error("session cookie too short: {0} bytes")]
  TooShort(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
  #[error("session store unavailable: {0}")]
  Unavailable(String),
  #[error("session id space exhausted")]
  Exhausted,
}

impl From<SessionError> for TrellisError {
  fn from(err: SessionError) -> Self {
    TrellisError::technical(err.to_string())
  }
}

/// Little-endian u64 -> 8 bytes -> URL-safe base64.
pub fn encode_session_id(id: SessionId) -> String {
  URL_SAFE.encode(id.to_le_bytes())
}

pub fn decode_session_id(value: &str) -> Result<SessionId, CookieError> {
  let raw = URL_SAFE.decode(value)?;
  let Some(head) = raw.get(..8).and_then(|b| <[u8; 8]>::try_from(b).ok()) else {
    return Err(CookieError::TooShort(raw.len()));
  };
  Ok(u64::from_le_bytes(head))
}

/// A visitor's key-value record.
///
/// An empty value is a tombstone: the store removes the entry on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  data: BTreeMap<String, String>,
  #[serde(skip)]
  dirty: bool,
}

impl Session {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_data(data: BTreeMap<String, String>) -> Self {
    Self { data, dirty: false }
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.data.get(key).map(String::as_str).filter(|v| !v.is_empty())
  }

  /// Writes only when the value actually changes.
  pub fn store(&mut self, key: &str, value: &str) {
    if self.data.get(key).map_or("", String::as_str) == value {
      return;
    }
    self.data.insert(key.to_string(), value.to_string());
    self.dirty = true;
  }

  pub fn delete(&mut self, key: &str) {
    match self.data.get_mut(key) {
      Some(value) if !value.is_empty() => {
        value.clear();
        self.dirty = true;
      }
      _ => {}
    }
  }

  pub fn is_dirty(&self) -> bool {
    self.dirty
  }

  /// Raw record including tombstones, as handed to the store.
  pub fn data(&self) -> &BTreeMap<String, String> {
    &self.data
  }

  /// Live entries as a JSON object for the request context.
  pub fn snapshot(&self) -> Value {
    let live = self
      .data
      .iter()
      .filter(|(_, v)| !v.is_empty())
      .map(|(k, v)| (k.clone(), Value::String(v.clone())))
      .collect();
    Value::Object(live)
  }
}

/// Backing store for session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
  async fn generate(&self) -> Result<SessionId, SessionError>;
  async fn get(&self, id: SessionId) -> Result<Option<Session>, SessionError>;
  async fn update(&self, id: SessionId, session: &Session) -> Result<(), SessionError>;
}

const GENERATE_ATTEMPTS: usize = 16;

/// Process-local store. Suitable for a single instance and for tests.
#[derive(Default)]
pub struct MemorySessionStore {
  records: RwLock<HashMap<SessionId, BTreeMap<String, String>>>,
}

impl MemorySessionStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
  async fn generate(&self) -> Result<SessionId, SessionError> {
    let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
    for _ in 0..GENERATE_ATTEMPTS {
      let id: SessionId = rand::random();
      if id != 0 && !records.contains_key(&id) {
        return Ok(id);
      }
    }
    Err(SessionError::Exhausted)
  }

  async fn get(&self, id: SessionId) -> Result<Option<Session>, SessionError> {
    let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
    Ok(records.get(&id).map(|data| Session::from_data(data.clone())))
  }

  async fn update(&self, id: SessionId, session: &Session) -> Result<(), SessionError> {
    let live = session
      .data()
      .iter()
      .filter(|(_, v)| !v.is_empty())
      .map(|(k, v)| (k.clone(), v.clone()))
      .collect();
    self.records.write().unwrap_or_else(PoisonError::into_inner).insert(id, live);
    Ok(())
  }
}

/// Cookie attributes for the session identity cookie.
#[derive(Debug, Clone)]
pub struct CookieSettings {
  pub name: String,
  pub domain: String,
  pub max_age_secs: u64,
}

impl CookieSettings {
  pub fn from_config(session: &SessionSection, domain: &str) -> Self {
    Self {
      name: session.cookie_name.clone(),
      domain: domain.to_string(),
      max_age_secs: session.timeout_secs,
    }
  }

  /// `Set-Cookie` value carrying `id` with a fresh rolling expiry.
  pub fn header_value(&self, id: SessionId) -> String {
    let mut out =
      format!("{}={}; Path=/; Max-Age={}", self.name, encode_session_id(id), self.max_age_secs);
    if !self.domain.is_empty() {
      out.push_str("; Domain=");
      out.push_str(&self.domain);
    }
    out.push_str("; HttpOnly; Secure");
    out
  }
}

/// Find a cookie by name in a `Cookie` header value.
pub fn read_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
  for pair in header.split(';') {
    let pair = pair.trim();
    if let Some((k, v)) = pair.split_once('=')
      && k.trim() == name
    {
      return Some(v.trim());
    }
  }
  None
}

/// Session loaded for one request.
#[derive(Debug)]
pub struct ResolvedSession {
  pub id: SessionId,
  pub session: Session,
  /// True when the visitor had no usable cookie and a new id was issued.
  pub fresh: bool,
}

pub struct SessionManager {
  store: Arc<dyn SessionStore>,
  cookie: CookieSettings,
}

impl SessionManager {
  pub fn new(store: Arc<dyn SessionStore>, cookie: CookieSettings) -> Self {
    Self { store, cookie }
  }

  pub fn cookie(&self) -> &CookieSettings {
    &self.cookie
  }

  /// Resolve the visitor's session from the raw cookie value.
  ///
  /// An unreadable cookie never rejects the request: a new id is issued
  /// instead. A record missing from the store starts empty.
  pub async fn resolve(&self, cookie: Option<&str>) -> Result<ResolvedSession, TrellisError> {
    let decoded = match cookie {
      Some(value) => match decode_session_id(value) {
        Ok(id) => Some(id),
        Err(e) => {
          tracing::debug!(error = %e, "discarding unreadable session cookie");
          None
        }
      },
      None => None,
    };

    let (id, fresh) = match decoded {
      Some(id) => (id, false),
      None => (self.store.generate().await?, true),
    };

    let session = if fresh {
      Session::new()
    } else {
      match self.store.get(id).await {
        Ok(Some(session)) => session,
        Ok(None) => Session::new(),
        Err(e) => {
          tracing::warn!(session = id, error = %e, "session load failed, starting empty");
          Session::new()
        }
      }
    };

    Ok(ResolvedSession { id, session, fresh })
  }

  /// Persist the session if it changed. Failures are logged, never raised:
  /// the response has already been produced.
  pub async fn finish(&self, id: SessionId, session: &Session) -> bool {
    if !session.is_dirty() {
      return false;
    }
    match self.store.update(id, session).await {
      Ok(()) => true,
      Err(e) => {
        tracing::error!(session = id, error = %e, "session persist failed, change lost");
        false
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  fn settings() -> CookieSettings {
    CookieSettings { name: "sid".into(), domain: "example.org".into(), max_age_secs: 60 }
  }

  #[test]
  fn codec_round_trips_edge_values() {
    for id in [0, 1, 255, 256, u64::from(u32::MAX), u64::MAX - 1, u64::MAX] {
      assert_eq!(decode_session_id(&encode_session_id(id)).ok(), Some(id));
    }
  }

  #[test]
  fn codec_is_little_endian_url_safe() {
    assert_eq!(encode_session_id(1), URL_SAFE.encode([1, 0, 0, 0, 0, 0, 0, 0]));
    let encoded = encode_session_id(u64::MAX);
    assert!(!encoded.contains('+') && !encoded.contains('/'));
  }

  #[test]
  fn short_buffer_fails() {
    let short = URL_SAFE.encode([1, 2, 3, 4, 5, 6, 7]);
    assert!(matches!(decode_session_id(&short), Err(CookieError::TooShort(7))));
    assert!(matches!(decode_session_id(""), Err(CookieError::TooShort(0))));
  }

  #[test]
  fn garbage_fails() {
    assert!(matches!(decode_session_id("not base64 at all!"), Err(CookieError::Encoding(_))));
  }

  #[test]
  fn store_same_value_twice_dirties_once() {
    let mut session = Session::new();
    session.store("lang", "fr");
    assert!(session.is_dirty());

    let mut clean = Session::from_data(session.data().clone());
    clean.store("lang", "fr");
    assert!(!clean.is_dirty());
  }

  #[test]
  fn store_empty_on_absent_key_is_noop() {
    let mut session = Session::new();
    session.store("k", "");
    assert!(!session.is_dirty());
  }

  #[test]
  fn delete_tombstones_present_key() {
    let mut session = Session::from_data(BTreeMap::from([("k".into(), "v".into())]));
    session.delete("k");
    assert!(session.is_dirty());
    assert_eq!(session.get("k"), None);
    assert_eq!(session.data().get("k").map(String::as_str), Some(""));
    assert_eq!(session.snapshot(), serde_json::json!({}));
  }

  #[test]
  fn delete_absent_key_is_noop() {
    let mut session = Session::new();
    session.delete("k");
    assert!(!session.is_dirty());
  }

  #[test]
  fn header_value_carries_all_attributes() {
    let header = settings().header_value(1);
    assert!(header.starts_with(&format!("sid={}", encode_session_id(1))));
    assert!(header.contains("Path=/"));
    assert!(header.contains("Domain=example.org"));
    assert!(header.contains("Max-Age=60"));
    assert!(header.contains("HttpOnly"));
    assert!(header.contains("Secure"));
  }

  #[test]
  fn read_cookie_among_pairs() {
    assert_eq!(read_cookie("a=1; sid=abc=; b=2", "sid"), Some("abc="));
    assert_eq!(read_cookie("a=1", "sid"), None);
  }

  #[tokio::test]
  async fn missing_cookie_creates_fresh_session() {
    let manager = SessionManager::new(Arc::new(MemorySessionStore::new()), settings());
    let resolved = manager.resolve(None).await.unwrap();
    assert!(resolved.fresh);
    assert_eq!(resolved.session, Session::new());
  }

  #[tokio::test]
  async fn invalid_cookie_regenerates() {
    let manager = SessionManager::new(Arc::new(MemorySessionStore::new()), settings());
    let short = URL_SAFE.encode([9, 9, 9]);
    let resolved = manager.resolve(Some(&short)).await.unwrap();
    assert!(resolved.fresh);
  }

  #[tokio::test]
  async fn valid_cookie_unknown_to_store_starts_empty() {
    let manager = SessionManager::new(Arc::new(MemorySessionStore::new()), settings());
    let resolved = manager.resolve(Some(&encode_session_id(42))).await.unwrap();
    assert!(!resolved.fresh);
    assert_eq!(resolved.id, 42);
    assert_eq!(resolved.session.snapshot(), serde_json::json!({}));
  }

  #[tokio::test]
  async fn dirty_session_is_persisted_and_reloaded() {
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManager::new(store.clone(), settings());
    let mut resolved = manager.resolve(Some(&encode_session_id(7))).await.unwrap();
    resolved.session.store("lang", "fr");
    assert!(manager.finish(7, &resolved.session).await);

    let again = manager.resolve(Some(&encode_session_id(7))).await.unwrap();
    assert_eq!(again.session.get("lang"), Some("fr"));
    assert!(!again.session.is_dirty());
  }

  #[tokio::test]
  async fn tombstones_are_removed_by_memory_store() {
    let store = MemorySessionStore::new();
    let mut session = Session::from_data(BTreeMap::from([("a".into(), "1".into())]));
    session.delete("a");
    store.update(3, &session).await.unwrap();
    let loaded = store.get(3).await.unwrap().unwrap();
    assert!(loaded.data().is_empty());
  }

  struct CountingStore {
    updates: AtomicUsize,
  }

  #[async_trait]
  impl SessionStore for CountingStore {
    async fn generate(&self) -> Result<SessionId, SessionError> {
      Ok(1)
    }
    async fn get(&self, _id: SessionId) -> Result<Option<Session>, SessionError> {
      Err(SessionError::Unavailable("down".into()))
    }
    async fn update(&self, _id: SessionId, _session: &Session) -> Result<(), SessionError> {
      self.updates.fetch_add(1, Ordering::SeqCst);
      Err(SessionError::Unavailable("down".into()))
    }
  }

  #[tokio::test]
  async fn clean_session_skips_persist() {
    let store = Arc::new(CountingStore { updates: AtomicUsize::new(0) });
    let manager = SessionManager::new(store.clone(), settings());
    assert!(!manager.finish(1, &Session::new()).await);
    assert_eq!(store.updates.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn store_failures_are_soft() {
    let store = Arc::new(CountingStore { updates: AtomicUsize::new(0) });
    let manager = SessionManager::new(store.clone(), settings());
    let mut resolved = manager.resolve(Some(&encode_session_id(5))).await.unwrap();
    assert!(!resolved.fresh);
    resolved.session.store("k", "v");
    assert!(!manager.finish(5, &resolved.session).await);
    assert_eq!(store.updates.load(Ordering::SeqCst), 1);
  }
}
