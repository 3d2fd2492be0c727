/* src/server/core/rust/src/lib.rs */

pub mod auth;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod errors;
pub mod extract;
pub mod page;
pub mod protocol;
pub mod render;
pub mod session;
pub mod site;
pub mod sniff;
pub mod widget;

// Re-exports for ergonomic use
pub use auth::{AccessGuard, AllowAll, AuthService, DenyAll, RoleTable};
pub use config::{SiteConfig, load_site_config, parse_site_config};
pub use context::{RequestContext, UploadedFile};
pub use dispatch::{MountedAction, Resolution, describe_widget, resolve_outcome};
pub use errors::{ErrorFilter, TrellisError};
pub use extract::{ContextExtractor, RequestParts};
pub use page::{NavEntry, Page, PageContent, PathLookup, StaticPage, WidgetMount};
pub use protocol::{LocalWidgetService, ProcessReply, RemoteAction, WidgetService};
pub use render::{SlotRenderer, TemplateRenderer};
pub use session::{
  MemorySessionStore, Session, SessionError, SessionId, SessionManager, SessionStore,
  SharedSession,
};
pub use site::{Site, SiteParts};
pub use sniff::sniff_content_type;
pub use widget::{ActionKind, ActionOutcome, BoxFuture, RenderOutcome, Widget, WidgetManager};
