//! # energyfy-rs
//!
//! Authenticated scraping client for the campus single-sign-on portal and its
//! dormitory electricity balance API.
//!
//! The SSO login page encrypts the password client-side with a script it
//! serves itself, so each login downloads that script, runs it in an embedded
//! JavaScript sandbox, submits the form, and walks the redirect chain by hand
//! to end up with an authenticated cookie jar. A single batched request then
//! returns the balance of every requested room.
//!
//! Scheduling, notification delivery and config file handling belong to the
//! caller; this crate never retries, sleeps or caches sessions.
//!
//! ## Example
//!
//! ```no_run
//! use energyfy_rs::PortalClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PortalClient::new()?;
//!     let session = client.login("2022080912016", "password").await?;
//!     for room in client.query_balances(&session, &["121604", "121605"]).await? {
//!         match (room.room_name(), room.balance()) {
//!             (Some(name), Some(balance)) => println!("{name}: {balance:.2}"),
//!             _ => println!("{}: {}", room.id, room.message.as_deref().unwrap_or("")),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod portal;

pub mod auth;
pub mod balances;
pub mod external_deps;
pub mod modules;

pub use crate::portal::{PortalClient, PortalClientBuilder, PortalError, PortalResult};

pub use crate::auth::core::{
    BoxError,
    ConfigError,
    EncryptionAsset,
    LandingPage,
    LoginPayload,
    LoginSalt,
    PortalConfig,
    PortalHttpClient,
    PortalResponse,
    PortalSettings,
    RedirectHop,
    ReqwestConnector,
    ReqwestPortalClient,
    SaltSource,
    Session,
    SessionConnector,
    TransportError,
};

pub use crate::auth::encryptor::{CredentialEncryptor, EncryptError};
pub use crate::auth::login::{LoginError, LoginOrchestrator, LoginState};
pub use crate::auth::redirects::{
    RedirectError,
    RedirectOutcome,
    fetch_page,
    follow_redirects,
    resolve_location,
};

pub use crate::balances::{QueryError, RoomBalance, query_balances};

pub use crate::external_deps::interpreters::{
    BoaFlavor,
    BoaSandbox,
    CompiledScript,
    SandboxError,
    SandboxResult,
    ScriptSandbox,
};

pub use crate::modules::{
    EventDispatcher,
    EventHandler,
    LoggingHandler,
    PortalEvent,
    RedirectEvent,
    RequestEvent,
    ResponseEvent,
    RoomFailureEvent,
    StateEvent,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
