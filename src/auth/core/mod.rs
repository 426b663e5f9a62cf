//! Core utilities shared by the encryptor, redirect walker and login flow.

pub mod analysis;
pub mod reqwest_client;
pub mod settings;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use analysis::{LoginForm, find_encrypt_script, origin_from_url, parse_login_form};
pub use reqwest_client::{ReqwestConnector, ReqwestPortalClient};
pub use settings::{ConfigError, PortalConfig, PortalSettings};
pub use transport::{
    BoxError, LandingPage, PortalHttpClient, Session, SessionConnector, TransportError,
};
pub use types::{
    EncryptionAsset, LoginPayload, LoginSalt, PortalResponse, RedirectHop, SaltSource,
    is_redirect_status,
};
