//! SSO login state machine.
//!
//! `Init → PageFetched → AssetResolved → CredentialEncrypted →
//! PayloadSubmitted → RedirectResolved`, with any failure ending in
//! `Failed`. Nothing here retries or sleeps; the caller owns that policy.
//!
//! The encryption asset is downloaded from the bare login page first; the
//! page and asset states are reported once the target form has been parsed.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use super::core::{
    LandingPage, LoginPayload, LoginSalt, PortalSettings, SaltSource, Session, TransportError,
    parse_login_form,
};
use super::encryptor::{CredentialEncryptor, EncryptError};
use super::redirects::{RedirectError, fetch_page, follow_redirects, resolve_location};
use crate::modules::events::{PortalEvent, StateEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Init,
    PageFetched,
    AssetResolved,
    CredentialEncrypted,
    PayloadSubmitted,
    RedirectResolved,
    Failed,
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoginState::Init => "init",
            LoginState::PageFetched => "page_fetched",
            LoginState::AssetResolved => "asset_resolved",
            LoginState::CredentialEncrypted => "credential_encrypted",
            LoginState::PayloadSubmitted => "payload_submitted",
            LoginState::RedirectResolved => "redirect_resolved",
            LoginState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Every way a login attempt can fail, each carrying its cause.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("unable to open http session: {0}")]
    Connect(#[source] TransportError),
    #[error("failed to fetch login target page: {0}")]
    TargetPage(#[source] RedirectError),
    #[error("login page has no execution token")]
    MissingExecutionToken,
    #[error("credential encryption failed: {0}")]
    Encrypt(#[from] EncryptError),
    #[error("credential submission failed: {0}")]
    Submit(#[source] TransportError),
    #[error("authentication failed (HTTP {status})")]
    AuthenticationFailed { status: u16 },
    #[error("login response (HTTP {status}) has no Location header")]
    MissingLoginLocation { status: u16 },
    #[error("post-login redirect chain failed: {0}")]
    Redirect(#[source] RedirectError),
}

impl LoginError {
    /// `true` when the portal rejected the credentials themselves.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, LoginError::AuthenticationFailed { .. })
    }
}

/// Drives one login attempt on a fresh session.
#[derive(Clone)]
pub struct LoginOrchestrator {
    settings: Arc<PortalSettings>,
    encryptor: CredentialEncryptor,
}

impl LoginOrchestrator {
    pub fn new(settings: Arc<PortalSettings>, encryptor: CredentialEncryptor) -> Self {
        Self {
            settings,
            encryptor,
        }
    }

    /// Authenticate `session`, returning it once the redirect chain resolves.
    pub async fn authenticate(
        &self,
        mut session: Session,
        username: &str,
        password: &str,
    ) -> Result<Session, LoginError> {
        transition(&session, LoginState::Init);
        match self.run(&mut session, username, password).await {
            Ok(()) => Ok(session),
            Err(err) => {
                transition(&session, LoginState::Failed);
                log::warn!("login failed: {err}");
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        session: &mut Session,
        username: &str,
        password: &str,
    ) -> Result<(), LoginError> {
        let settings = &self.settings;
        let origin = settings.portal_origin();

        // The bare login page is visited before the service-bound form so the
        // execution token submitted below is the most recent one issued.
        let asset = self.encryptor.resolve_asset(session).await?;

        let page = fetch_page(
            session,
            settings.target_url.clone(),
            settings.max_redirects,
            &origin,
        )
        .await
        .map_err(LoginError::TargetPage)?;
        let form = parse_login_form(&page.text());
        transition(session, LoginState::PageFetched);

        let execution = form
            .execution
            .clone()
            .ok_or(LoginError::MissingExecutionToken)?;
        let salt = LoginSalt::resolve(form.salt.clone(), &settings.fallback_salt);
        if salt.source == SaltSource::Fallback {
            log::debug!("login page has no salt input, using fallback salt");
        }
        transition(session, LoginState::AssetResolved);

        let ciphertext = self.encryptor.encrypt(&asset, password, &salt)?;
        transition(session, LoginState::CredentialEncrypted);

        let mut payload = LoginPayload::new(username, &ciphertext, &execution);
        payload.extend_hidden(form.hidden_fields);

        let response = session
            .post_form(&settings.login_url, payload.fields())
            .await
            .map_err(LoginError::Submit)?;
        if !response.is_redirect() {
            return Err(LoginError::AuthenticationFailed {
                status: response.status,
            });
        }
        let location = response
            .location()
            .ok_or(LoginError::MissingLoginLocation {
                status: response.status,
            })?;
        let next = resolve_location(location, &settings.login_url, &origin)
            .map_err(LoginError::Redirect)?;
        transition(session, LoginState::PayloadSubmitted);

        let outcome = follow_redirects(session, next, settings.max_redirects, &origin)
            .await
            .map_err(LoginError::Redirect)?;

        log::info!(
            "logged in as {username}, landed on {} after {} redirects",
            outcome.response.url,
            outcome.hops.len()
        );
        session.mark_authenticated(LandingPage {
            url: outcome.response.url,
            status: outcome.response.status,
            hops: outcome.hops,
        });
        transition(session, LoginState::RedirectResolved);

        Ok(())
    }
}

fn transition(session: &Session, state: LoginState) {
    session.events().dispatch(PortalEvent::State(StateEvent {
        state,
        timestamp: Utc::now(),
    }));
}
