//! HTTP transport abstraction and the per-login [`Session`].
//!
//! Implementations must never follow redirects on their own and must keep
//! cookies between calls, so the walker can observe every 30x response and
//! the cookies set along the way.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use http::Method;
use thiserror::Error;
use url::Url;

use super::types::{PortalResponse, RedirectHop};
use crate::modules::events::{EventDispatcher, PortalEvent, RequestEvent, ResponseEvent};

/// Boxed cause attached to transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Contract for the HTTP client backing one session.
#[async_trait]
pub trait PortalHttpClient: Send + Sync {
    async fn get(&self, url: &Url) -> Result<PortalResponse, TransportError>;

    async fn post_form(
        &self,
        url: &Url,
        fields: &[(String, String)],
    ) -> Result<PortalResponse, TransportError>;

    /// `Cookie` header value the client would currently send to `url`.
    fn cookies(&self, url: &Url) -> Option<String>;
}

/// Creates an independent HTTP client, with an empty cookie jar, per login.
pub trait SessionConnector: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn PortalHttpClient>, TransportError>;
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: Url,
        #[source]
        source: BoxError,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: Url, status: u16 },
    #[error("http client setup failed: {0}")]
    Client(#[source] BoxError),
}

impl TransportError {
    pub fn request(url: &Url, source: impl Into<BoxError>) -> Self {
        TransportError::Request {
            url: url.clone(),
            source: source.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Where an authenticated login ended up.
#[derive(Debug, Clone)]
pub struct LandingPage {
    pub url: Url,
    pub status: u16,
    pub hops: Vec<RedirectHop>,
}

/// Cookie jar plus fixed headers representing one login attempt.
///
/// A session is owned by the invocation that created it; it is never cached
/// or shared between logins.
pub struct Session {
    client: Arc<dyn PortalHttpClient>,
    events: Arc<EventDispatcher>,
    landing: Option<LandingPage>,
}

impl Session {
    pub fn new(client: Arc<dyn PortalHttpClient>, events: Arc<EventDispatcher>) -> Self {
        Self {
            client,
            events,
            landing: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.landing.is_some()
    }

    pub fn landing(&self) -> Option<&LandingPage> {
        self.landing.as_ref()
    }

    /// Redirect hops recorded while authenticating, empty before login.
    pub fn redirect_history(&self) -> &[RedirectHop] {
        self.landing
            .as_ref()
            .map(|landing| landing.hops.as_slice())
            .unwrap_or(&[])
    }

    pub fn cookies_for(&self, url: &Url) -> Option<String> {
        self.client.cookies(url)
    }

    pub(crate) fn mark_authenticated(&mut self, landing: LandingPage) {
        self.landing = Some(landing);
    }

    pub(crate) fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub async fn get(&self, url: &Url) -> Result<PortalResponse, TransportError> {
        self.emit_request(Method::GET, url);
        let started = Instant::now();
        let response = self.client.get(url).await?;
        self.emit_response(Method::GET, &response, started);
        Ok(response)
    }

    pub async fn post_form(
        &self,
        url: &Url,
        fields: &[(String, String)],
    ) -> Result<PortalResponse, TransportError> {
        self.emit_request(Method::POST, url);
        let started = Instant::now();
        let response = self.client.post_form(url, fields).await?;
        self.emit_response(Method::POST, &response, started);
        Ok(response)
    }

    fn emit_request(&self, method: Method, url: &Url) {
        self.events.dispatch(PortalEvent::Request(RequestEvent {
            url: url.clone(),
            method,
            timestamp: Utc::now(),
        }));
    }

    fn emit_response(&self, method: Method, response: &PortalResponse, started: Instant) {
        self.events.dispatch(PortalEvent::Response(ResponseEvent {
            url: response.url.clone(),
            method,
            status: response.status,
            latency: started.elapsed(),
            timestamp: Utc::now(),
        }));
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("landing", &self.landing.as_ref().map(|l| l.url.as_str()))
            .finish()
    }
}
