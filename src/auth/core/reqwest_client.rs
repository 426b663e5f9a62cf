//! Reqwest-based implementation of the `PortalHttpClient` trait.
//!
//! Provides a thin adapter around `reqwest::Client` with redirects disabled
//! and a private cookie jar, so the redirect walker sees every 30x response
//! and the cookies set along the chain.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, redirect::Policy};
use url::Url;

use super::settings::PortalSettings;
use super::transport::{PortalHttpClient, SessionConnector, TransportError};
use super::types::PortalResponse;

/// Reqwest-backed HTTP client owning one cookie jar.
pub struct ReqwestPortalClient {
    client: Client,
    jar: Arc<Jar>,
}

impl ReqwestPortalClient {
    /// Builds a client with redirects disabled, the portal's fixed headers,
    /// and both connect and whole-request timeouts.
    pub fn new(settings: &PortalSettings) -> Result<Self, TransportError> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .redirect(Policy::none())
            .cookie_provider(jar.clone())
            .default_headers(settings.default_headers.clone())
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| TransportError::Client(Box::new(err)))?;

        Ok(Self { client, jar })
    }
}

#[async_trait]
impl PortalHttpClient for ReqwestPortalClient {
    async fn get(&self, url: &Url) -> Result<PortalResponse, TransportError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|err| TransportError::request(url, err))?;

        to_portal_response(url, response).await
    }

    async fn post_form(
        &self,
        url: &Url,
        fields: &[(String, String)],
    ) -> Result<PortalResponse, TransportError> {
        let response = self
            .client
            .post(url.as_str())
            .form(fields)
            .send()
            .await
            .map_err(|err| TransportError::request(url, err))?;

        to_portal_response(url, response).await
    }

    fn cookies(&self, url: &Url) -> Option<String> {
        self.jar
            .cookies(url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }
}

async fn to_portal_response(
    requested: &Url,
    response: reqwest::Response,
) -> Result<PortalResponse, TransportError> {
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let url = response.url().clone();
    let body = response
        .bytes()
        .await
        .map_err(|err| TransportError::request(requested, err))?;

    Ok(PortalResponse::new(status, headers, body, url))
}

/// Opens a fresh [`ReqwestPortalClient`] for every login.
pub struct ReqwestConnector {
    settings: Arc<PortalSettings>,
}

impl ReqwestConnector {
    pub fn new(settings: Arc<PortalSettings>) -> Self {
        Self { settings }
    }
}

impl SessionConnector for ReqwestConnector {
    fn connect(&self) -> Result<Arc<dyn PortalHttpClient>, TransportError> {
        Ok(Arc::new(ReqwestPortalClient::new(&self.settings)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_opens_independent_clients() {
        let connector = ReqwestConnector::new(Arc::new(PortalSettings::default()));
        let first = connector.connect().unwrap();
        let second = connector.connect().unwrap();
        let url = Url::parse("https://idas.uestc.edu.cn/authserver/login").unwrap();
        assert!(first.cookies(&url).is_none());
        assert!(second.cookies(&url).is_none());
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
