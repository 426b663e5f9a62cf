//! Scripted transport used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use http::header::{HeaderMap, HeaderName, HeaderValue, SET_COOKIE};
use url::Url;

use super::transport::{PortalHttpClient, Session, SessionConnector, TransportError};
use super::types::PortalResponse;
use crate::modules::events::EventDispatcher;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub fields: Vec<(String, String)>,
}

#[derive(Default)]
pub struct ScriptedClient {
    routes: Mutex<HashMap<(&'static str, String), VecDeque<PortalResponse>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    cookies: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_get(self, url: &str, response: PortalResponse) -> Self {
        self.push("GET", url, response);
        self
    }

    pub fn on_post(self, url: &str, response: PortalResponse) -> Self {
        self.push("POST", url, response);
        self
    }

    fn push(&self, method: &'static str, url: &str, response: PortalResponse) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, url.to_string()))
            .or_default()
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn into_session(self) -> (Arc<ScriptedClient>, Session) {
        let client = Arc::new(self);
        let session = Session::new(client.clone(), Arc::new(EventDispatcher::new()));
        (client, session)
    }

    fn respond(
        &self,
        method: &'static str,
        url: &Url,
        fields: &[(String, String)],
    ) -> Result<PortalResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            url: url.to_string(),
            fields: fields.to_vec(),
        });

        let response = self
            .routes
            .lock()
            .unwrap()
            .get_mut(&(method, url.to_string()))
            .and_then(|queue| queue.pop_front())
            .ok_or_else(|| {
                TransportError::request(
                    url,
                    std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "no scripted route"),
                )
            })?;

        let mut jar = self.cookies.lock().unwrap();
        for value in response.headers.get_all(SET_COOKIE) {
            if let Ok(cookie) = value.to_str()
                && let Some(pair) = cookie.split(';').next()
            {
                jar.push(pair.trim().to_string());
            }
        }

        Ok(response)
    }
}

#[async_trait]
impl PortalHttpClient for ScriptedClient {
    async fn get(&self, url: &Url) -> Result<PortalResponse, TransportError> {
        self.respond("GET", url, &[])
    }

    async fn post_form(
        &self,
        url: &Url,
        fields: &[(String, String)],
    ) -> Result<PortalResponse, TransportError> {
        self.respond("POST", url, fields)
    }

    fn cookies(&self, _url: &Url) -> Option<String> {
        let jar = self.cookies.lock().unwrap();
        if jar.is_empty() {
            None
        } else {
            Some(jar.join("; "))
        }
    }
}

/// Hands out pre-built clients in order, one per login.
pub struct ScriptedConnector {
    clients: Mutex<VecDeque<Arc<ScriptedClient>>>,
}

impl ScriptedConnector {
    pub fn new(clients: Vec<Arc<ScriptedClient>>) -> Self {
        Self {
            clients: Mutex::new(clients.into()),
        }
    }
}

impl SessionConnector for ScriptedConnector {
    fn connect(&self) -> Result<Arc<dyn PortalHttpClient>, TransportError> {
        let client = self.clients.lock().unwrap().pop_front().ok_or_else(|| {
            TransportError::Client("no scripted client left".into())
        })?;
        Ok(client)
    }
}

pub fn response(status: u16, url: &str, headers: &[(&str, &str)], body: &str) -> PortalResponse {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.append(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    PortalResponse::new(status, map, body.to_string(), Url::parse(url).unwrap())
}

pub fn redirect(url: &str, location: &str) -> PortalResponse {
    response(302, url, &[("location", location)], "")
}

pub fn ok(url: &str, body: &str) -> PortalResponse {
    response(200, url, &[], body)
}
