//! Core data structures shared by the encryptor, redirect walker and login flow.

use bytes::Bytes;
use http::HeaderMap;
use http::header::LOCATION;
use url::Url;

/// Minimal representation of an HTTP response returned by the transport.
#[derive(Debug, Clone)]
pub struct PortalResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub url: Url,
}

impl PortalResponse {
    pub fn new(status: u16, headers: HeaderMap, body: impl Into<Bytes>, url: Url) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            url,
        }
    }

    /// Only the redirect codes the portal actually uses count; 300/304 do not.
    pub fn is_redirect(&self) -> bool {
        is_redirect_status(self.status)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub fn is_redirect_status(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// One redirect response observed while walking a chain.
#[derive(Debug, Clone)]
pub struct RedirectHop {
    pub url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    /// `Cookie` header the jar would send to `url` right after this response.
    ///
    /// Only cookies in scope for this hop's own URL are included; cookies the
    /// chain set for other hosts or paths show up on the hops that target
    /// them, or through [`Session::cookies_for`](super::Session::cookies_for).
    pub cookies: Option<String>,
}

/// The portal-served script whose embedded function computes the ciphertext.
#[derive(Debug, Clone)]
pub struct EncryptionAsset {
    pub script_url: Url,
    pub script_body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaltSource {
    Page,
    Fallback,
}

/// Salt handed to the encryption routine alongside the password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSalt {
    pub value: String,
    pub source: SaltSource,
}

impl LoginSalt {
    pub fn from_page(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            source: SaltSource::Page,
        }
    }

    pub fn fallback(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            source: SaltSource::Fallback,
        }
    }

    /// Page salt when present, otherwise the fallback literal.
    pub fn resolve(page_value: Option<String>, fallback: &str) -> Self {
        match page_value {
            Some(value) => Self::from_page(value),
            None => Self::fallback(fallback),
        }
    }
}

/// Ordered form fields posted to the login endpoint.
///
/// Keys are unique; the first insertion of a key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginPayload {
    fields: Vec<(String, String)>,
}

impl LoginPayload {
    /// Seed the payload with the credential and the fixed protocol fields.
    pub fn new(username: &str, ciphertext: &str, execution: &str) -> Self {
        let mut payload = Self::default();
        payload.insert_if_absent("username", username);
        payload.insert_if_absent("password", ciphertext);
        payload.insert_if_absent("captcha", "");
        payload.insert_if_absent("_eventId", "submit");
        payload.insert_if_absent("cllt", "userNameLogin");
        payload.insert_if_absent("dllt", "generalLogin");
        payload.insert_if_absent("lt", "");
        payload.insert_if_absent("execution", execution);
        payload
    }

    /// Returns `false` when the key was already present and left untouched.
    pub fn insert_if_absent(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.fields.push((name, value.into()));
        true
    }

    /// Merge page hidden inputs without overriding existing keys.
    pub fn extend_hidden<I>(&mut self, hidden: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in hidden {
            self.insert_if_absent(name, value);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(key, _)| key == name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
