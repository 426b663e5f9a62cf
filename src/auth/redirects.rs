//! Manual redirect following.
//!
//! The HTTP client never follows redirects itself; the walker issues each
//! GET, records the hop with the cookies in effect, and resolves `Location`
//! the way the portal expects:
//! - absolute URLs pass through unchanged;
//! - `/path` is joined to the SSO portal origin;
//! - anything else is joined to the origin of the *current* hop.

use chrono::Utc;
use thiserror::Error;
use url::Url;

use super::core::{PortalResponse, RedirectHop, Session, TransportError, origin_from_url};
use crate::modules::events::{PortalEvent, RedirectEvent};

#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("redirect request failed: {0}")]
    Request(#[source] TransportError),
    #[error("exceeded maximum of {max} redirects")]
    TooManyRedirects { max: usize, last_url: Url },
    #[error("redirect response from {url} has no Location header")]
    MissingLocation { url: Url, status: u16 },
    #[error("unable to resolve redirect location '{location}': {source}")]
    InvalidLocation {
        location: String,
        #[source]
        source: url::ParseError,
    },
}

/// Terminal (non-redirect) response plus every redirect that led to it.
#[derive(Debug, Clone)]
pub struct RedirectOutcome {
    pub response: PortalResponse,
    pub hops: Vec<RedirectHop>,
}

/// Walk the redirect chain starting at `start` until a non-redirect response.
///
/// Fails with [`RedirectError::TooManyRedirects`] as soon as the number of
/// redirects exceeds `max_hops`, without issuing another request. HTTP error
/// statuses (4xx/5xx) abort the walk as [`RedirectError::Request`].
pub async fn follow_redirects(
    session: &Session,
    start: Url,
    max_hops: usize,
    portal_origin: &str,
) -> Result<RedirectOutcome, RedirectError> {
    let mut current = start;
    let mut hops = Vec::new();

    loop {
        let response = session
            .get(&current)
            .await
            .map_err(RedirectError::Request)?;

        if response.status >= 400 {
            return Err(RedirectError::Request(TransportError::Status {
                url: current,
                status: response.status,
            }));
        }

        if !response.is_redirect() {
            return Ok(RedirectOutcome { response, hops });
        }

        hops.push(RedirectHop {
            url: current.clone(),
            status: response.status,
            headers: response.headers.clone(),
            cookies: session.cookies_for(&current),
        });

        if hops.len() > max_hops {
            return Err(RedirectError::TooManyRedirects {
                max: max_hops,
                last_url: current,
            });
        }

        let location = response
            .location()
            .ok_or_else(|| RedirectError::MissingLocation {
                url: current.clone(),
                status: response.status,
            })?;
        let next = resolve_location(location, &current, portal_origin)?;

        session.events().dispatch(PortalEvent::Redirect(RedirectEvent {
            from: current.clone(),
            to: next.clone(),
            status: response.status,
            hop: hops.len(),
            timestamp: Utc::now(),
        }));

        current = next;
    }
}

/// GET a page through the walker and require a 2xx landing.
pub async fn fetch_page(
    session: &Session,
    url: Url,
    max_hops: usize,
    portal_origin: &str,
) -> Result<PortalResponse, RedirectError> {
    let outcome = follow_redirects(session, url, max_hops, portal_origin).await?;
    if !outcome.response.is_success() {
        return Err(RedirectError::Request(TransportError::Status {
            url: outcome.response.url.clone(),
            status: outcome.response.status,
        }));
    }
    Ok(outcome.response)
}

/// Resolve a `Location` value relative to the hop that produced it.
pub fn resolve_location(
    location: &str,
    current: &Url,
    portal_origin: &str,
) -> Result<Url, RedirectError> {
    let location = location.trim();
    let invalid = |source| RedirectError::InvalidLocation {
        location: location.to_string(),
        source,
    };

    if let Ok(absolute) = Url::parse(location)
        && absolute.has_host()
    {
        return Ok(absolute);
    }

    if location.starts_with("//") {
        return current.join(location).map_err(invalid);
    }

    let joined = if location.starts_with('/') {
        format!("{portal_origin}{location}")
    } else {
        format!("{}/{location}", origin_from_url(current))
    };

    Url::parse(&joined).map_err(invalid)
}
