//! Event system for the portal client.
//!
//! Components never log through global state of their own; they emit
//! [`PortalEvent`]s into the [`EventDispatcher`] injected by the caller, and
//! handlers decide what to do with them.

use chrono::{DateTime, Utc};
use http::Method;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::auth::login::LoginState;

/// Structured pre-request event.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub url: Url,
    pub method: Method,
    pub timestamp: DateTime<Utc>,
}

/// Structured post-response event.
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    pub url: Url,
    pub method: Method,
    pub status: u16,
    pub latency: Duration,
    pub timestamp: DateTime<Utc>,
}

/// Login state machine transition.
#[derive(Debug, Clone)]
pub struct StateEvent {
    pub state: LoginState,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RedirectEvent {
    pub from: Url,
    pub to: Url,
    pub status: u16,
    pub hop: usize,
    pub timestamp: DateTime<Utc>,
}

/// A single room that the balance API refused to answer for.
#[derive(Debug, Clone)]
pub struct RoomFailureEvent {
    pub room_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum PortalEvent {
    Request(RequestEvent),
    Response(ResponseEvent),
    State(StateEvent),
    Redirect(RedirectEvent),
    RoomFailure(RoomFailureEvent),
}

/// Trait implemented by event handlers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &PortalEvent);
}

/// Dispatcher that broadcasts events to registered handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn dispatch(&self, event: PortalEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Logs events using the `log` crate.
#[derive(Debug)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &PortalEvent) {
        match event {
            PortalEvent::Request(req) => {
                log::debug!("-> {} {}", req.method, req.url);
            }
            PortalEvent::Response(resp) => {
                log::debug!(
                    "<- {} {} -> {} ({:.2}s)",
                    resp.method,
                    resp.url,
                    resp.status,
                    resp.latency.as_secs_f64()
                );
            }
            PortalEvent::State(state) => {
                log::info!("login state -> {}", state.state);
            }
            PortalEvent::Redirect(redirect) => {
                log::debug!(
                    "redirect #{} {} ({}) -> {}",
                    redirect.hop,
                    redirect.from,
                    redirect.status,
                    redirect.to
                );
            }
            PortalEvent::RoomFailure(failure) => {
                log::warn!("room {} query failed: {}", failure.room_id, failure.message);
            }
        }
    }
}
