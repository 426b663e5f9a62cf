//! Cross-cutting services module
//!
//! Observation hooks shared by the login and balance query layers.

pub mod events;

pub use events::{
    EventDispatcher, EventHandler, LoggingHandler, PortalEvent, RedirectEvent, RequestEvent,
    ResponseEvent, RoomFailureEvent, StateEvent,
};
