//! Integrations that rely on third-party engines.
//!
//! Currently this is the JavaScript sandbox used to run the portal's own
//! password encryption script.

pub mod interpreters;

pub use interpreters::{BoaSandbox, CompiledScript, SandboxError, ScriptSandbox};
