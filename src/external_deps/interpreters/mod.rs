//! JavaScript sandbox infrastructure.
//!
//! The portal ships its password encryption routine as a script, so the
//! client needs somewhere to run it. Runtimes are hidden behind
//! [`ScriptSandbox`] so any embeddable engine can be substituted; the only
//! hard requirement is that scripts get no network or filesystem access.

mod boa;

pub use boa::{BoaFlavor, BoaSandbox};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Engine able to compile a self-contained script body.
pub trait ScriptSandbox: Send + Sync {
    /// Name used in diagnostics when several sandboxes are tried in turn.
    fn name(&self) -> &str;

    /// Evaluate `source` in a fresh context and keep that context for calls.
    fn compile(&self, source: &str) -> Result<Box<dyn CompiledScript>, SandboxError>;
}

/// A compiled script whose top-level functions can be invoked.
pub trait CompiledScript {
    /// Returns `true` when `name` resolves to a callable global.
    fn has_function(&mut self, name: &str) -> Result<bool, SandboxError>;

    /// Call the global function `name` with string arguments and coerce the
    /// result to a string.
    fn call(&mut self, name: &str, args: &[&str]) -> Result<String, SandboxError>;
}

/// Failures produced by script sandboxes.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("script compilation failed: {0}")]
    Compile(String),
    #[error("script execution failed: {0}")]
    Execution(String),
    #[error("function '{0}' is not defined")]
    MissingFunction(String),
    #[error("invalid function name '{0}'")]
    InvalidFunctionName(String),
    #[error("script engine error: {0}")]
    Other(String),
}

/// Convenience alias for sandbox results.
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Only plain identifiers are spliced into call expressions.
pub(crate) fn validate_function_name(name: &str) -> SandboxResult<()> {
    static IDENT_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap());

    if IDENT_RE.is_match(name) {
        Ok(())
    } else {
        Err(SandboxError::InvalidFunctionName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_identifiers_only() {
        assert!(validate_function_name("encryptPassword").is_ok());
        assert!(validate_function_name("$_x1").is_ok());
        assert!(validate_function_name("a();b").is_err());
        assert!(validate_function_name("1abc").is_err());
        assert!(validate_function_name("").is_err());
    }
}
