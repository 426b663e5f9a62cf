//! Password encryption through the portal's own script.
//!
//! The SSO login page references a versioned `encrypt.js`. Its
//! `encryptPassword(password, salt)` routine is what the browser runs before
//! submitting, so the client downloads the current script and runs it in a
//! sandbox instead of reimplementing the cipher.

use std::sync::Arc;

use thiserror::Error;
use url::Url;

use super::core::{
    EncryptionAsset, LoginSalt, PortalResponse, PortalSettings, Session, find_encrypt_script,
};
use super::redirects::{RedirectError, fetch_page};
use crate::external_deps::interpreters::{
    BoaSandbox, CompiledScript, SandboxError, ScriptSandbox,
};

/// Global function appended to the portal script; forwards to its entry point.
pub const ADAPTER_FUNCTION: &str = "__energyfyEncrypt";

#[derive(Debug, Error)]
pub enum EncryptError {
    #[error("no script on {page} matches the encryption asset pattern")]
    AssetNotFound { page: Url },
    #[error("failed to fetch {what}: {source}")]
    ScriptFetch {
        what: &'static str,
        #[source]
        source: RedirectError,
    },
    #[error("invalid script url '{src}': {source}")]
    InvalidScriptUrl {
        src: String,
        #[source]
        source: url::ParseError,
    },
    #[error("encryption script failed in every sandbox: {}", format_attempts(.attempts))]
    ScriptExecution { attempts: Vec<(String, SandboxError)> },
    #[error("encryption script returned an empty ciphertext")]
    EmptyCiphertext,
}

fn format_attempts(attempts: &[(String, SandboxError)]) -> String {
    attempts
        .iter()
        .map(|(name, err)| format!("[{name}] {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Fetches the encryption asset and runs it against a password.
#[derive(Clone)]
pub struct CredentialEncryptor {
    settings: Arc<PortalSettings>,
    sandboxes: Vec<Arc<dyn ScriptSandbox>>,
}

impl CredentialEncryptor {
    /// Plain Boa context first, browser-flavoured Boa context as fallback.
    pub fn new(settings: Arc<PortalSettings>) -> Self {
        let host = settings.sso_base.host_str().unwrap_or_default().to_string();
        Self {
            settings,
            sandboxes: vec![
                Arc::new(BoaSandbox::new()),
                Arc::new(BoaSandbox::browser(host)),
            ],
        }
    }

    /// Replace the sandboxes; they are tried in order.
    pub fn with_sandboxes(mut self, sandboxes: Vec<Arc<dyn ScriptSandbox>>) -> Self {
        self.sandboxes = sandboxes;
        self
    }

    /// Fetch the bare login page, locate the encryption script and download it.
    pub async fn resolve_asset(&self, session: &Session) -> Result<EncryptionAsset, EncryptError> {
        let page = self.fetch(session, self.settings.login_url.clone(), "login page").await?;

        let src = find_encrypt_script(&page.text(), &self.settings.encrypt_script_pattern)
            .ok_or_else(|| EncryptError::AssetNotFound {
                page: page.url.clone(),
            })?;
        let script_url = self
            .settings
            .sso_base
            .join(&src)
            .map_err(|source| EncryptError::InvalidScriptUrl { src, source })?;

        log::debug!("encryption asset resolved to {script_url}");

        let script = self.fetch(session, script_url.clone(), "encryption script").await?;

        Ok(EncryptionAsset {
            script_url,
            script_body: script.text(),
        })
    }

    /// Run the asset's entry point on `password` and `salt`.
    ///
    /// Each sandbox is tried in turn. A compile failure, a missing entry point
    /// or a failed call moves on to the next one; only an empty ciphertext
    /// stops early.
    pub fn encrypt(
        &self,
        asset: &EncryptionAsset,
        password: &str,
        salt: &LoginSalt,
    ) -> Result<String, EncryptError> {
        let source = self.adapted_source(&asset.script_body);
        let mut attempts = Vec::new();

        for sandbox in &self.sandboxes {
            match self.run_in(sandbox.as_ref(), &source, password, &salt.value) {
                Ok(ciphertext) if ciphertext.is_empty() => return Err(EncryptError::EmptyCiphertext),
                Ok(ciphertext) => return Ok(ciphertext),
                Err(err) => {
                    log::warn!("sandbox {} could not run encryption script: {err}", sandbox.name());
                    attempts.push((sandbox.name().to_string(), err));
                }
            }
        }

        Err(EncryptError::ScriptExecution { attempts })
    }

    /// Resolve the asset and encrypt in one step.
    pub async fn encrypt_password(
        &self,
        session: &Session,
        password: &str,
        salt: &LoginSalt,
    ) -> Result<String, EncryptError> {
        let asset = self.resolve_asset(session).await?;
        self.encrypt(&asset, password, salt)
    }

    async fn fetch(
        &self,
        session: &Session,
        url: Url,
        what: &'static str,
    ) -> Result<PortalResponse, EncryptError> {
        fetch_page(
            session,
            url,
            self.settings.max_redirects,
            &self.settings.portal_origin(),
        )
        .await
        .map_err(|source| EncryptError::ScriptFetch { what, source })
    }

    fn adapted_source(&self, script_body: &str) -> String {
        format!(
            "{script_body}\n;function {ADAPTER_FUNCTION}(password, salt) {{ return {entry}(password, salt); }}\n",
            entry = self.settings.encrypt_entry_point
        )
    }

    fn run_in(
        &self,
        sandbox: &dyn ScriptSandbox,
        source: &str,
        password: &str,
        salt: &str,
    ) -> Result<String, SandboxError> {
        let mut script: Box<dyn CompiledScript> = sandbox.compile(source)?;

        // Some builds only define the entry point once browser globals exist.
        let entry = &self.settings.encrypt_entry_point;
        if !script.has_function(entry)? {
            return Err(SandboxError::MissingFunction(entry.clone()));
        }

        script.call(ADAPTER_FUNCTION, &[password, salt])
    }
}
