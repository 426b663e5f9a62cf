//! Portal endpoints and protocol constants.
//!
//! [`PortalConfig`] is the plain, serialisable form the surrounding system
//! hands in. It is resolved once into [`PortalSettings`], which holds parsed
//! URLs and the compiled script pattern used by every component.

use std::time::Duration;

use http::header::{ACCEPT, ACCEPT_LANGUAGE, CONNECTION, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::external_deps::interpreters::validate_function_name;

pub const DEFAULT_SSO_BASE_URL: &str = "https://idas.uestc.edu.cn";
pub const DEFAULT_LOGIN_PATH: &str = "/authserver/login";
pub const DEFAULT_TARGET_URL: &str =
    "https://eportal.uestc.edu.cn/qljfwapp/sys/lwUestcDormElecPrepaid/index.do#/record";
pub const DEFAULT_BALANCE_API_URL: &str = "https://eportal.uestc.edu.cn/qljfwapp/sys/lwUestcDormElecPrepaid/dormElecPrepaidMan/queryRoomInfo.do";
pub const DEFAULT_ENCRYPT_SCRIPT_PATTERN: &str =
    r"/authserver/uestcTheme/static/common/encrypt\.js\?v=.*";
pub const DEFAULT_ENCRYPT_ENTRY_POINT: &str = "encryptPassword";
/// Salt the portal script falls back to when the login page omits one.
pub const DEFAULT_FALLBACK_SALT: &str = "rjBFAaHsNkKAhpoi";
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Serializable portal configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub sso_base_url: String,
    pub login_path: String,
    pub target_url: String,
    pub balance_api_url: String,
    pub encrypt_script_pattern: String,
    pub encrypt_entry_point: String,
    pub fallback_salt: String,
    pub max_redirects: usize,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            sso_base_url: DEFAULT_SSO_BASE_URL.into(),
            login_path: DEFAULT_LOGIN_PATH.into(),
            target_url: DEFAULT_TARGET_URL.into(),
            balance_api_url: DEFAULT_BALANCE_API_URL.into(),
            encrypt_script_pattern: DEFAULT_ENCRYPT_SCRIPT_PATTERN.into(),
            encrypt_entry_point: DEFAULT_ENCRYPT_ENTRY_POINT.into(),
            fallback_salt: DEFAULT_FALLBACK_SALT.into(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            request_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36".into(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".into(),
            accept_language: "zh-CN,zh;q=0.9,en;q=0.8".into(),
        }
    }
}

/// Invalid configuration values, reported before any request is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid url for {field}: {source}")]
    Url {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid encryption script pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("encryption entry point '{0}' is not a plain identifier")]
    InvalidEntryPoint(String),
}

/// Resolved, validated settings shared by every component of a client.
#[derive(Debug, Clone)]
pub struct PortalSettings {
    pub sso_base: Url,
    pub login_url: Url,
    pub target_url: Url,
    pub balance_api: Url,
    pub encrypt_script_pattern: Regex,
    pub encrypt_entry_point: String,
    pub fallback_salt: String,
    pub max_redirects: usize,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub default_headers: HeaderMap,
}

impl PortalSettings {
    pub fn resolve(config: &PortalConfig) -> Result<Self, ConfigError> {
        let sso_base = parse_url("sso_base_url", &config.sso_base_url)?;
        let login_url = sso_base
            .join(&config.login_path)
            .map_err(|source| ConfigError::Url {
                field: "login_path",
                source,
            })?;
        let target_url = parse_url("target_url", &config.target_url)?;
        let balance_api = parse_url("balance_api_url", &config.balance_api_url)?;

        if config.encrypt_entry_point.trim().is_empty() {
            return Err(ConfigError::Empty("encrypt_entry_point"));
        }
        validate_function_name(&config.encrypt_entry_point)
            .map_err(|_| ConfigError::InvalidEntryPoint(config.encrypt_entry_point.clone()))?;

        let mut default_headers = HeaderMap::new();
        insert_header(&mut default_headers, USER_AGENT, "user_agent", &config.user_agent)?;
        insert_header(&mut default_headers, ACCEPT, "accept", &config.accept)?;
        insert_header(
            &mut default_headers,
            ACCEPT_LANGUAGE,
            "accept_language",
            &config.accept_language,
        )?;
        default_headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        Ok(Self {
            sso_base,
            login_url,
            target_url,
            balance_api,
            encrypt_script_pattern: Regex::new(&config.encrypt_script_pattern)?,
            encrypt_entry_point: config.encrypt_entry_point.clone(),
            fallback_salt: config.fallback_salt.clone(),
            max_redirects: config.max_redirects,
            request_timeout: Duration::from_millis(config.request_timeout_ms.max(1)),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms.max(1)),
            default_headers,
        })
    }

    /// `scheme://host[:port]` of the SSO portal, used for root-relative redirects.
    pub fn portal_origin(&self) -> String {
        super::analysis::origin_from_url(&self.sso_base)
    }
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self::resolve(&PortalConfig::default()).expect("default portal config is valid")
    }
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|source| ConfigError::Url { field, source })
}

fn insert_header(
    headers: &mut HeaderMap,
    name: HeaderName,
    field: &'static str,
    value: &str,
) -> Result<(), ConfigError> {
    let value = HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidHeader(field))?;
    headers.insert(name, value);
    Ok(())
}
