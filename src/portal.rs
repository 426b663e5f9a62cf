//! High level portal client.
//!
//! Wires together settings, the session connector, the credential encryptor
//! and the event dispatcher to expose `login` and `query_balances`. Every
//! `login` opens a brand new session; nothing is cached between calls.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::auth::core::{
	ConfigError, PortalConfig, PortalSettings, ReqwestConnector, Session, SessionConnector,
};
use crate::auth::encryptor::CredentialEncryptor;
use crate::auth::login::{LoginError, LoginOrchestrator};
use crate::balances::{QueryError, RoomBalance, query_balances};
use crate::external_deps::interpreters::ScriptSandbox;
use crate::modules::events::{EventDispatcher, EventHandler, LoggingHandler};

/// Result alias used across the client layer.
pub type PortalResult<T> = Result<T, PortalError>;

/// High-level error surfaced by the client.
#[derive(Debug, Error)]
pub enum PortalError {
	#[error("invalid configuration: {0}")]
	Config(#[from] ConfigError),
	#[error("login failed: {0}")]
	Login(#[from] LoginError),
	#[error("balance query failed: {0}")]
	Query(#[from] QueryError),
}

/// Fluent builder for [`PortalClient`].
pub struct PortalClientBuilder {
	config: PortalConfig,
	connector: Option<Arc<dyn SessionConnector>>,
	sandboxes: Vec<Arc<dyn ScriptSandbox>>,
	handlers: Vec<Arc<dyn EventHandler>>,
	log_events: bool,
}

impl PortalClientBuilder {
	pub fn new() -> Self {
		Self {
			config: PortalConfig::default(),
			connector: None,
			sandboxes: Vec::new(),
			handlers: Vec::new(),
			log_events: true,
		}
	}

	pub fn with_config(mut self, config: PortalConfig) -> Self {
		self.config = config;
		self
	}

	pub fn with_sso_base_url(mut self, url: impl Into<String>) -> Self {
		self.config.sso_base_url = url.into();
		self
	}

	pub fn with_target_url(mut self, url: impl Into<String>) -> Self {
		self.config.target_url = url.into();
		self
	}

	pub fn with_balance_api_url(mut self, url: impl Into<String>) -> Self {
		self.config.balance_api_url = url.into();
		self
	}

	pub fn with_fallback_salt(mut self, salt: impl Into<String>) -> Self {
		self.config.fallback_salt = salt.into();
		self
	}

	pub fn with_max_redirects(mut self, max: usize) -> Self {
		self.config.max_redirects = max;
		self
	}

	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout_ms = duration_millis(timeout);
		self
	}

	pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
		self.config.connect_timeout_ms = duration_millis(timeout);
		self
	}

	/// Replace how sessions get their HTTP client (tests, proxies, custom TLS).
	pub fn with_connector(mut self, connector: Arc<dyn SessionConnector>) -> Self {
		self.connector = Some(connector);
		self
	}

	/// Add a sandbox; when any are given they replace the default Boa pair.
	pub fn with_sandbox(mut self, sandbox: Arc<dyn ScriptSandbox>) -> Self {
		self.sandboxes.push(sandbox);
		self
	}

	pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
		self.handlers.push(handler);
		self
	}

	/// Do not register the default [`LoggingHandler`].
	pub fn without_logging(mut self) -> Self {
		self.log_events = false;
		self
	}

	pub fn build(self) -> PortalResult<PortalClient> {
		let settings = Arc::new(PortalSettings::resolve(&self.config)?);

		let connector: Arc<dyn SessionConnector> = match self.connector {
			Some(connector) => connector,
			None => Arc::new(ReqwestConnector::new(settings.clone())),
		};

		let mut encryptor = CredentialEncryptor::new(settings.clone());
		if !self.sandboxes.is_empty() {
			encryptor = encryptor.with_sandboxes(self.sandboxes);
		}

		let mut events = EventDispatcher::new();
		if self.log_events {
			events.register_handler(Arc::new(LoggingHandler));
		}
		for handler in self.handlers {
			events.register_handler(handler);
		}

		Ok(PortalClient {
			login: LoginOrchestrator::new(settings.clone(), encryptor),
			settings,
			connector,
			events: Arc::new(events),
		})
	}
}

fn duration_millis(timeout: Duration) -> u64 {
	u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

impl Default for PortalClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Authenticated scraping client for the SSO portal and balance API.
///
/// Holds no mutable state; concurrent logins from one client each get their
/// own session and cookie jar.
pub struct PortalClient {
	settings: Arc<PortalSettings>,
	connector: Arc<dyn SessionConnector>,
	login: LoginOrchestrator,
	events: Arc<EventDispatcher>,
}

impl PortalClient {
	/// Construct a client with default configuration.
	pub fn new() -> PortalResult<Self> {
		PortalClientBuilder::new().build()
	}

	/// Obtain a builder to customise the client.
	pub fn builder() -> PortalClientBuilder {
		PortalClientBuilder::new()
	}

	pub fn settings(&self) -> &PortalSettings {
		&self.settings
	}

	/// Log in with a fresh session.
	pub async fn login(&self, username: &str, password: &str) -> Result<Session, LoginError> {
		let client = self.connector.connect().map_err(LoginError::Connect)?;
		let session = Session::new(client, self.events.clone());
		self.login.authenticate(session, username, password).await
	}

	/// Query balances for `ids` with a session produced by [`PortalClient::login`].
	pub async fn query_balances<S: AsRef<str>>(
		&self,
		session: &Session,
		ids: &[S],
	) -> Result<Vec<RoomBalance>, QueryError> {
		query_balances(session, &self.settings.balance_api, ids).await
	}

	/// Log in and query once; the session is dropped afterwards.
	pub async fn fetch_balances<S: AsRef<str>>(
		&self,
		username: &str,
		password: &str,
		ids: &[S],
	) -> PortalResult<Vec<RoomBalance>> {
		let session = self.login(username, password).await?;
		Ok(self.query_balances(&session, ids).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::auth::core::testing::{ScriptedClient, ScriptedConnector, ok, redirect, response};
	use crate::external_deps::interpreters::BoaSandbox;

	const LOGIN: &str = "https://idas.uestc.edu.cn/authserver/login";
	const SCRIPT: &str =
		"https://idas.uestc.edu.cn/authserver/uestcTheme/static/common/encrypt.js?v=2";
	const TARGET: &str = "https://eportal.uestc.edu.cn/app/index.do";
	const API: &str = "https://eportal.uestc.edu.cn/app/queryRoomInfo.do";

	fn scripted_portal(cookie: &str, rooms_body: &str) -> Arc<ScriptedClient> {
		let page = r#"<html><head>
			<script src="/authserver/uestcTheme/static/common/encrypt.js?v=2"></script>
		</head><body>
			<input type="hidden" id="pwdEncryptSalt" value="salt" />
			<input type="hidden" name="execution" value="e1s1" />
		</body></html>"#;
		Arc::new(
			ScriptedClient::new()
				.on_get(TARGET, redirect(TARGET, LOGIN))
				.on_get(LOGIN, ok(LOGIN, page))
				.on_get(LOGIN, ok(LOGIN, page))
				.on_get(SCRIPT, ok(SCRIPT, "function encryptPassword(p, s) { return s + p; }"))
				.on_post(
					LOGIN,
					response(
						302,
						LOGIN,
						&[("location", TARGET), ("set-cookie", cookie)],
						"",
					),
				)
				.on_get(TARGET, ok(TARGET, "home"))
				.on_post(API, ok(API, rooms_body)),
		)
	}

	fn client(clients: Vec<Arc<ScriptedClient>>) -> PortalClient {
		PortalClient::builder()
			.with_target_url(TARGET)
			.with_balance_api_url(API)
			.with_connector(Arc::new(ScriptedConnector::new(clients)))
			.with_sandbox(Arc::new(BoaSandbox::new()))
			.without_logging()
			.build()
			.unwrap()
	}

	#[tokio::test]
	async fn each_login_gets_an_independent_session() {
		let first = scripted_portal("MOD_AUTH_CAS=one", "[]");
		let second = scripted_portal("MOD_AUTH_CAS=two", "[]");
		let client = client(vec![first, second]);

		let a = client.login("user", "pw").await.unwrap();
		let b = client.login("user", "pw").await.unwrap();

		let url = url::Url::parse(TARGET).unwrap();
		assert_eq!(a.cookies_for(&url).as_deref(), Some("MOD_AUTH_CAS=one"));
		assert_eq!(b.cookies_for(&url).as_deref(), Some("MOD_AUTH_CAS=two"));
		assert_ne!(a.cookies_for(&url), b.cookies_for(&url));
	}

	#[tokio::test]
	async fn fetch_balances_logs_in_then_queries() {
		let portal = scripted_portal(
			"MOD_AUTH_CAS=one",
			r#"[{"roomInfo": {"retcode": 0, "roomName": "121604", "syje": "45.20"}}]"#,
		);
		let client = client(vec![portal.clone()]);

		let balances = client
			.fetch_balances("user", "pw", &["121604"])
			.await
			.unwrap();

		assert_eq!(balances.len(), 1);
		assert_eq!(balances[0].balance(), Some(45.2));
		let last = portal.requests().pop().unwrap();
		assert_eq!(last.url, API);
	}

	#[tokio::test]
	async fn connector_failure_is_a_login_error() {
		let client = client(Vec::new());
		let err = client.login("user", "pw").await.unwrap_err();
		assert!(matches!(err, LoginError::Connect(_)));
	}

	#[test]
	fn invalid_config_fails_at_build() {
		let result = PortalClient::builder()
			.with_sso_base_url("not a url")
			.build();
		assert!(matches!(result, Err(PortalError::Config(_))));
	}

	#[test]
	fn fractional_timeouts_are_kept() {
		let client = PortalClient::builder()
			.with_request_timeout(Duration::from_millis(2_500))
			.with_connect_timeout(Duration::from_millis(750))
			.build()
			.unwrap();
		assert_eq!(client.settings().request_timeout, Duration::from_millis(2_500));
		assert_eq!(client.settings().connect_timeout, Duration::from_millis(750));
	}

	#[test]
	fn default_client_uses_portal_endpoints() {
		let client = PortalClient::new().unwrap();
		assert_eq!(
			client.settings().login_url.as_str(),
			"https://idas.uestc.edu.cn/authserver/login"
		);
	}
}
