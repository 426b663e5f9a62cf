//! Login page parsing helpers.
//!
//! Provides the building blocks needed to inspect the SSO login HTML and
//! extract the values the login flow submits back.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

static SCRIPT_SRC: Lazy<Selector> = Lazy::new(|| Selector::parse("script[src]").unwrap());
static INPUTS: Lazy<Selector> = Lazy::new(|| Selector::parse("input").unwrap());
static EXECUTION_INPUT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"input[name="execution"]"#).unwrap());
static SALT_INPUT: Lazy<Selector> = Lazy::new(|| Selector::parse("input#pwdEncryptSalt").unwrap());

/// Values scraped from the login form.
///
/// Owned so the parsed document can be dropped before the next request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub execution: Option<String>,
    pub salt: Option<String>,
    /// Every hidden input with a name, in document order.
    pub hidden_fields: Vec<(String, String)>,
}

/// First `<script src>` whose source matches `pattern`.
pub fn find_encrypt_script(html: &str, pattern: &Regex) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&SCRIPT_SRC)
        .filter_map(|element| element.value().attr("src"))
        .find(|src| pattern.is_match(src))
        .map(str::to_string)
}

pub fn parse_login_form(html: &str) -> LoginForm {
    let document = Html::parse_document(html);

    let execution = document
        .select(&EXECUTION_INPUT)
        .next()
        .map(|element| element.value().attr("value").unwrap_or("").to_string());

    let salt = document
        .select(&SALT_INPUT)
        .next()
        .and_then(|element| element.value().attr("value"))
        .map(str::to_string);

    let hidden_fields = document
        .select(&INPUTS)
        .filter(|element| {
            element
                .value()
                .attr("type")
                .is_some_and(|kind| kind.eq_ignore_ascii_case("hidden"))
        })
        .filter_map(|element| {
            let name = element.value().attr("name").filter(|name| !name.is_empty())?;
            let value = element.value().attr("value").unwrap_or("");
            Some((name.to_string(), value.to_string()))
        })
        .collect();

    LoginForm {
        execution,
        salt,
        hidden_fields,
    }
}

/// Build origin value from URL (`scheme://host[:port]`).
pub fn origin_from_url(url: &Url) -> String {
    let mut origin = format!("{}://{}", url.scheme(), url.host_str().unwrap_or(""));
    if let Some(port) = url.port() {
        origin.push(':');
        origin.push_str(&port.to_string());
    }
    origin
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PAGE: &str = r#"
        <html><head>
            <script src="/authserver/uestcTheme/static/common/jquery.min.js"></script>
            <script src="/authserver/uestcTheme/static/common/encrypt.js?v=20231011"></script>
        </head><body>
            <form id="pwdFromId" method="post">
                <input id="username" name="username" type="text" />
                <input type="hidden" id="pwdEncryptSalt" value="Hb1xQ7eH" />
                <input type="hidden" name="execution" value="abc&amp;123" />
                <input type="HIDDEN" name="rememberMe" value="true" />
                <input type="hidden" name="lt" />
                <input type="hidden" value="nameless" />
            </form>
        </body></html>
    "#;

    #[test]
    fn finds_matching_script() {
        let pattern = Regex::new(r"/authserver/uestcTheme/static/common/encrypt\.js\?v=.*").unwrap();
        assert_eq!(
            find_encrypt_script(LOGIN_PAGE, &pattern).as_deref(),
            Some("/authserver/uestcTheme/static/common/encrypt.js?v=20231011")
        );
    }

    #[test]
    fn script_without_version_does_not_match() {
        let pattern = Regex::new(r"/common/encrypt\.js\?v=.*").unwrap();
        let html = r#"<script src="/common/encrypt.js"></script>"#;
        assert_eq!(find_encrypt_script(html, &pattern), None);
    }

    #[test]
    fn extracts_form_fields() {
        let form = parse_login_form(LOGIN_PAGE);
        assert_eq!(form.execution.as_deref(), Some("abc&123"));
        assert_eq!(form.salt.as_deref(), Some("Hb1xQ7eH"));
        assert_eq!(
            form.hidden_fields,
            vec![
                ("execution".to_string(), "abc&123".to_string()),
                ("rememberMe".to_string(), "true".to_string()),
                ("lt".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn missing_inputs_are_none() {
        let form = parse_login_form("<html><body><form></form></body></html>");
        assert_eq!(form, LoginForm::default());
    }

    #[test]
    fn origin_keeps_explicit_port() {
        let url = Url::parse("http://127.0.0.1:8080/a/b?c=d").unwrap();
        assert_eq!(origin_from_url(&url), "http://127.0.0.1:8080");
        let url = Url::parse("https://idas.uestc.edu.cn:443/x").unwrap();
        assert_eq!(origin_from_url(&url), "https://idas.uestc.edu.cn");
    }
}
