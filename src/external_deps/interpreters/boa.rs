use boa_engine::{Context, JsValue, Source};

use super::{CompiledScript, SandboxError, SandboxResult, ScriptSandbox, validate_function_name};

/// Which global environment the context is seeded with before the script runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoaFlavor {
    /// Bare ECMAScript globals only.
    Plain,
    /// Inert browser shims (`window`, `navigator`, `document`) for scripts
    /// that probe for a DOM while loading.
    Browser,
}

/// Sandbox backed by the Boa JavaScript engine.
///
/// Boa registers no host bindings by default, so scripts run here have no
/// console, network, timer or filesystem access.
#[derive(Debug, Clone)]
pub struct BoaSandbox {
    flavor: BoaFlavor,
    host: String,
}

impl BoaSandbox {
    pub fn new() -> Self {
        Self {
            flavor: BoaFlavor::Plain,
            host: String::new(),
        }
    }

    /// Browser-flavoured context reporting `host` as its location.
    pub fn browser(host: impl Into<String>) -> Self {
        Self {
            flavor: BoaFlavor::Browser,
            host: host.into(),
        }
    }

    fn build_prelude(&self) -> String {
        let host = serde_json::to_string(&self.host).unwrap_or_else(|_| "\"\"".into());
        format!(
            r#"
var __host = {host};
var location = {{
    href: "https://" + __host + "/",
    hostname: __host,
    host: __host,
    protocol: "https:",
    port: ""
}};
var navigator = {{
    userAgent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
    appName: "Netscape",
    language: "zh-CN",
    languages: ["zh-CN", "zh", "en"],
    platform: "Win32"
}};
var document = {{
    location: location,
    cookie: "",
    createElement: function() {{ return {{ style: {{}}, setAttribute: function() {{}} }}; }},
    getElementById: function() {{ return null; }},
    getElementsByTagName: function() {{ return []; }}
}};
var window = {{ location: location, navigator: navigator, document: document }};
window.window = window;
var self = window;
"#
        )
    }
}

impl Default for BoaSandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptSandbox for BoaSandbox {
    fn name(&self) -> &str {
        match self.flavor {
            BoaFlavor::Plain => "boa",
            BoaFlavor::Browser => "boa-browser",
        }
    }

    fn compile(&self, source: &str) -> SandboxResult<Box<dyn CompiledScript>> {
        let mut context = Context::default();

        if self.flavor == BoaFlavor::Browser {
            context
                .eval(Source::from_bytes(&self.build_prelude()))
                .map_err(|err| SandboxError::Other(err.to_string()))?;
        }

        context
            .eval(Source::from_bytes(source))
            .map_err(|err| SandboxError::Compile(err.to_string()))?;

        Ok(Box::new(BoaScript { context }))
    }
}

struct BoaScript {
    context: Context,
}

impl BoaScript {
    fn eval_to_string(&mut self, code: &str) -> SandboxResult<Option<String>> {
        let value = self
            .context
            .eval(Source::from_bytes(code))
            .map_err(|err| SandboxError::Execution(err.to_string()))?;

        self.stringify(value)
    }

    fn stringify(&mut self, value: JsValue) -> SandboxResult<Option<String>> {
        if value.is_null() || value.is_undefined() {
            return Ok(None);
        }

        let text = value
            .to_string(&mut self.context)
            .map_err(|err| SandboxError::Execution(err.to_string()))?
            .to_std_string()
            .map_err(|_| SandboxError::Other("unable to convert interpreter output".into()))?;

        Ok(Some(text))
    }
}

impl CompiledScript for BoaScript {
    fn has_function(&mut self, name: &str) -> SandboxResult<bool> {
        validate_function_name(name)?;
        let kind = self.eval_to_string(&format!("typeof {name}"))?;
        Ok(kind.as_deref() == Some("function"))
    }

    fn call(&mut self, name: &str, args: &[&str]) -> SandboxResult<String> {
        validate_function_name(name)?;

        let mut literals = Vec::with_capacity(args.len());
        for arg in args {
            literals.push(
                serde_json::to_string(arg).map_err(|err| SandboxError::Other(err.to_string()))?,
            );
        }

        let expression = format!("{name}({})", literals.join(", "));
        self.eval_to_string(&expression)?
            .ok_or_else(|| SandboxError::Execution(format!("{name} returned no value")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calls_named_function_with_string_arguments() {
        let sandbox = BoaSandbox::new();
        let mut script = sandbox
            .compile("function join(a, b) { return a + '|' + b; }")
            .unwrap();
        assert!(script.has_function("join").unwrap());
        assert_eq!(script.call("join", &["x\"y", "z"]).unwrap(), "x\"y|z");
    }

    #[test]
    fn reports_missing_function() {
        let sandbox = BoaSandbox::new();
        let mut script = sandbox.compile("var answer = 42;").unwrap();
        assert!(!script.has_function("encryptPassword").unwrap());
        assert!(!script.has_function("answer").unwrap());
    }

    #[test]
    fn compile_error_is_reported() {
        let sandbox = BoaSandbox::new();
        let err = sandbox.compile("function broken( {").err().unwrap();
        assert!(matches!(err, SandboxError::Compile(_)));
    }

    #[test]
    fn plain_context_has_no_window() {
        let sandbox = BoaSandbox::new();
        let err = sandbox.compile("window.location.hostname;").err().unwrap();
        assert!(matches!(err, SandboxError::Compile(_)));
    }

    #[test]
    fn browser_context_exposes_host() {
        let sandbox = BoaSandbox::browser("idas.example.edu");
        assert_eq!(sandbox.name(), "boa-browser");
        let mut script = sandbox
            .compile("function currentHost() { return window.location.hostname; }")
            .unwrap();
        assert_eq!(script.call("currentHost", &[]).unwrap(), "idas.example.edu");
    }

    #[test]
    fn undefined_result_is_an_execution_error() {
        let sandbox = BoaSandbox::new();
        let mut script = sandbox.compile("function nothing() {}").unwrap();
        let err = script.call("nothing", &[]).unwrap_err();
        assert!(matches!(err, SandboxError::Execution(_)));
    }
}
