//! Request authentication decorations: basic, bearer, custom headers,
//! and cookies. CLI flags win; `DEADLINKR_AUTH_*` environment variables
//! fill in when the matching flag is empty.

use reqwest::RequestBuilder;

use crate::config::ConfigError;

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    basic: Option<(String, String)>,
    bearer: Option<String>,
    headers: Vec<(String, String)>,
    cookies: Option<String>,
}

impl AuthConfig {
    /// Build from CLI flags, falling back to the environment.
    pub fn from_flags(
        basic: &str,
        bearer: &str,
        headers: &[String],
        cookies: &str,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if !basic.is_empty() {
            config.basic = Some(parse_basic(basic)?);
        } else if let (Ok(user), Ok(pass)) = (
            std::env::var("DEADLINKR_AUTH_USER"),
            std::env::var("DEADLINKR_AUTH_PASS"),
        ) {
            if !user.is_empty() && !pass.is_empty() {
                config.basic = Some((user, pass));
            }
        }

        if !bearer.is_empty() {
            config.bearer = Some(bearer.to_string());
        } else if let Ok(token) = std::env::var("DEADLINKR_AUTH_TOKEN") {
            if !token.is_empty() {
                config.bearer = Some(token);
            }
        }

        if !headers.is_empty() {
            for header in headers {
                config.headers.push(parse_header(header)?);
            }
        } else if let Ok(list) = std::env::var("DEADLINKR_AUTH_HEADERS") {
            config.headers = parse_header_list(&list);
        }

        if !cookies.is_empty() {
            config.cookies = Some(cookies.to_string());
        }

        if config.is_configured() {
            tracing::info!(summary = %config.summary(), "authentication configured");
        }

        Ok(config)
    }

    /// Decorate an outbound request. Called by the HTTP client before
    /// every dispatch.
    pub fn apply(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some((user, pass)) = &self.basic {
            request = request.basic_auth(user, Some(pass));
        }
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(cookies) = &self.cookies {
            request = request.header(reqwest::header::COOKIE, cookies.as_str());
        }
        request
    }

    pub fn is_configured(&self) -> bool {
        self.basic.is_some()
            || self.bearer.is_some()
            || !self.headers.is_empty()
            || self.cookies.is_some()
    }

    fn summary(&self) -> String {
        let mut methods = Vec::new();
        if let Some((user, _)) = &self.basic {
            methods.push(format!("basic auth (user: {})", user));
        }
        if self.bearer.is_some() {
            methods.push("bearer token".to_string());
        }
        if !self.headers.is_empty() {
            methods.push(format!("{} custom header(s)", self.headers.len()));
        }
        if self.cookies.is_some() {
            methods.push("cookies".to_string());
        }
        methods.join(", ")
    }
}

/// Parse `user:password`.
fn parse_basic(spec: &str) -> Result<(String, String), ConfigError> {
    match spec.split_once(':') {
        Some((user, pass)) if !user.is_empty() => Ok((user.to_string(), pass.to_string())),
        _ => Err(ConfigError::InvalidAuth(format!(
            "expected 'user:password', got '{}'",
            spec
        ))),
    }
}

/// Parse `Key: Value`.
fn parse_header(spec: &str) -> Result<(String, String), ConfigError> {
    match spec.split_once(':') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(ConfigError::InvalidAuth(format!(
            "expected 'Key: Value', got '{}'",
            spec
        ))),
    }
}

/// Parse the env format `Key1:Value1,Key2:Value2`, skipping malformed pairs.
fn parse_header_list(list: &str) -> Vec<(String, String)> {
    list.split(',')
        .filter_map(|pair| parse_header(pair.trim()).ok())
        .collect()
}
