use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

/// Login endpoint. Accepts form-encoded or JSON `username`/`password`.
pub const LOGIN_PATH: &str = "/api/auth";

/// Header carrying the CSRF token on login responses and authenticated requests.
pub const CSRF_HEADER: &str = "X-CSRF-ID";

/// Cookie the firmware expects before it accepts any POST.
pub const BASELINE_COOKIE: &str = "ok";

/// Name prefix of the firmware's session cookies (e.g. `AIROS_3C1A...`).
pub const SESSION_COOKIE_PREFIX: &str = "AIROS_";

/// How the login POST body is encoded.
///
/// The firmware's parser is picky about content type; form encoding is
/// what the stock web UI sends and works on every observed build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginEncoding {
    /// `application/x-www-form-urlencoded; charset=UTF-8`
    #[default]
    Form,
    /// `application/json`
    Json,
}

impl fmt::Display for LoginEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Form => f.write_str("form"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Credentials for one airOS device.
///
/// Immutable after construction. The password is only exposed at the
/// moment the login body is built.
#[derive(Debug, Clone)]
pub struct Credentials {
    host: String,
    username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password,
        }
    }

    /// Device host as configured (IP, hostname, or full URL).
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    /// The device root URL.
    ///
    /// A bare host (`192.168.1.20`) becomes `https://192.168.1.20/`; a value
    /// that already carries a scheme is used as-is.
    pub fn base_url(&self) -> Result<Url, Error> {
        let host = self.host.trim().trim_end_matches('/');
        if host.contains("://") {
            Ok(Url::parse(host)?)
        } else {
            Ok(Url::parse(&format!("https://{host}"))?)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn creds(host: &str) -> Credentials {
        Credentials::new(host, "ubnt", SecretString::from("hunter2".to_string()))
    }

    #[test]
    fn bare_host_defaults_to_https() {
        let url = creds("192.168.1.20").base_url().unwrap();
        assert_eq!(url.as_str(), "https://192.168.1.20/");
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let url = creds("http://127.0.0.1:8080/").base_url().unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/");
    }

    #[test]
    fn debug_output_hides_password() {
        let rendered = format!("{:?}", creds("10.0.0.1"));
        assert!(!rendered.contains("hunter2"), "password leaked: {rendered}");
    }

    #[test]
    fn login_encoding_parses_lowercase() {
        let enc: LoginEncoding = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(enc, LoginEncoding::Json);
        assert_eq!(LoginEncoding::default().to_string(), "form");
    }
}
