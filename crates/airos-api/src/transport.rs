// Transport layer for talking to an airOS device.
//
// Builds the reqwest client (TLS relaxation, timeout, fixed browser headers)
// and performs single request/response exchanges. Cookies are NOT handled
// here: the session attaches them explicitly so it can drop a whole jar on
// invalidation. No retries live in this module.

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 \
     (KHTML, like Gecko) Version/18.5 Safari/605.1.15";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// TLS verification mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Accept any certificate and skip hostname checks.
    ///
    /// airOS devices ship with a self-signed certificate issued to no
    /// particular name, so this is the default for local devices.
    #[default]
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::DangerAcceptInvalid,
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` for the device at `base_url`.
    ///
    /// The browser headers are installed as client defaults so every
    /// request carries them; the firmware rejects traffic without them.
    pub fn build_client(&self, base_url: &Url) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            // An expired session is answered with a redirect to the login
            // page; the session layer has to see it.
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(USER_AGENT)
            .default_headers(browser_headers(base_url)?);

        match self.tls {
            TlsMode::System => {}
            TlsMode::DangerAcceptInvalid => {
                // With rustls this installs a verifier that accepts any chain,
                // which also covers hostname mismatches.
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

/// Headers the stock web UI sends with every XHR.
fn browser_headers(base_url: &Url) -> Result<HeaderMap, Error> {
    let origin = base_url.origin().ascii_serialization();
    let referer = format!("{origin}/");

    let value = |v: &str| {
        HeaderValue::from_str(v).map_err(|e| Error::Tls(format!("invalid header value {v:?}: {e}")))
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(header::ORIGIN, value(&origin)?);
    headers.insert(header::REFERER, value(&referer)?);
    headers.insert(
        HeaderName::from_static("x-requested-with"),
        HeaderValue::from_static("XMLHttpRequest"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("cors"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("empty"),
    );
    Ok(headers)
}

// ── Request / response ───────────────────────────────────────────────

/// Body of an outgoing request.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Form fields, encoded as `application/x-www-form-urlencoded; charset=UTF-8`.
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
}

impl RequestBody {
    /// Convenience constructor for form bodies.
    pub fn form<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A cookie returned in a `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCookie {
    pub name: String,
    pub value: String,
    /// `None` when the server omitted the `Domain` attribute.
    pub domain: Option<String>,
}

/// One completed request/response exchange with the body fully read.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub cookies: Vec<ResponseCookie>,
    pub body: String,
}

impl Exchange {
    /// A response header as a string, if present and valid UTF-8.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Raw `Set-Cookie` header values.
    pub fn set_cookie_headers(&self) -> impl Iterator<Item = &HeaderValue> {
        self.headers.get_all(header::SET_COOKIE).iter()
    }
}

/// HTTP transport bound to one device.
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl Transport {
    pub fn new(base_url: Url, config: &TransportConfig) -> Result<Self, Error> {
        let http = config.build_client(&base_url)?;
        Ok(Self {
            http,
            base_url,
            timeout: config.timeout,
        })
    }

    /// The device root URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Perform one exchange.
    ///
    /// `headers` are added on top of the browser defaults. Socket, TLS and
    /// timeout failures surface as connection-class errors; any HTTP status
    /// is returned to the caller for classification.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body: RequestBody,
    ) -> Result<Exchange, Error> {
        let url = self.base_url.join(path)?;
        debug!(%method, %url, "sending request");

        let mut builder = self.http.request(method, url).headers(headers);
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields.iter())
                    .finish();
                builder
                    .header(header::CONTENT_TYPE, FORM_CONTENT_TYPE)
                    .body(encoded)
            }
            RequestBody::Json(value) => builder.json(&value),
        };

        let resp = builder.send().await.map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let cookies = resp
            .cookies()
            .map(|c| ResponseCookie {
                name: c.name().to_owned(),
                value: c.value().to_owned(),
                domain: c.domain().map(str::to_owned),
            })
            .collect();
        let body = resp.text().await.map_err(|e| self.map_send_error(e))?;

        trace!(%status, bytes = body.len(), "response received");

        Ok(Exchange {
            status,
            headers,
            cookies,
            body,
        })
    }

    fn map_send_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            Error::Transport(err)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn browser_headers_follow_device_origin() {
        let url = Url::parse("https://192.168.1.20").unwrap();
        let headers = browser_headers(&url).unwrap();
        assert_eq!(headers[header::ORIGIN], "https://192.168.1.20");
        assert_eq!(headers[header::REFERER], "https://192.168.1.20/");
        assert_eq!(headers["x-requested-with"], "XMLHttpRequest");
    }

    #[test]
    fn default_config_accepts_self_signed() {
        let config = TransportConfig::default();
        assert_eq!(config.tls, TlsMode::DangerAcceptInvalid);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn form_body_keeps_field_order() {
        let body = RequestBody::form([("staif", "ath0"), ("staid", "AA:BB")]);
        match body {
            RequestBody::Form(fields) => {
                assert_eq!(fields[0], ("staif".to_owned(), "ath0".to_owned()));
                assert_eq!(fields[1].0, "staid");
            }
            other => panic!("expected form body, got {other:?}"),
        }
    }
}
