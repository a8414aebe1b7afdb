// Session state machine
//
// Cookie + CSRF login handshake, the authenticated request wrapper, and
// reauthentication. All state lives behind one async mutex: login and every
// authenticated call for a device are mutually exclusive, so a half-updated
// cookie/token pair is never observable.

use chrono::{DateTime, Utc};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde_json::json;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::auth::{
    BASELINE_COOKIE, CSRF_HEADER, Credentials, LOGIN_PATH, LoginEncoding, SESSION_COOKIE_PREFIX,
};
use crate::error::Error;
use crate::transport::{Exchange, RequestBody, ResponseCookie, Transport, TransportConfig};

/// Observable authentication phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    LoggingIn,
    Authenticated,
}

/// Mutable session data. Only touched with the session lock held.
struct SessionState {
    cookies: Jar,
    csrf_token: Option<String>,
    authenticated: bool,
    last_login_attempt_at: Option<DateTime<Utc>>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            cookies: Jar::default(),
            csrf_token: None,
            authenticated: false,
            last_login_attempt_at: None,
        }
    }

    /// Drop cookies and token. The attempt timestamp survives.
    fn reset(&mut self) {
        self.cookies = Jar::default();
        self.csrf_token = None;
        self.authenticated = false;
    }
}

/// Keeps the observable phase honest if a login future is dropped mid-flight.
///
/// The session state itself is reset before the exchange starts and only
/// committed at the end, so a cancelled login always lands on
/// `Unauthenticated`.
struct LoginAttempt<'a> {
    phase: &'a watch::Sender<SessionPhase>,
    committed: bool,
}

impl<'a> LoginAttempt<'a> {
    fn begin(phase: &'a watch::Sender<SessionPhase>) -> Self {
        phase.send_replace(SessionPhase::LoggingIn);
        Self {
            phase,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
        self.phase.send_replace(SessionPhase::Authenticated);
    }
}

impl Drop for LoginAttempt<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.phase.send_replace(SessionPhase::Unauthenticated);
        }
    }
}

/// Authenticated session with one airOS device.
pub struct Session {
    transport: Transport,
    credentials: Credentials,
    encoding: LoginEncoding,
    state: Mutex<SessionState>,
    phase: watch::Sender<SessionPhase>,
}

impl Session {
    pub fn new(
        credentials: Credentials,
        encoding: LoginEncoding,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let base_url = credentials.base_url()?;
        let transport = Transport::new(base_url, transport)?;
        let (phase, _) = watch::channel(SessionPhase::Unauthenticated);
        Ok(Self {
            transport,
            credentials,
            encoding,
            state: Mutex::new(SessionState::new()),
            phase,
        })
    }

    /// The device root URL.
    pub fn base_url(&self) -> &Url {
        self.transport.base_url()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    // ── State queries ────────────────────────────────────────────────

    /// Current phase. Does not wait for the session lock.
    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions.
    pub fn subscribe_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase() == SessionPhase::Authenticated
    }

    /// When the last login attempt started, successful or not.
    pub async fn last_login_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_login_attempt_at
    }

    // ── Login / logout ───────────────────────────────────────────────

    /// Perform the login handshake.
    ///
    /// Any existing session is discarded first. On failure the session is
    /// left `Unauthenticated`.
    pub async fn login(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        self.login_locked(&mut state).await
    }

    /// Forget the current session (cookies and token).
    ///
    /// The firmware has no logout endpoint the web UI relies on; dropping
    /// the cookies is sufficient for the device to expire the session.
    pub async fn logout(&self) {
        let mut state = self.state.lock().await;
        self.invalidate_locked(&mut state, "logout");
        info!("logged out");
    }

    /// Force `Unauthenticated` so the next call logs in again.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        self.invalidate_locked(&mut state, "invalidated by caller");
    }

    #[allow(clippy::cognitive_complexity)]
    async fn login_locked(&self, state: &mut SessionState) -> Result<(), Error> {
        let attempt = LoginAttempt::begin(&self.phase);
        state.reset();
        state.last_login_attempt_at = Some(Utc::now());

        let url = self.transport.base_url().clone();
        debug!(%url, username = self.credentials.username(), encoding = %self.encoding, "logging in");

        // Step 0: the firmware refuses POSTs without the baseline cookie.
        let jar = Jar::default();
        jar.add_cookie_str(&format!("{BASELINE_COOKIE}=1; Path=/"), &url);

        let mut headers = HeaderMap::new();
        attach_cookies(&jar, &url, &mut headers);

        let username = self.credentials.username();
        let password = self.credentials.password().expose_secret();
        let body = match self.encoding {
            LoginEncoding::Form => RequestBody::form([("username", username), ("password", password)]),
            LoginEncoding::Json => RequestBody::Json(json!({
                "username": username,
                "password": password,
            })),
        };

        let exchange = self
            .transport
            .send(Method::POST, LOGIN_PATH, headers, body)
            .await?;

        // Checks run in this order on purpose: the firmware signals success
        // through cookies and the CSRF header, not through the status code.
        if exchange.cookies.is_empty() {
            warn!(status = %exchange.status, "login response carried no cookies");
            return Err(Error::auth("no session issued"));
        }

        jar.set_cookies(&mut exchange.set_cookie_headers(), &url);
        let registered = register_session_cookies(&jar, &url, &exchange.cookies);
        if registered > 0 {
            debug!(registered, "registered domain-less session cookies");
        }

        let Some(token) = exchange.header_str(CSRF_HEADER).map(str::to_owned) else {
            warn!(status = %exchange.status, "login response carried no CSRF token");
            return Err(Error::auth("login response carried no CSRF token"));
        };

        let tracked = tracked_cookie_names(&jar, &url);
        let has_session_cookie = tracked.iter().any(|n| n.starts_with(SESSION_COOKIE_PREFIX));
        let has_baseline_cookie = tracked.iter().any(|n| n == BASELINE_COOKIE);
        if !has_session_cookie && !has_baseline_cookie {
            warn!("cookie jar empty after login");
            return Err(Error::auth("session not established"));
        }

        if !exchange.status.is_success() {
            return Err(Error::auth(format!(
                "login rejected (HTTP {})",
                exchange.status.as_u16()
            )));
        }

        // Body is diagnostic only.
        if let Err(e) = serde_json::from_str::<serde_json::Value>(&exchange.body) {
            warn!(error = %e, "login response body is not JSON");
        }

        state.cookies = jar;
        state.csrf_token = Some(token);
        state.authenticated = true;
        attempt.commit();

        info!(session_cookie = has_session_cookie, "login successful");
        Ok(())
    }

    fn invalidate_locked(&self, state: &mut SessionState, reason: &str) {
        if state.authenticated {
            debug!(reason, "invalidating session");
        }
        state.reset();
        self.phase.send_replace(SessionPhase::Unauthenticated);
    }

    // ── Authenticated requests ───────────────────────────────────────

    /// Send an authenticated request and parse the JSON response.
    ///
    /// Never retries. A 401/403, a redirect, or an HTML login page
    /// invalidates the session before the error is returned; an
    /// unparseable 200 JSON body is a protocol error.
    pub async fn authenticated_request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<serde_json::Value, Error> {
        let mut state = self.state.lock().await;
        let exchange = self.exchange_locked(&mut state, method, path, body).await?;
        parse_json(&exchange)
    }

    /// Log in if needed, then send one authenticated request.
    ///
    /// An authentication failure invalidates the session and is returned
    /// as-is; the next call logs in again.
    pub async fn request_logged_in(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<Exchange, Error> {
        let mut state = self.state.lock().await;
        if !state.authenticated {
            self.login_locked(&mut state).await?;
        }
        self.exchange_locked(&mut state, method, path, body).await
    }

    /// Log in if needed, send the request, and on expiry log in once more
    /// and retry exactly once. The lock is held for the whole sequence.
    pub async fn request_with_reauth(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<Exchange, Error> {
        let mut state = self.state.lock().await;
        if !state.authenticated {
            self.login_locked(&mut state).await?;
        }

        match self
            .exchange_locked(&mut state, method.clone(), path, body.clone())
            .await
        {
            Err(e) if e.is_auth_expired() => {
                info!(path, "session expired, logging in again");
                self.login_locked(&mut state).await?;
                self.exchange_locked(&mut state, method, path, body).await
            }
            other => other,
        }
    }

    async fn exchange_locked(
        &self,
        state: &mut SessionState,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<Exchange, Error> {
        if !state.authenticated {
            return Err(Error::auth("not logged in"));
        }

        let url = self.transport.base_url().clone();
        let mut headers = HeaderMap::new();
        if let Some(token) = state.csrf_token.as_deref() {
            let value = HeaderValue::from_str(token)
                .map_err(|_| Error::auth("stored CSRF token is not a valid header value"))?;
            headers.insert(CSRF_HEADER, value);
        }
        attach_cookies(&state.cookies, &url, &mut headers);

        let exchange = self.transport.send(method, path, headers, body).await?;
        state.cookies.set_cookies(&mut exchange.set_cookie_headers(), &url);

        match exchange.status {
            s if s.is_success() && serves_login_page(&exchange) => {
                self.invalidate_locked(state, "device served the login page");
                Err(Error::auth(format!("{path} answered with the login page")))
            }
            s if s.is_success() => Ok(exchange),
            s if s.is_redirection() => {
                self.invalidate_locked(state, "device redirected to login");
                Err(Error::auth(format!(
                    "session expired, {path} redirected (HTTP {}) to {}",
                    s.as_u16(),
                    exchange.header_str("location").unwrap_or("?")
                )))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                self.invalidate_locked(state, "device rejected session");
                Err(Error::auth(format!(
                    "session rejected by device (HTTP {})",
                    exchange.status.as_u16()
                )))
            }
            s => Err(Error::protocol(
                format!("unexpected response to {path}"),
                Some(s.as_u16()),
                &exchange.body,
            )),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Parse an exchange body as JSON, or fail with a protocol error.
pub(crate) fn parse_json(exchange: &Exchange) -> Result<serde_json::Value, Error> {
    serde_json::from_str(&exchange.body).map_err(|e| {
        let preview: String = exchange.body.chars().take(200).collect();
        Error::protocol(
            format!("invalid JSON in response: {e} (body preview: {preview:?})"),
            Some(exchange.status.as_u16()),
            &exchange.body,
        )
    })
}

/// The firmware's JSON endpoints fall back to the HTML login page once the
/// session is gone.
fn serves_login_page(exchange: &Exchange) -> bool {
    exchange
        .header_str("content-type")
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/html"))
}

fn attach_cookies(jar: &Jar, url: &Url, headers: &mut HeaderMap) {
    if let Some(cookies) = jar.cookies(url) {
        trace!("attaching session cookies");
        headers.insert(COOKIE, cookies);
    }
}

/// Names of the cookies the jar would send to `url`.
fn tracked_cookie_names(jar: &Jar, url: &Url) -> Vec<String> {
    jar.cookies(url)
        .and_then(|v| v.to_str().ok().map(str::to_owned))
        .map(|header| {
            header
                .split(';')
                .filter_map(|pair| pair.trim().split_once('=').map(|(name, _)| name.to_owned()))
                .collect()
        })
        .unwrap_or_default()
}

/// Register namespaced session cookies the jar did not associate with the device.
///
/// Some firmware builds send the `AIROS_*` cookie without a usable `Domain`,
/// so the jar never matches it against an IP-address host. Re-adding it
/// against the device URL makes it a host-only cookie for that address.
fn register_session_cookies(jar: &Jar, url: &Url, returned: &[ResponseCookie]) -> usize {
    let tracked = tracked_cookie_names(jar, url);
    let mut registered = 0;
    for cookie in returned
        .iter()
        .filter(|c| c.name.starts_with(SESSION_COOKIE_PREFIX))
    {
        if tracked.contains(&cookie.name) {
            continue;
        }
        jar.add_cookie_str(&format!("{}={}; Path=/", cookie.name, cookie.value), url);
        debug!(cookie = %cookie.name, domain = ?cookie.domain, "session cookie registered manually");
        registered += 1;
    }
    registered
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://192.168.1.20/").unwrap()
    }

    #[test]
    fn tracked_names_lists_jar_cookies() {
        let jar = Jar::default();
        jar.add_cookie_str("ok=1; Path=/", &url());
        jar.add_cookie_str("AIROS_ABC=secret; Path=/", &url());
        let mut names = tracked_cookie_names(&jar, &url());
        names.sort();
        assert_eq!(names, vec!["AIROS_ABC".to_owned(), "ok".to_owned()]);
    }

    #[test]
    fn session_cookie_registered_when_missing() {
        let jar = Jar::default();
        let returned = vec![
            ResponseCookie {
                name: "AIROS_ABC".into(),
                value: "token".into(),
                domain: None,
            },
            ResponseCookie {
                name: "other".into(),
                value: "x".into(),
                domain: None,
            },
        ];
        assert_eq!(register_session_cookies(&jar, &url(), &returned), 1);
        assert_eq!(tracked_cookie_names(&jar, &url()), vec!["AIROS_ABC".to_owned()]);

        // Already tracked: nothing to do.
        assert_eq!(register_session_cookies(&jar, &url(), &returned), 0);
    }

    #[test]
    fn login_attempt_drop_resets_phase() {
        let (phase, _) = watch::channel(SessionPhase::Unauthenticated);
        {
            let _attempt = LoginAttempt::begin(&phase);
            assert_eq!(*phase.borrow(), SessionPhase::LoggingIn);
        }
        assert_eq!(*phase.borrow(), SessionPhase::Unauthenticated);

        LoginAttempt::begin(&phase).commit();
        assert_eq!(*phase.borrow(), SessionPhase::Authenticated);
    }

    #[test]
    fn reset_keeps_attempt_timestamp() {
        let mut state = SessionState::new();
        state.csrf_token = Some("t".into());
        state.authenticated = true;
        state.last_login_attempt_at = Some(Utc::now());
        state.reset();
        assert!(!state.authenticated);
        assert!(state.csrf_token.is_none());
        assert!(state.last_login_attempt_at.is_some());
    }
}
