// Typed device operations on top of the session.

use reqwest::Method;
use tracing::{debug, info};
use url::Url;

use crate::auth::{Credentials, LoginEncoding};
use crate::error::Error;
use crate::mac::MacAddress;
use crate::models::DeviceSnapshot;
use crate::session::{Session, parse_json};
use crate::transport::{RequestBody, TransportConfig};

/// Full device status.
pub const STATUS_PATH: &str = "/status.cgi";

/// Station disconnect ("kick").
pub const STATION_KICK_PATH: &str = "/stakick.cgi";

/// Wireless interface stations associate with.
const WIRELESS_INTERFACE: &str = "ath0";

/// Client for one airOS 8 device.
///
/// Owns a [`Session`]; every operation logs in on demand.
pub struct AirOsClient {
    session: Session,
}

impl AirOsClient {
    pub fn new(
        credentials: Credentials,
        encoding: LoginEncoding,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            session: Session::new(credentials, encoding, transport)?,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &Url {
        self.session.base_url()
    }

    pub async fn login(&self) -> Result<(), Error> {
        self.session.login().await
    }

    pub async fn logout(&self) {
        self.session.logout().await;
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Fetch and parse `status.cgi`.
    ///
    /// Logs in first when no session exists. A rejected session is
    /// invalidated and the error returned; the next call logs in again.
    pub async fn fetch_status(&self) -> Result<DeviceSnapshot, Error> {
        let exchange = self
            .session
            .request_logged_in(Method::GET, STATUS_PATH, RequestBody::Empty)
            .await?;
        let payload = parse_json(&exchange)?;
        let snapshot = DeviceSnapshot::from_status(payload)?;
        debug!(
            device_id = snapshot.device_id(),
            stations = snapshot.station_count(),
            "status fetched"
        );
        Ok(snapshot)
    }

    /// Disconnect a station from the wireless interface.
    ///
    /// Success is judged on the status code alone; the firmware answers
    /// with an empty or non-JSON body. An expired session triggers one
    /// login and one retry.
    pub async fn disconnect_station(&self, mac: &MacAddress) -> Result<(), Error> {
        if mac.is_empty() {
            return Err(Error::DataMissing {
                field: "mac".into(),
            });
        }

        let staid = mac.to_device_format();
        let body = RequestBody::form([("staif", WIRELESS_INTERFACE), ("staid", staid.as_str())]);
        self.session
            .request_with_reauth(Method::POST, STATION_KICK_PATH, body)
            .await?;

        info!(mac = %mac, "station disconnected");
        Ok(())
    }
}
