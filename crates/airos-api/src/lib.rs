// airos-api: Async Rust client for the Ubiquiti airOS 8 management API
//
// Transport (self-signed TLS, browser-mimicking headers), the cookie + CSRF
// session state machine, and the typed device operations built on it.

pub mod auth;
pub mod client;
pub mod error;
pub mod mac;
pub mod models;
pub mod session;
pub mod transport;

pub use auth::{Credentials, LoginEncoding};
pub use client::AirOsClient;
pub use error::{Error, ErrorKind};
pub use mac::MacAddress;
pub use models::{DeviceSnapshot, Station};
pub use session::{Session, SessionPhase};
pub use transport::{Exchange, RequestBody, TlsMode, Transport, TransportConfig};
