//! Polling and caching layer between `airos-api` and consumers (CLI or
//! any embedding application).
//!
//! - **[`Poller`]**: owns one [`AirOsClient`](airos_api::AirOsClient),
//!   refreshes the device snapshot on a fixed interval with at most one
//!   cycle in flight, and publishes each [`RefreshResult`] through a watch
//!   channel and registered callbacks.
//! - **[`DeviceConfig`]**: runtime connection settings. Never touches disk;
//!   the CLI builds one from a config profile.
//! - **[`CoreError`]**: consumer-facing errors.

pub mod config;
pub mod error;
pub mod poller;
pub mod result;

pub use config::{DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, DeviceConfig};
pub use error::CoreError;
pub use poller::{Poller, SubscriptionId};
pub use result::{Availability, RefreshResult};

// Types consumers need alongside the poller.
pub use airos_api::{DeviceSnapshot, LoginEncoding, MacAddress, Station, TlsMode};
