// Wire models for the `status.cgi` payload.
//
// Only the fields consumers rely on are typed; everything else in the
// (large, firmware-dependent) payload is ignored. Missing optional blocks
// fall back to defaults, but a payload without `host.device_id` is
// rejected outright.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::mac::MacAddress;

/// Remote mode value reported by the far end of a point-to-point link.
const PTP_AP_MODE: &str = "ap-ptp";

/// Parsed device status. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub host: Host,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    #[serde(default)]
    pub wireless: Wireless,
    #[serde(default)]
    pub services: Services,
    #[serde(default)]
    pub firewall: Firewall,
    /// Port forwarding enabled.
    #[serde(default)]
    pub portfw: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub device_id: String,
    #[serde(default)]
    pub hostname: String,
    pub devmodel: Option<String>,
    pub fwversion: Option<String>,
    pub netrole: Option<String>,
    pub uptime: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    #[serde(default)]
    pub ifname: String,
    pub hwaddr: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wireless {
    pub mode: Option<String>,
    pub essid: Option<String>,
    /// Center frequency in MHz.
    pub frequency: Option<u32>,
    #[serde(default)]
    pub sta: Vec<Station>,
}

/// A station associated with the device's radio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Hardware address exactly as the device reported it.
    pub mac: Option<String>,
    pub lastip: Option<String>,
    pub signal: Option<i32>,
    #[serde(default)]
    pub remote: Remote,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Remote {
    pub hostname: Option<String>,
    pub mode: Option<String>,
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Services {
    #[serde(default)]
    pub dhcpc: bool,
    #[serde(default)]
    pub dhcpd: bool,
    #[serde(default)]
    pub dhcp6d_stateful: bool,
    #[serde(default)]
    pub pppoe: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Firewall {
    #[serde(default)]
    pub iptables: bool,
    #[serde(default)]
    pub ebtables: bool,
    #[serde(default)]
    pub ip6tables: bool,
    #[serde(default)]
    pub eb6tables: bool,
}

impl DeviceSnapshot {
    /// Build a snapshot from a raw `status.cgi` payload.
    ///
    /// The `host` block and `host.device_id` are checked explicitly before
    /// deserializing; without them the payload cannot identify the device.
    pub fn from_status(payload: Value) -> Result<Self, Error> {
        let host = payload
            .get("host")
            .filter(|h| h.is_object())
            .ok_or_else(|| Error::protocol("status payload has no host block", None, ""))?;

        match host.get("device_id") {
            Some(Value::String(id)) if !id.is_empty() => {}
            _ => {
                return Err(Error::protocol(
                    "status payload has no host.device_id",
                    None,
                    "",
                ));
            }
        }

        serde_json::from_value(payload)
            .map_err(|e| Error::protocol(format!("malformed status payload: {e}"), None, ""))
    }

    pub fn device_id(&self) -> &str {
        &self.host.device_id
    }

    pub fn hostname(&self) -> &str {
        &self.host.hostname
    }

    pub fn stations(&self) -> &[Station] {
        &self.wireless.sta
    }

    pub fn station_count(&self) -> usize {
        self.wireless.sta.len()
    }

    /// Hardware address of `eth0`, else of the first interface that has one.
    pub fn primary_mac(&self) -> Option<MacAddress> {
        let with_mac = |i: &&Interface| i.hwaddr.as_deref().is_some_and(|m| !m.is_empty());
        self.interfaces
            .iter()
            .filter(with_mac)
            .find(|i| i.ifname == "eth0")
            .or_else(|| self.interfaces.iter().find(with_mac))
            .and_then(|i| i.hwaddr.as_deref())
            .map(MacAddress::new)
    }

    /// Major firmware version (`"v8.7.17"` → 8).
    pub fn fw_major(&self) -> Option<u32> {
        let version = self.host.fwversion.as_deref()?;
        version
            .trim_start_matches(['v', 'V'])
            .split('.')
            .next()?
            .parse()
            .ok()
    }

    /// Find a station by hardware address, ignoring formatting differences.
    ///
    /// Stations that report no address never match.
    pub fn find_station(&self, mac: &MacAddress) -> Option<&Station> {
        self.wireless
            .sta
            .iter()
            .find(|s| s.mac.as_deref().is_some_and(|m| mac.matches(m)))
    }
}

impl Station {
    /// Normalized hardware address, or `DataMissing` if the device omitted it.
    pub fn mac_address(&self) -> Result<MacAddress, Error> {
        self.mac
            .as_deref()
            .map(MacAddress::new)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| Error::DataMissing {
                field: "wireless.sta[].mac".into(),
            })
    }

    /// "Access Point/Uplink" when the remote end runs as a PtP access point.
    pub fn remote_type(&self) -> &'static str {
        if self.remote.mode.as_deref() == Some(PTP_AP_MODE) {
            "Access Point/Uplink"
        } else {
            "Station"
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn fixture() -> Value {
        json!({
            "host": {
                "device_id": "X1",
                "hostname": "bridge1",
                "devmodel": "NanoStation 5AC loco",
                "fwversion": "v8.7.17",
                "netrole": "bridge",
                "uptime": 86400
            },
            "interfaces": [
                { "ifname": "br0", "hwaddr": "00:11:22:33:44:00", "enabled": true },
                { "ifname": "eth0", "hwaddr": "00:11:22:33:44:55", "enabled": true },
                { "ifname": "ath0", "hwaddr": "00:11:22:33:44:66", "enabled": true }
            ],
            "wireless": {
                "mode": "ap-ptp",
                "essid": "link",
                "frequency": 5745,
                "sta": [
                    {
                        "mac": "AA:BB:CC:DD:EE:FF",
                        "lastip": "192.168.1.21",
                        "signal": -58,
                        "remote": { "hostname": "bridge2", "mode": "ap-ptp" }
                    },
                    {
                        "mac": "11:22:33:44:55:66",
                        "remote": { "hostname": "cpe" }
                    }
                ]
            },
            "services": { "dhcpc": false, "dhcpd": true, "dhcp6d_stateful": false, "pppoe": false, "airview": 2 },
            "firewall": { "iptables": false, "ebtables": true, "ip6tables": false, "eb6tables": false },
            "portfw": true,
            "unms": { "status": 0 }
        })
    }

    #[test]
    fn parses_fixture() {
        let snap = DeviceSnapshot::from_status(fixture()).unwrap();
        assert_eq!(snap.hostname(), "bridge1");
        assert_eq!(snap.device_id(), "X1");
        assert_eq!(snap.station_count(), 2);
        assert!(snap.services.dhcpd);
        assert!(snap.firewall.ebtables);
        assert!(snap.portfw);
        assert_eq!(snap.fw_major(), Some(8));
        assert_eq!(snap.wireless.frequency, Some(5745));
    }

    #[test]
    fn primary_mac_prefers_eth0() {
        let snap = DeviceSnapshot::from_status(fixture()).unwrap();
        assert_eq!(
            snap.primary_mac().unwrap().to_string(),
            "00:11:22:33:44:55"
        );
    }

    #[test]
    fn missing_device_id_is_a_protocol_error() {
        let mut payload = fixture();
        payload["host"].as_object_mut().unwrap().remove("device_id");
        let err = DeviceSnapshot::from_status(payload).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }), "got {err:?}");
    }

    #[test]
    fn missing_host_block_is_a_protocol_error() {
        let err = DeviceSnapshot::from_status(json!({ "wireless": { "sta": [] } })).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }), "got {err:?}");
    }

    #[test]
    fn optional_blocks_default() {
        let snap =
            DeviceSnapshot::from_status(json!({ "host": { "device_id": "X2" } })).unwrap();
        assert_eq!(snap.station_count(), 0);
        assert_eq!(snap.primary_mac(), None);
        assert_eq!(snap.fw_major(), None);
        assert!(!snap.portfw);
    }

    #[test]
    fn find_station_normalizes_addresses() {
        let snap = DeviceSnapshot::from_status(fixture()).unwrap();
        let a = snap.find_station(&MacAddress::new("AA:BB:CC:DD:EE:FF")).unwrap();
        let b = snap.find_station(&MacAddress::new("aabbccddeeff")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.remote.hostname.as_deref(), Some("bridge2"));
        assert!(snap.find_station(&MacAddress::new("de:ad:be:ef:00:00")).is_none());
    }

    #[test]
    fn station_without_mac_reports_data_missing() {
        let station: Station = serde_json::from_value(json!({ "lastip": "10.0.0.2" })).unwrap();
        let err = station.mac_address().unwrap_err();
        assert!(matches!(err, Error::DataMissing { .. }), "got {err:?}");
    }

    #[test]
    fn remote_type_from_mode() {
        let snap = DeviceSnapshot::from_status(fixture()).unwrap();
        assert_eq!(snap.stations()[0].remote_type(), "Access Point/Uplink");
        assert_eq!(snap.stations()[1].remote_type(), "Station");
    }
}
