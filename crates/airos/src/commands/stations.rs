//! Station list and disconnect handlers.

use tabled::Tabled;

use airos_core::{MacAddress, Station};

use super::{DeviceContext, util};
use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct StationRow {
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Remote")]
    remote: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Signal")]
    signal: String,
    #[tabled(rename = "Type")]
    kind: &'static str,
}

impl From<&Station> for StationRow {
    fn from(s: &Station) -> Self {
        Self {
            mac: s
                .mac_address()
                .map_or_else(|_| "-".into(), |m| m.to_string()),
            remote: s.remote.hostname.clone().unwrap_or_default(),
            ip: s.lastip.clone().unwrap_or_default(),
            signal: s
                .signal
                .map(|dbm| format!("{dbm} dBm"))
                .unwrap_or_default(),
            kind: s.remote_type(),
        }
    }
}

fn station_id(s: &Station) -> String {
    s.mac.clone().unwrap_or_default()
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(ctx: &DeviceContext, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot = util::fetch_snapshot(ctx).await?;
    let out = output::render_list(
        &global.output,
        snapshot.stations(),
        |s| StationRow::from(s),
        station_id,
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn kick(ctx: &DeviceContext, mac: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let target = MacAddress::new(mac);
    if target.is_empty() {
        return Err(CliError::Validation {
            field: "mac".into(),
            reason: "must not be empty".into(),
        });
    }

    let snapshot = util::fetch_snapshot(ctx).await?;
    let station = snapshot
        .find_station(&target)
        .ok_or_else(|| CliError::StationNotFound {
            mac: target.to_string(),
        })?;
    let name = station.remote.hostname.as_deref().unwrap_or("unnamed station");

    let prompt = format!("Disconnect {name} ({target}) from {}?", snapshot.hostname());
    if !util::confirm(&prompt, "kick", global.yes)? {
        return Ok(());
    }

    ctx.poller.disconnect_station(&target).await?;
    if !global.quiet {
        eprintln!("✓ Disconnected {name} ({target})");
    }
    Ok(())
}
