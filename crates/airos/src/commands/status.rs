//! Device status handler.

use std::time::Duration;

use airos_core::DeviceSnapshot;

use super::{DeviceContext, util};
use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

fn detail(s: &DeviceSnapshot) -> String {
    let host = &s.host;
    let mut lines = vec![
        format!("Hostname:   {}", s.hostname()),
        format!("Device ID:  {}", s.device_id()),
        format!("Model:      {}", host.devmodel.as_deref().unwrap_or("-")),
        format!("Firmware:   {}", host.fwversion.as_deref().unwrap_or("-")),
        format!("Role:       {}", host.netrole.as_deref().unwrap_or("-")),
    ];
    if let Some(uptime) = host.uptime {
        lines.push(format!(
            "Uptime:     {}",
            humantime::format_duration(Duration::from_secs(uptime))
        ));
    }
    lines.push(format!(
        "MAC:        {}",
        s.primary_mac()
            .map_or_else(|| "-".into(), |m| m.to_string())
    ));

    let w = &s.wireless;
    lines.push(format!("Mode:       {}", w.mode.as_deref().unwrap_or("-")));
    lines.push(format!("SSID:       {}", w.essid.as_deref().unwrap_or("-")));
    if let Some(freq) = w.frequency {
        lines.push(format!("Frequency:  {freq} MHz"));
    }
    lines.push(format!("Stations:   {}", s.station_count()));

    let svc = &s.services;
    lines.push(format!(
        "Services:   dhcp-client {} | dhcp-server {} | dhcpv6 {} | pppoe {}",
        on_off(svc.dhcpc),
        on_off(svc.dhcpd),
        on_off(svc.dhcp6d_stateful),
        on_off(svc.pppoe)
    ));
    let fw = &s.firewall;
    lines.push(format!(
        "Firewall:   iptables {} | ebtables {} | ip6tables {} | eb6tables {}",
        on_off(fw.iptables),
        on_off(fw.ebtables),
        on_off(fw.ip6tables),
        on_off(fw.eb6tables)
    ));
    lines.push(format!("Port fwd:   {}", on_off(s.portfw)));
    lines.join("\n")
}

pub async fn handle(ctx: &DeviceContext, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot = util::fetch_snapshot(ctx).await?;
    let out = output::render_single(&global.output, snapshot.as_ref(), detail, |s| {
        s.device_id().to_owned()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
