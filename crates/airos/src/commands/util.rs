//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::sync::Arc;

use airos_core::DeviceSnapshot;

use super::DeviceContext;
use crate::error::CliError;

/// Run one poll cycle and return the snapshot, or the cycle's failure.
pub async fn fetch_snapshot(ctx: &DeviceContext) -> Result<Arc<DeviceSnapshot>, CliError> {
    let result = ctx.poller.refresh().await;
    if let Some(err) = CliError::from_refresh(&result, ctx.host(), &ctx.profile) {
        return Err(err);
    }
    ctx.poller.current_snapshot().ok_or_else(|| CliError::Protocol {
        message: "refresh succeeded without a snapshot".into(),
    })
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal there is nobody to ask, so `--yes` is required.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}
