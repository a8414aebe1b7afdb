//! Command dispatch: bridges CLI args -> poller -> output formatting.

pub mod config_cmd;
pub mod stations;
pub mod status;
pub mod util;
pub mod watch;

use airos_core::{DeviceConfig, Poller};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Device-bound context shared by handlers.
pub struct DeviceContext {
    pub poller: Poller,
    pub profile: String,
}

impl DeviceContext {
    pub fn host(&self) -> &str {
        &self.poller.config().host
    }
}

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    mut device: DeviceConfig,
    profile: String,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Command::Watch(ref args) = cmd {
        if let Some(secs) = args.interval {
            device.poll_interval = std::time::Duration::from_secs(secs.max(1));
        }
    }

    let ctx = DeviceContext {
        poller: Poller::new(device)?,
        profile,
    };

    let result = match cmd {
        Command::Status => status::handle(&ctx, global).await,
        Command::Stations => stations::list(&ctx, global).await,
        Command::Kick { mac } => stations::kick(&ctx, &mac, global).await,
        Command::Watch(_) => watch::handle(&ctx, global).await,
        // Config is handled before dispatch
        Command::Config(_) => unreachable!(),
    };

    ctx.poller.shutdown().await;
    result
}
