//! Continuous polling handler.

use chrono::{DateTime, Utc};
use serde::Serialize;

use airos_core::{Availability, RefreshResult};

use super::DeviceContext;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

/// One line of structured `watch` output.
#[derive(Serialize)]
struct WatchEvent<'a> {
    at: DateTime<Utc>,
    availability: Availability,
    #[serde(flatten)]
    result: &'a RefreshResult,
}

/// Structured formats stream one compact JSON event per cycle.
/// Everything else gets a status line.
fn render(ctx: &DeviceContext, result: &RefreshResult, global: &GlobalOpts, color: bool) -> String {
    let availability = ctx.poller.availability();
    match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
            let event = WatchEvent {
                at: Utc::now(),
                availability,
                result,
            };
            output::render_single(
                &OutputFormat::JsonCompact,
                &event,
                |_| String::new(),
                |_| String::new(),
            )
        }
        OutputFormat::Table | OutputFormat::Plain => {
            output::refresh_line(result, availability, color)
        }
    }
}

fn config_problem(ctx: &DeviceContext, result: &RefreshResult) -> CliError {
    CliError::from_refresh(result, ctx.host(), &ctx.profile).unwrap_or_else(|| CliError::Protocol {
        message: result.to_string(),
    })
}

pub async fn handle(ctx: &DeviceContext, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let mut results = ctx.poller.subscribe();

    let first = ctx.poller.start().await;
    results.mark_unchanged();
    output::print_output(&render(ctx, &first, global, color), global.quiet);
    if first.is_config_problem() {
        return Err(config_problem(ctx, &first));
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = results.changed() => {
                if changed.is_err() {
                    break;
                }
                let Some(result) = results.borrow_and_update().clone() else {
                    continue;
                };
                output::print_output(&render(ctx, &result, global, color), global.quiet);
                if result.is_config_problem() {
                    return Err(config_problem(ctx, &result));
                }
            }
        }
    }
    Ok(())
}
