//! Block production loop for a single local node.

use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::app::SimApp;

#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Stop after this many blocks; `None` runs until cancelled.
    pub blocks: Option<u64>,
    pub interval: Duration,
}

/// Steps `app` once per tick until `cancel` fires or the block limit is
/// reached. Returns the last completed height.
///
/// # Errors
/// Any lifecycle error. The app is halted after a module failure and the
/// loop stops there.
pub async fn run_blocks(
    app: &SimApp,
    opts: DriverOptions,
    cancel: CancellationToken,
) -> anyhow::Result<u64> {
    let mut height = app.manager().last_height().unwrap_or(0);
    let target = opts.blocks.map(|n| height.saturating_add(n));
    let mut ticker = tokio::time::interval(opts.interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!(start = height, target = ?target, "Block production started");
    loop {
        if target.is_some_and(|t| height >= t) {
            break;
        }
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!(height, "Shutdown requested, stopping block production");
                break;
            }
            _ = ticker.tick() => {}
        }

        let next = height + 1;
        let outcome = app
            .step(next)
            .with_context(|| format!("block {next} failed"))?;
        height = next;

        for update in &outcome.end.validator_updates {
            tracing::info!(height, pub_key = %update.pub_key, power = update.power, "Validator power changed");
        }
        tracing::info!(
            height,
            events = outcome.begin.events.len() + outcome.end.events.len(),
            app_hash = %outcome.app_hash,
            "Block committed"
        );
    }
    Ok(height)
}
