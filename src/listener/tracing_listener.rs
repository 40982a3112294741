// src/listener/tracing_listener.rs

//! A listener that reports everything through `tracing`.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use tracing::{debug, info};

use super::{Eta, MachineState, ProgressSnapshot, StateListener};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl StateListener for TracingListener {
    fn set_state(&self, state: MachineState) -> Result<()> {
        info!(state = %state, "drawbot state");
        Ok(())
    }

    fn set_progress(&self, p: ProgressSnapshot) -> Result<()> {
        info!(
            percent = format_args!("{:.1}", p.percent),
            done = p.done,
            total = p.total,
            "progress"
        );
        Ok(())
    }

    fn set_estimated_time_left(&self, eta: Eta) -> Result<()> {
        match eta {
            Eta::Remaining(left) => {
                // Wall-clock end time, as seconds since the epoch.
                let end = SystemTime::now()
                    .checked_add(left)
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs());
                info!(eta_secs = left.as_secs(), end_epoch_secs = ?end, "estimated time left");
            }
            Eta::Unknown => debug!("estimated time left unknown"),
            Eta::Done => debug!("no run in progress"),
        }
        Ok(())
    }

    fn set_target_image(&self, url: Option<&str>) -> Result<()> {
        info!(url = url.unwrap_or("none"), "preview image");
        Ok(())
    }
}
