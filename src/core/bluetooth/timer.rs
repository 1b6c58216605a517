//! Periodic scan restart timer.
//! Some platform scanners go stale or suppress repeated advertisements after a
//! while; restarting discovery on a fixed interval works around that.

use std::time::Duration;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::events::EventSender;

pub trait RescanTimer: Send {
    /// Arms a recurring tick every `interval`. Each tick carries `generation`.
    fn arm(&mut self, interval: Duration, generation: u64);
    fn cancel(&mut self);
}

/// Tick source backed by a tokio task that posts into the session queue.
pub struct TokioRescanTimer {
    events: EventSender,
    cancel_token: Option<CancellationToken>,
}

impl TokioRescanTimer {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            cancel_token: None,
        }
    }
}

impl RescanTimer for TokioRescanTimer {
    fn arm(&mut self, interval: Duration, generation: u64) {
        self.cancel();
        if interval.is_zero() {
            warn!("Refusing to arm the rescan timer with a zero interval");
            return;
        }

        let cancel_token = CancellationToken::new();
        let cancel_token_for_task = cancel_token.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick of a tokio interval completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("Rescan tick (generation {})", generation);
                        if !events.rescan_tick(generation) {
                            break;
                        }
                    }
                    _ = cancel_token_for_task.cancelled() => {
                        break;
                    }
                }
            }
        });

        self.cancel_token = Some(cancel_token);
        info!("Rescan timer armed every {:?}", interval);
    }

    fn cancel(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
            debug!("Rescan timer cancelled");
        }
    }
}

impl Drop for TokioRescanTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
