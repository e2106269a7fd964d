//! Continuous dispatch loop.
//!
//! Sleeps for the interval, runs a pass, repeats. Pass errors are logged and
//! retried on the next tick. Cancellation is honoured only while sleeping or
//! between passes; a started pass always runs to completion.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::pass::Dispatcher;

/// Time source for the loop, injectable so tests need no real timers.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by `tokio::time` (pausable in tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Totals reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub passes: u64,
    pub failed_passes: u64,
    pub accepted: u64,
}

pub async fn run_continuously(
    dispatcher: &Dispatcher,
    interval: Duration,
    clock: &dyn Clock,
    cancel: CancellationToken,
) -> LoopSummary {
    log::info!(
        "[LOOP] Continuous dispatch started (interval: {}s)",
        interval.as_secs_f64()
    );

    let mut summary = LoopSummary::default();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = clock.sleep(interval) => {}
        }

        if cancel.is_cancelled() {
            break;
        }

        summary.passes += 1;
        let started = clock.now();

        match dispatcher.run_pass().await {
            Ok(report) => {
                summary.accepted += report.accepted() as u64;
                if let Some(failure) = report.failure() {
                    summary.failed_passes += 1;
                    log::warn!(
                        "[LOOP] Pass {} stopped at #{}; retrying next tick: {}",
                        summary.passes,
                        failure.sequence,
                        failure.error().unwrap_or("unknown error")
                    );
                } else if !report.is_noop() {
                    log::info!(
                        "[LOOP] Pass {} dispatched {} transactions in {}ms",
                        summary.passes,
                        report.accepted(),
                        (clock.now() - started).as_millis()
                    );
                }
            }
            Err(e) => {
                summary.failed_passes += 1;
                log::error!("[LOOP] Pass {} error: {}", summary.passes, e);
            }
        }
    }

    log::info!(
        "[LOOP] Stopped after {} passes ({} failed, {} transactions accepted)",
        summary.passes,
        summary.failed_passes,
        summary.accepted
    );
    summary
}
