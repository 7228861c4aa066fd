//! Drives the orchestrator at a fixed, adjustable period after a warm-up.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_WARMUP: Duration = Duration::from_millis(5000);
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);
/// Shortest period the scheduler accepts; smaller values are raised to it.
pub const MIN_PERIOD: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTiming {
    /// Delay before the first tick, giving the perception models time to load.
    pub warmup: Duration,
    pub period: Duration,
}

impl Default for TickTiming {
    fn default() -> Self {
        Self {
            warmup: DEFAULT_WARMUP,
            period: DEFAULT_PERIOD,
        }
    }
}

/// Handle for changing the tick period while the scheduler runs.
#[derive(Debug, Clone)]
pub struct PeriodControl {
    tx: Arc<watch::Sender<Duration>>,
}

impl PeriodControl {
    pub fn new(period: Duration) -> Self {
        let (tx, _) = watch::channel(period.max(MIN_PERIOD));
        Self { tx: Arc::new(tx) }
    }

    fn subscribe(&self) -> watch::Receiver<Duration> {
        self.tx.subscribe()
    }

    /// Replaces the period and returns the value actually applied. The old
    /// period's pending tick is discarded; the next tick comes one new period
    /// from now.
    pub fn set(&self, period: Duration) -> Duration {
        let period = period.max(MIN_PERIOD);
        self.tx.send_replace(period);
        period
    }

    pub fn current(&self) -> Duration {
        *self.tx.borrow()
    }
}

/// Background task firing `on_tick` every period.
///
/// Each firing spawns its own task, so a slow tick never delays the timer;
/// overlap is the callee's concern (the orchestrator drops ticks while busy).
pub struct TickScheduler {
    period: PeriodControl,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TickScheduler {
    pub fn spawn<F, Fut>(timing: TickTiming, on_tick: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = PeriodControl::new(timing.period);
        let period_rx = period.subscribe();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(tick_loop(timing.warmup, period_rx, cancel.clone(), on_tick));

        tracing::info!(
            "tick scheduler started (warm-up {:?}, period {:?})",
            timing.warmup,
            period.current()
        );

        Self {
            period,
            cancel,
            handle,
        }
    }

    pub fn period(&self) -> PeriodControl {
        self.period.clone()
    }

    /// Stops the timer. Ticks already spawned run to completion.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!("tick scheduler task failed: {}", e);
        }
    }
}

async fn tick_loop<F, Fut>(
    warmup: Duration,
    mut period_rx: watch::Receiver<Duration>,
    cancel: CancellationToken,
    on_tick: F,
) where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::select! {
        _ = tokio::time::sleep(warmup) => {}
        _ = cancel.cancelled() => return,
    }

    let mut ticker = ticker(Instant::now(), *period_rx.borrow_and_update());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tokio::spawn(on_tick());
            }
            changed = period_rx.changed() => {
                if changed.is_err() {
                    // Every PeriodControl is gone, so is the scheduler handle.
                    break;
                }
                let period = *period_rx.borrow_and_update();
                ticker = ticker_after(period);
                tracing::info!("tick period set to {:?}", period);
            }
            _ = cancel.cancelled() => {
                tracing::info!("tick scheduler shutting down");
                break;
            }
        }
    }
}

fn ticker(start: Instant, period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

fn ticker_after(period: Duration) -> Interval {
    ticker(Instant::now() + period, period)
}
