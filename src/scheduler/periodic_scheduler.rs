use std::num::NonZeroUsize;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use compio::dispatcher::{Dispatcher, DispatcherBuilder};
use compio::runtime::spawn;
use futures::future::{self, Either};
use futures_channel::oneshot;
use snafu::{ResultExt, Snafu, ensure};
use tracing::{debug, error, info, warn};

use crate::synchronization::SyncEngine;

/// Smallest accepted interval between runs, in seconds.
pub const MIN_INTERVAL_SECS: u64 = 1;

/// Starts a synchronization run at a fixed cadence.
///
/// Runs execute one at a time on a dedicated worker thread, so a slow run
/// delays the next tick instead of overlapping with it.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicScheduler {
    interval: Duration,
}

impl PeriodicScheduler {
    pub fn new(interval_secs: u64) -> Result<Self, SchedulerError> {
        ensure!(
            interval_secs >= MIN_INTERVAL_SECS,
            InvalidIntervalSnafu { interval_secs }
        );
        Ok(Self {
            interval: Duration::from_secs(interval_secs),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs the engine immediately, then on every tick until stopped.
    pub fn start(&self, engine: Arc<SyncEngine>) -> Result<SchedulerHandle, SchedulerError> {
        let dispatcher = DispatcherBuilder::new()
            .worker_threads(NonZeroUsize::MIN)
            .build()
            .context(DispatcherSnafu)?;
        let (stop_sender, stop_receiver) = oneshot::channel();
        let (done_sender, done_receiver) = oneshot::channel();
        let interval = self.interval;

        debug!("Starting scheduler with a {:?} interval", interval);
        spawn(async move {
            tick_loop(dispatcher, engine, interval, stop_receiver).await;
            if done_sender.send(()).is_err() {
                debug!("Scheduler stopped with nobody waiting for it");
            }
        })
        .detach();

        Ok(SchedulerHandle {
            stop_sender,
            done_receiver,
        })
    }
}

/// Handle to a started scheduler.
pub struct SchedulerHandle {
    stop_sender: oneshot::Sender<()>,
    done_receiver: oneshot::Receiver<()>,
}

impl SchedulerHandle {
    /// Prevents further runs and waits for the in-flight run, if any.
    pub async fn stop(self) {
        if self.stop_sender.send(()).is_err() {
            debug!("Scheduler loop already gone");
        }
        if self.done_receiver.await.is_err() {
            warn!("Scheduler loop ended without reporting completion");
        }
        info!("Scheduler stopped");
    }
}

async fn tick_loop(
    dispatcher: Dispatcher,
    engine: Arc<SyncEngine>,
    interval: Duration,
    mut stop_receiver: oneshot::Receiver<()>,
) {
    let mut deadline = Instant::now();
    loop {
        run_once(&dispatcher, &engine).await;

        deadline = next_deadline(deadline, interval, Instant::now());
        let sleep = pin!(compio::time::sleep_until(deadline));
        match future::select(sleep, &mut stop_receiver).await {
            Either::Left(_) => continue,
            Either::Right(_) => break,
        }
    }
}

/// Dispatches one run and waits for it. Nothing it reports stops the loop.
async fn run_once(dispatcher: &Dispatcher, engine: &Arc<SyncEngine>) {
    let engine = Arc::clone(engine);
    let receiver = match dispatcher.dispatch(move || async move { engine.run() }) {
        Ok(receiver) => receiver,
        Err(e) => {
            error!("Failed to dispatch synchronization run: {e}");
            return;
        }
    };

    match receiver.await {
        Ok(Ok(summary)) if summary.is_clean() => debug!("Replica already up to date"),
        Ok(Ok(summary)) => info!("Synchronization run completed: {summary}"),
        Ok(Err(e)) => error!("Synchronization run aborted: {e}"),
        Err(e) => error!("Synchronization run was cancelled: {e}"),
    }
}

/// First tick after `previous` that is still in the future.
///
/// Ticks missed while a run was in progress are dropped rather than fired
/// back to back.
fn next_deadline(previous: Instant, interval: Duration, now: Instant) -> Instant {
    let next = previous + interval;
    if next > now {
        return next;
    }
    let behind = now.duration_since(previous).as_nanos();
    let skipped = behind / interval.as_nanos() + 1;
    previous + interval * u32::try_from(skipped).unwrap_or(u32::MAX)
}

#[derive(Debug, Snafu)]
pub enum SchedulerError {
    #[snafu(display(
        "Interval cannot be less than {} second, got {}",
        MIN_INTERVAL_SECS,
        interval_secs
    ))]
    InvalidInterval { interval_secs: u64 },
    #[snafu(display("Failed to create the synchronization worker"))]
    DispatcherError { source: std::io::Error },
}
