use std::io::BufRead;
use std::pin::pin;
use std::sync::Arc;
use std::thread;

use futures::future::{self, Either};
use futures_channel::oneshot;
use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::application::RuntimeConfig;
use crate::scheduler::{PeriodicScheduler, SchedulerError};
use crate::synchronization::SyncEngine;

pub struct Application;

impl Application {
    pub async fn run(app_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let app_config: RuntimeConfig = app_config.into();
        debug!("Runtime configuration: {:?}", app_config);

        let scheduler =
            PeriodicScheduler::new(app_config.interval_secs).context(ConfigurationSnafu)?;
        let engine = Arc::new(SyncEngine::new(
            app_config.source,
            app_config.replica,
            app_config.log_file,
        ));

        info!("Synchronizing every {:?}", scheduler.interval());
        println!("Press Enter to terminate program.");
        let handle = scheduler.start(engine).context(SchedulerStartSnafu)?;

        wait_for_termination().await;
        info!("Termination requested, waiting for the current run to finish");
        handle.stop().await;

        println!("Exit");
        Ok(())
    }
}

/// Resolves on a line from stdin or on Ctrl-C.
///
/// A closed stdin leaves Ctrl-C as the only way out, so the process keeps
/// mirroring when started without a terminal.
async fn wait_for_termination() {
    let key_press = pin!(wait_for_enter());
    let ctrl_c = pin!(compio::signal::ctrl_c());

    match future::select(key_press, ctrl_c).await {
        Either::Left(_) => debug!("Enter pressed"),
        Either::Right((Ok(()), _)) => debug!("Ctrl-C received"),
        Either::Right((Err(e), key_press)) => {
            warn!("Cannot listen for Ctrl-C, only Enter terminates: {e}");
            key_press.await;
        }
    }
}

async fn wait_for_enter() {
    let (sender, receiver) = oneshot::channel();
    thread::spawn(move || {
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) => debug!("Stdin closed"),
            Ok(_) => {
                let _ = sender.send(());
            }
            Err(e) => warn!("Failed to read stdin: {e}"),
        }
    });

    if receiver.await.is_err() {
        future::pending::<()>().await;
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Invalid configuration"))]
    ConfigurationError { source: SchedulerError },
    #[snafu(display("Critical failure encountered while starting the scheduler"))]
    SchedulerStartError { source: SchedulerError },
}
