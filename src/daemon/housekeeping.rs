//! Housekeeping role: periodic maintenance interleaved with control polling.
//!
//! # Responsibilities
//! - Run one maintenance pass per configured interval
//! - Poll the control channel in bounded slices between passes
//! - React to forwarded commands: reload on `'h'`, exit on `'t'`
//!
//! # Design Decisions
//! - A failed maintenance pass is logged and the loop continues; only a
//!   terminate command ends the process
//! - A broken control channel is logged once; the loop then runs on its
//!   timer alone and the supervisor owns termination

use std::io;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::time::Instant;

use crate::daemon::control::{ControlMessage, ControlPoll, ControlReceiver};
use crate::protocol::handler::HandlerError;

/// The maintenance work the housekeeping role performs between polls.
///
/// The maintenance algorithm itself (reference counting, quota enforcement,
/// file-set repair) lives behind this seam.
pub trait MaintenanceTask {
    /// Run one maintenance pass.
    fn run_pass(&mut self) -> impl std::future::Future<Output = Result<(), HandlerError>>;

    /// React to a forwarded reload command.
    fn reload(&mut self);
}

/// The housekeeping role's main loop.
pub struct HousekeepingLoop<R, M> {
    control: ControlReceiver<R>,
    task: M,
    interval: Duration,
    poll: Duration,
}

impl<R: AsyncRead + Unpin, M: MaintenanceTask> HousekeepingLoop<R, M> {
    pub fn new(control: ControlReceiver<R>, task: M, interval: Duration, poll: Duration) -> Self {
        Self {
            control,
            task,
            interval,
            poll,
        }
    }

    /// Run passes and poll the control channel until told to terminate.
    pub async fn run(mut self) -> io::Result<()> {
        let mut channel_lost = false;
        loop {
            if let Err(e) = self.task.run_pass().await {
                tracing::warn!(error = %e, "Maintenance pass failed");
            }

            let next_pass = Instant::now() + self.interval;
            while Instant::now() < next_pass {
                let remaining = next_pass.saturating_duration_since(Instant::now());
                let wait = self.poll.min(remaining);
                match self.control.poll_next(wait).await? {
                    ControlPoll::Message(ControlMessage::Reload) => {
                        tracing::info!("Reload requested over control channel");
                        self.task.reload();
                    }
                    ControlPoll::Message(ControlMessage::Terminate) => {
                        tracing::info!("Terminate requested over control channel");
                        return Ok(());
                    }
                    ControlPoll::Empty => {}
                    ControlPoll::Closed => {
                        if !channel_lost {
                            tracing::warn!(
                                "Control channel closed; housekeeping continues on timer only"
                            );
                            channel_lost = true;
                        }
                    }
                }
            }
        }
    }
}

/// Maintenance pass wired into the daemon binary.
///
/// Walks the account store and reports accounts whose storage root has gone
/// missing. The full maintenance algorithm plugs in behind
/// [`MaintenanceTask`].
pub struct AccountSweep {
    config_path: std::path::PathBuf,
    config: crate::config::StoreConfig,
}

impl AccountSweep {
    pub fn new(config_path: std::path::PathBuf, config: crate::config::StoreConfig) -> Self {
        Self {
            config_path,
            config,
        }
    }
}

impl MaintenanceTask for AccountSweep {
    async fn run_pass(&mut self) -> Result<(), HandlerError> {
        let store = crate::accounts::TomlAccountStore::load(&self.config.accounts.file)?;
        let mut missing = 0usize;
        for (id, root) in store.iter() {
            if !root.path.is_dir() {
                tracing::warn!(account = %id, root = %root.path.display(), "Account root missing");
                missing += 1;
            }
        }
        tracing::info!(
            accounts = store.len(),
            missing_roots = missing,
            "Maintenance pass complete"
        );
        Ok(())
    }

    fn reload(&mut self) {
        match crate::config::load_config(&self.config_path) {
            Ok(config) => {
                tracing::info!("Housekeeping configuration reloaded");
                self.config = config;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config; keeping current configuration");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::control::ControlSender;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default, Clone)]
    struct CountingTask {
        passes: Arc<AtomicUsize>,
        reloads: Arc<AtomicUsize>,
    }

    impl MaintenanceTask for CountingTask {
        async fn run_pass(&mut self) -> Result<(), HandlerError> {
            self.passes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn reload(&mut self) {
            self.reloads.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn quick_loop<R: AsyncRead + Unpin>(
        control: ControlReceiver<R>,
        task: CountingTask,
    ) -> HousekeepingLoop<R, CountingTask> {
        HousekeepingLoop::new(
            control,
            task,
            Duration::from_millis(50),
            Duration::from_millis(5),
        )
    }

    #[tokio::test]
    async fn reload_then_terminate() {
        let (client, server) = tokio::io::duplex(8);
        let mut sender = ControlSender::new(client);
        let task = CountingTask::default();
        let (passes, reloads) = (task.passes.clone(), task.reloads.clone());

        sender.send(ControlMessage::Reload).await.unwrap();
        sender.send(ControlMessage::Terminate).await.unwrap();

        quick_loop(ControlReceiver::new(server), task)
            .run()
            .await
            .unwrap();

        assert_eq!(reloads.load(Ordering::SeqCst), 1);
        assert!(passes.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn terminate_without_reload() {
        let (client, server) = tokio::io::duplex(8);
        let mut sender = ControlSender::new(client);
        let task = CountingTask::default();
        let reloads = task.reloads.clone();

        sender.send(ControlMessage::Terminate).await.unwrap();

        quick_loop(ControlReceiver::new(server), task)
            .run()
            .await
            .unwrap();

        assert_eq!(reloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn silence_keeps_looping() {
        let (client, server) = tokio::io::duplex(8);
        let task = CountingTask::default();
        let (passes, reloads) = (task.passes.clone(), task.reloads.clone());

        let run = tokio::spawn(quick_loop(ControlReceiver::new(server), task).run());

        // Let several intervals elapse with no control traffic.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(passes.load(Ordering::SeqCst) >= 2);
        assert_eq!(reloads.load(Ordering::SeqCst), 0);
        assert!(!run.is_finished());

        let mut sender = ControlSender::new(client);
        sender.send(ControlMessage::Terminate).await.unwrap();
        run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn broken_channel_keeps_timer_running() {
        let (client, server) = tokio::io::duplex(8);
        drop(client);
        let task = CountingTask::default();
        let passes = task.passes.clone();

        let run = tokio::spawn(quick_loop(ControlReceiver::new(server), task).run());
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(passes.load(Ordering::SeqCst) >= 2);
        assert!(!run.is_finished());
        run.abort();
    }
}
