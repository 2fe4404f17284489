//! Digest scheduler background loop.
//!
//! Spawns a tokio task that polls the local wall clock on a short tick and
//! runs a digest cycle once per day. Polling (rather than sleeping until
//! the fire time) means a process resumed from suspend notices a missed
//! fire on its next tick and applies the misfire grace rule.

use crate::config::DigestConfig;
use crate::error::Result;
use crate::scheduler::digest::{CycleOutcome, DigestEngine};
use crate::scheduler::schedule::{DailySchedule, FireDecision, grace_window};
use chrono::{NaiveDate, NaiveDateTime};
use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    /// Current local date and time.
    fn now(&self) -> NaiveDateTime;
}

/// The system's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Result of a manual trigger request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A cycle will start as soon as the loop is free.
    Queued,
    /// A cycle is already running or pending; the request was folded into it.
    Coalesced,
    /// The scheduler loop has stopped.
    Stopped,
}

/// Daily digest scheduler.
pub struct DigestScheduler {
    engine: Arc<DigestEngine>,
    schedule: DailySchedule,
    grace: chrono::Duration,
    tick: Duration,
    catch_up: bool,
    clock: Arc<dyn Clock>,
}

impl DigestScheduler {
    /// Scheduler for `engine` using the `[digest]` settings.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ScholarError::Config`] for an invalid fire time.
    pub fn new(engine: Arc<DigestEngine>, config: &DigestConfig) -> Result<Self> {
        Ok(Self {
            engine,
            schedule: DailySchedule::from_config(config)?,
            grace: grace_window(config.misfire_grace_secs),
            tick: Duration::from_secs(config.tick_secs.max(1)),
            catch_up: config.catch_up,
            clock: Arc::new(LocalClock),
        })
    }

    /// Replace the wall clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the polling interval.
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Start the background loop.
    pub fn start(self) -> SchedulerHandle {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let engine = Arc::clone(&self.engine);
        let task = tokio::spawn(self.run(trigger_rx, shutdown_rx));
        SchedulerHandle {
            trigger_tx,
            shutdown_tx,
            engine,
            task,
        }
    }

    async fn run(self, mut triggers: mpsc::Receiver<()>, mut shutdown: watch::Receiver<bool>) {
        let now = self.clock.now();
        info!(
            schedule = %self.schedule,
            next = %self.schedule.next_fire_after(now),
            "digest scheduler started"
        );

        let mut handled = self.engine.store().latest_date();
        if self.catch_up {
            handled = self.startup_catch_up(handled).await;
        }

        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("digest scheduler stopping");
                    break;
                }
                Some(()) = triggers.recv() => {
                    let date = self.clock.now().date();
                    self.run_cycle("manual", date).await;
                }
                _ = interval.tick() => {
                    self.on_tick(&mut handled).await;
                }
            }
        }
    }

    /// Run today's cycle if its fire time passed and no record carries today's date.
    async fn startup_catch_up(&self, handled: Option<NaiveDate>) -> Option<NaiveDate> {
        let now = self.clock.now();
        if !self.schedule.needs_catch_up(now, handled) {
            return handled;
        }
        info!("today's digest is missing, running catch-up");
        self.run_cycle("catch-up", now.date()).await;
        Some(now.date())
    }

    async fn on_tick(&self, handled: &mut Option<NaiveDate>) {
        match self.schedule.decide(self.clock.now(), *handled, self.grace) {
            FireDecision::Idle => {}
            FireDecision::Fire { slot, late_by } => {
                *handled = Some(slot);
                if late_by > chrono::Duration::minutes(1) {
                    info!(
                        late_secs = late_by.num_seconds(),
                        "digest fire was delayed, running within grace window"
                    );
                }
                self.run_cycle("scheduled", slot).await;
            }
            FireDecision::Missed { slot, late_by } => {
                *handled = Some(slot);
                warn!(
                    %slot,
                    late_secs = late_by.num_seconds(),
                    "digest fire missed beyond grace window, dropped"
                );
            }
        }
    }

    async fn run_cycle(&self, reason: &'static str, date: NaiveDate) {
        match self.engine.run_cycle(date).await {
            Ok(CycleOutcome::Completed(record)) => {
                info!(reason, items = record.items.len(), "digest cycle completed");
            }
            Ok(outcome) => info!(reason, outcome = outcome.label(), "digest cycle ended"),
            Err(e) => error!(reason, "digest cycle failed: {e}"),
        }
    }
}

/// Control handle for a running [`DigestScheduler`].
///
/// Dropping the handle stops the loop after any in-progress cycle.
pub struct SchedulerHandle {
    trigger_tx: mpsc::Sender<()>,
    shutdown_tx: watch::Sender<bool>,
    engine: Arc<DigestEngine>,
    task: tokio::task::JoinHandle<()>,
}

impl SchedulerHandle {
    /// Request an immediate cycle, equivalent to a timer fire.
    pub fn trigger_now(&self) -> TriggerOutcome {
        if self.engine.is_running() {
            info!("manual trigger coalesced into running digest cycle");
            return TriggerOutcome::Coalesced;
        }
        match self.trigger_tx.try_send(()) {
            Ok(()) => TriggerOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(())) => {
                info!("manual trigger coalesced into pending digest cycle");
                TriggerOutcome::Coalesced
            }
            Err(mpsc::error::TrySendError::Closed(())) => TriggerOutcome::Stopped,
        }
    }

    /// Treat every item of `signals` as a manual trigger.
    ///
    /// Returns when the stream ends or the loop has stopped.
    pub async fn drive_triggers<S>(&self, mut signals: S)
    where
        S: Stream<Item = ()> + Unpin,
    {
        while signals.next().await.is_some() {
            match self.trigger_now() {
                TriggerOutcome::Queued => info!("manual digest trigger queued"),
                TriggerOutcome::Coalesced => {}
                TriggerOutcome::Stopped => {
                    warn!("manual trigger ignored, digest scheduler stopped");
                    return;
                }
            }
        }
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            error!("digest scheduler task ended abnormally: {e}");
        }
    }
}
