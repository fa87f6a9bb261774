//! The tick loop that decides when alarms ring.
//!
//! Every tick reads the clock once and looks for alarms set for that exact
//! second which haven't fired on that date yet. Matching alarms are marked as
//! fired for the date; the first of them rings if nothing else is ringing, the
//! rest are marked silently.
//!
//! ```text
//!            time matches, not fired today
//!  Idle ─────────────────────────────────────► Fired(date)
//!   ▲                                             │
//!   └──────────── next calendar date ─────────────┘
//! ```
//!
//! A second that is never observed (the process was suspended, the clock
//! jumped forward) is missed for that day; the alarm rings again the next day.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use chrono::NaiveDateTime;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use parking_lot::RwLock;

use crate::{
    alarm::AlarmId,
    clock::Clock,
    communication::NotificationChannel,
    error::Result,
    store::AlarmStore,
};

/// What a single tick decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub now: NaiveDateTime,
    /// alarms marked as fired for today, in store order
    pub fired: Vec<AlarmId>,
    /// the alarm that started ringing, if any
    pub rang: Option<AlarmId>,
}

#[derive(Debug)]
pub struct Scheduler<C> {
    store: Arc<RwLock<AlarmStore>>,
    channel: Arc<NotificationChannel>,
    clock: C,
}

impl<C: Clock> Scheduler<C> {
    pub const fn new(
        store: Arc<RwLock<AlarmStore>>,
        channel: Arc<NotificationChannel>,
        clock: C,
    ) -> Self {
        Self {
            store,
            channel,
            clock,
        }
    }

    /// Runs one evaluation against the clock.
    ///
    /// # Errors
    /// Only if the clock couldn't be read, in which case nothing changed.
    pub fn tick(&self) -> Result<TickReport> {
        let now = self.clock.now()?;
        let (date, time) = (now.date(), now.time());
        let mut report = TickReport {
            now,
            fired: Vec::new(),
            rang: None,
        };

        let mut store = self.store.write();
        for alarm in store
            .iter_mut()
            .filter(|alarm| alarm.is_due_at(time) && !alarm.fired_on(date))
        {
            alarm.last_fired = Some(date);
            report.fired.push(alarm.id);
            if report.rang.is_none() && self.channel.try_ring(alarm.id) {
                report.rang = Some(alarm.id);
            }
        }
        Ok(report)
    }
}

impl<C: Clock + 'static> Scheduler<C> {
    /// Starts ticking every `cadence` on a background thread.
    ///
    /// The cadence should be at most a second, otherwise whole seconds can go
    /// unobserved and alarms set for them are missed.
    ///
    /// # Errors
    /// If the thread couldn't be spawned.
    pub fn spawn(self, cadence: Duration) -> std::io::Result<SchedulerHandle> {
        let (shutdown, shutdown_rx) = crossbeam_channel::bounded(1);
        let thread = thread::Builder::new()
            .name("alarm-scheduler".to_string())
            .spawn(move || self.run(cadence, &shutdown_rx))?;
        Ok(SchedulerHandle {
            shutdown,
            thread: Some(thread),
        })
    }

    fn run(&self, cadence: Duration, shutdown: &Receiver<()>) {
        info!("scheduler started, ticking every {cadence:?}");
        loop {
            match self.tick() {
                Ok(report) if !report.fired.is_empty() => {
                    debug!("tick at {}: {report:?}", report.now);
                }
                Ok(_) => {}
                Err(e) => warn!("skipping tick: {e}"),
            }
            match shutdown.recv_timeout(cadence) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("scheduler stopped");
    }
}

/// Owns the background scheduler thread, stopping it on [`shutdown`](Self::shutdown) or drop.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// asks the loop to stop after its current tick and waits for it
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // a full channel means a stop request is already pending
        let _ = self.shutdown.try_send(());
        if thread.join().is_err() {
            warn!("scheduler thread panicked");
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
