//! The operations a presentation layer drives: add, remove, list and stop.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use log::{debug, error, info};
use parking_lot::{Mutex, RwLock};

use crate::{
    alarm::{parse_time, Alarm, AlarmId, AlarmView},
    clock::Clock,
    communication::{Event, NotificationChannel, Subscription},
    config::AlarmFile,
    error::{Error, Result},
    scheduler::Scheduler,
    store::AlarmStore,
};

/// Synchronous front end over the alarm store and the notification channel.
///
/// Clones share the same alarms. When built with an [`AlarmFile`] every change
/// is written to disk after the store lock is released.
#[derive(Debug, Clone, Default)]
pub struct AlarmClock {
    store: Arc<RwLock<AlarmStore>>,
    channel: Arc<NotificationChannel>,
    saver: Option<Arc<Mutex<Saver>>>,
}

/// Serializes disk writes. Snapshots can arrive out of order from different
/// threads, so one older than what is already on disk is dropped.
#[derive(Debug)]
struct Saver {
    file: AlarmFile,
    saved_revision: u64,
}

/// a copy of the store taken under its lock
struct Snapshot {
    alarms: Vec<Alarm>,
    next_id: AlarmId,
    revision: u64,
}

impl Snapshot {
    fn of(store: &AlarmStore) -> Self {
        Self {
            alarms: store.list().to_vec(),
            next_id: store.next_id(),
            revision: store.revision(),
        }
    }
}

impl AlarmClock {
    /// an alarm clock that only lives in memory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_store(store: AlarmStore, file: Option<AlarmFile>) -> Self {
        let saved_revision = store.revision();
        Self {
            store: Arc::new(RwLock::new(store)),
            channel: Arc::new(NotificationChannel::new()),
            saver: file.map(|file| {
                Arc::new(Mutex::new(Saver {
                    file,
                    saved_revision,
                }))
            }),
        }
    }

    /// Loads the alarms saved in `file` and keeps saving changes to it.
    ///
    /// # Errors
    /// If the file exists but can't be loaded.
    pub fn open(file: AlarmFile) -> Result<Self> {
        let store = file.load()?;
        info!(
            "loaded {} alarm(s) from {}",
            store.len(),
            file.path().display()
        );
        Ok(Self::with_store(store, Some(file)))
    }

    /// a scheduler that watches this clock's alarms
    #[must_use]
    pub fn scheduler<C: Clock>(&self, clock: C) -> Scheduler<C> {
        Scheduler::new(self.store.clone(), self.channel.clone(), clock)
    }

    /// Adds an alarm for `time` (`HH:MM:SS`) and returns the alarms afterwards.
    ///
    /// # Errors
    /// [`Error::InvalidTimeFormat`] for a malformed time, nothing is added then.
    pub fn add_alarm(&self, time: &str) -> Result<Vec<AlarmView>> {
        let time = parse_time(time)?;
        let (alarm, snapshot) = {
            let mut store = self.store.write();
            let alarm = store.add(time);
            (alarm, Snapshot::of(&store))
        };
        info!("added alarm {} at {}", alarm.id, alarm.time);
        self.persist(&snapshot);
        Ok(views(&snapshot.alarms))
    }

    /// Removes an alarm, stopping it first if it is ringing, and returns the alarms afterwards.
    ///
    /// # Errors
    /// [`Error::AlarmNotFound`] if there is no such alarm, nothing changes then.
    pub fn remove_alarm(&self, id: AlarmId) -> Result<Vec<AlarmView>> {
        let snapshot = {
            let mut store = self.store.write();
            if store.get(id).is_none() {
                return Err(Error::AlarmNotFound(id));
            }
            self.channel.stop_if_ringing(id);
            store.remove(id);
            Snapshot::of(&store)
        };
        info!("removed alarm {id}");
        self.persist(&snapshot);
        Ok(views(&snapshot.alarms))
    }

    #[must_use]
    pub fn list_alarms(&self) -> Vec<AlarmView> {
        views(self.store.read().list())
    }

    /// Silences the ringing alarm, returning which one it was. A no-op when nothing rings.
    pub fn stop_alarm(&self) -> Option<AlarmId> {
        self.channel.stop()
    }

    #[must_use]
    pub fn ringing(&self) -> Option<AlarmId> {
        self.channel.ringing()
    }

    #[must_use]
    pub fn subscribe(&self) -> (Subscription, Receiver<Event>) {
        self.channel.subscribe()
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.channel.unsubscribe(subscription)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.channel.subscriber_count()
    }

    fn persist(&self, snapshot: &Snapshot) {
        let Some(saver) = &self.saver else {
            return;
        };
        let mut saver = saver.lock();
        if snapshot.revision <= saver.saved_revision {
            debug!(
                "revision {} is already on disk, skipping save",
                snapshot.revision
            );
            return;
        }
        match saver.file.save(&snapshot.alarms, snapshot.next_id) {
            Ok(()) => saver.saved_revision = snapshot.revision,
            Err(e) => error!("couldn't save alarms to {}: {e}", saver.file.path().display()),
        }
    }
}

fn views(alarms: &[Alarm]) -> Vec<AlarmView> {
    alarms.iter().map(AlarmView::from).collect()
}
