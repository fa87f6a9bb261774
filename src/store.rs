use chrono::NaiveTime;

use crate::{
    alarm::{Alarm, AlarmId},
    error::{Error, Result},
};

/// The authoritative set of alarms.
///
/// Keeps insertion order so listings stay predictable, and hands out ids from a
/// counter that only moves forward: a deleted alarm's id is never reused.
#[derive(Debug, Default)]
pub struct AlarmStore {
    alarms: Vec<Alarm>,
    next_id: AlarmId,
    /// bumped by every add and remove
    revision: u64,
}

impl AlarmStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from persisted `(id, time)` records, keeping their order.
    ///
    /// New ids start at the saved `next_id`, and never below the highest
    /// restored id plus one (older files don't carry `next_id`).
    ///
    /// # Errors
    /// [`Error::DuplicateAlarmId`] if two records share an id.
    pub fn restore(
        records: impl IntoIterator<Item = (AlarmId, NaiveTime)>,
        next_id: Option<AlarmId>,
    ) -> Result<Self> {
        let mut store = Self::new();
        for (id, time) in records {
            if store.get(id).is_some() {
                return Err(Error::DuplicateAlarmId(id));
            }
            store.alarms.push(Alarm::new(id, time));
            store.next_id = store.next_id.max(id + 1);
        }
        store.next_id = store.next_id.max(next_id.unwrap_or_default());
        Ok(store)
    }

    pub fn add(&mut self, time: NaiveTime) -> Alarm {
        let alarm = Alarm::new(self.next_id, time);
        self.next_id += 1;
        self.revision += 1;
        self.alarms.push(alarm.clone());
        alarm
    }

    /// returns whether the alarm existed
    pub fn remove(&mut self, id: AlarmId) -> bool {
        let before = self.alarms.len();
        self.alarms.retain(|alarm| alarm.id != id);
        let removed = self.alarms.len() != before;
        if removed {
            self.revision += 1;
        }
        removed
    }

    /// the id the next `add` will hand out
    #[must_use]
    pub const fn next_id(&self) -> AlarmId {
        self.next_id
    }

    /// Counts changes to the alarm list, so an older copy can be told apart from a newer one.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn list(&self) -> &[Alarm] {
        &self.alarms
    }

    #[must_use]
    pub fn get(&self, id: AlarmId) -> Option<&Alarm> {
        self.alarms.iter().find(|alarm| alarm.id == id)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Alarm> {
        self.alarms.iter_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }
}
