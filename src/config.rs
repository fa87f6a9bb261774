use std::{
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{NaiveTime, Timelike};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    alarm::{Alarm, AlarmId},
    error::{Error, Result},
    store::AlarmStore,
};

const APP_NAME: &str = "clock_alert";

/// slowest cadence that still observes every second
const MAX_TICK_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// how often the scheduler looks at the clock
    pub tick_interval_ms: u64,
    /// sound played while an alarm rings, nothing is played if unset
    pub sound: Option<PathBuf>,
    /// 0 to 100
    pub volume: f32,
    pub socket_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval_ms: 250,
            sound: None,
            volume: 100.0,
            socket_name: format!("{APP_NAME}.sock"),
        }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the config at `path`, falling back to defaults if there is no file yet.
    ///
    /// # Errors
    /// If the file exists but can't be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let config = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&config)?)
    }

    /// # Errors
    /// If the config dir can't be created or the file can't be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let config = toml::to_string(self)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, config)?;
        Ok(())
    }

    /// The tick cadence, clamped to `1..=1000` ms.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        let clamped = self.tick_interval_ms.clamp(1, MAX_TICK_INTERVAL_MS);
        if clamped != self.tick_interval_ms {
            warn!(
                "tick_interval_ms = {} is out of range, using {clamped}",
                self.tick_interval_ms
            );
        }
        Duration::from_millis(clamped)
    }

    /// volume as a playback gain
    #[must_use]
    pub fn gain(&self) -> f32 {
        self.volume.clamp(0.0, 100.0) / 100.0
    }

    /// # Errors
    /// [`Error::NoConfigDir`] if the platform has no home directory.
    pub fn config_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// # Errors
    /// [`Error::NoConfigDir`] if the platform has no home directory.
    pub fn alarms_path() -> Result<PathBuf> {
        Ok(project_dirs()?.data_dir().join("alarms.toml"))
    }

    #[must_use]
    pub fn is_config_present() -> bool {
        Self::config_path().is_ok_and(|path| path.exists())
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME).ok_or(Error::NoConfigDir)
}

/// An alarm as written to disk. Fired and ringing state are not persisted.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct StoredAlarm {
    pub id: AlarmId,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl From<&Alarm> for StoredAlarm {
    fn from(alarm: &Alarm) -> Self {
        Self {
            id: alarm.id,
            hour: alarm.time.hour(),
            minute: alarm.time.minute(),
            second: alarm.time.second(),
        }
    }
}

impl TryFrom<StoredAlarm> for (AlarmId, NaiveTime) {
    type Error = Error;

    fn try_from(stored: StoredAlarm) -> Result<Self> {
        NaiveTime::from_hms_opt(stored.hour, stored.minute, stored.second)
            .map(|time| (stored.id, time))
            .ok_or_else(|| {
                Error::InvalidTimeFormat(format!(
                    "{}:{}:{}",
                    stored.hour, stored.minute, stored.second
                ))
            })
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct AlarmsDocument {
    /// first id not yet handed out, so deleted ids stay retired across restarts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_id: Option<AlarmId>,
    #[serde(default)]
    alarms: Vec<StoredAlarm>,
}

/// The alarm list on disk, a TOML document of `[[alarms]]` tables in list
/// order plus the id counter.
#[derive(Debug, Clone)]
pub struct AlarmFile {
    path: PathBuf,
}

impl AlarmFile {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the saved alarms into a fresh store, empty if nothing was saved yet.
    ///
    /// # Errors
    /// If the file can't be read or parsed, or holds an invalid time or duplicate id.
    pub fn load(&self) -> Result<AlarmStore> {
        if !self.path.exists() {
            return Ok(AlarmStore::new());
        }
        let document: AlarmsDocument = toml::from_str(&std::fs::read_to_string(&self.path)?)?;
        let records = document
            .alarms
            .into_iter()
            .map(<(AlarmId, NaiveTime)>::try_from)
            .collect::<Result<Vec<_>>>()?;
        AlarmStore::restore(records, document.next_id)
    }

    /// Writes the alarms to a temporary file next to the target and renames it
    /// over the old one, so readers never see a half written list.
    ///
    /// # Errors
    /// If the data dir can't be created or the file can't be written.
    pub fn save(&self, alarms: &[Alarm], next_id: AlarmId) -> Result<()> {
        let document = AlarmsDocument {
            next_id: Some(next_id),
            alarms: alarms.iter().map(StoredAlarm::from).collect(),
        };
        let contents = toml::to_string(&document)?;
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        staged.write_all(contents.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hms(hour: u32, minute: u32, second: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, second).unwrap()
    }

    #[test]
    fn missing_config_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
    }

    #[test]
    fn config_round_trips_and_fills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            sound: Some(PathBuf::from("/usr/share/sounds/bell.ogg")),
            volume: 40.0,
            ..Config::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);

        std::fs::write(&path, "volume = 10.0\n").unwrap();
        let partial = Config::load(&path).unwrap();
        assert_eq!(partial.volume, 10.0);
        assert_eq!(partial.socket_name, "clock_alert.sock");
    }

    #[test]
    fn tick_interval_is_clamped() {
        let slow = Config {
            tick_interval_ms: 5000,
            ..Config::default()
        };
        let zero = Config {
            tick_interval_ms: 0,
            ..Config::default()
        };
        assert_eq!(slow.tick_interval(), Duration::from_secs(1));
        assert_eq!(zero.tick_interval(), Duration::from_millis(1));
    }

    #[test]
    fn alarm_file_round_trip_keeps_order_and_ids() {
        let dir = tempfile::tempdir().unwrap();
        let file = AlarmFile::new(dir.path().join("alarms.toml"));
        assert!(file.load().unwrap().is_empty());

        let mut store = AlarmStore::new();
        store.add(hms(18, 0, 0));
        let removed = store.add(hms(6, 0, 0)).id;
        store.add(hms(7, 15, 30));
        store.remove(removed);
        file.save(store.list(), store.next_id()).unwrap();

        let mut loaded = file.load().unwrap();
        let saved: Vec<_> = loaded.list().iter().map(|a| (a.id, a.time)).collect();
        assert_eq!(saved, vec![(0, hms(18, 0, 0)), (2, hms(7, 15, 30))]);
        assert!(loaded.list().iter().all(|alarm| alarm.last_fired.is_none()));
        assert_eq!(loaded.add(hms(1, 0, 0)).id, 3);
    }

    #[test]
    fn deleted_newest_id_stays_retired_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let file = AlarmFile::new(dir.path().join("alarms.toml"));

        let mut store = AlarmStore::new();
        store.add(hms(7, 0, 0));
        let newest = store.add(hms(8, 0, 0)).id;
        store.remove(newest);
        file.save(store.list(), store.next_id()).unwrap();

        let mut loaded = file.load().unwrap();
        assert_eq!(loaded.add(hms(9, 0, 0)).id, newest + 1);
    }

    #[test]
    fn save_replaces_the_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = AlarmFile::new(dir.path().join("alarms.toml"));
        let mut store = AlarmStore::new();
        for hour in 0..5 {
            store.add(hms(hour, 0, 0));
        }
        file.save(store.list(), store.next_id()).unwrap();
        let kept = store.add(hms(12, 0, 0)).id;
        for id in 0..5 {
            store.remove(id);
        }
        file.save(store.list(), store.next_id()).unwrap();

        let loaded = file.load().unwrap();
        let ids: Vec<_> = loaded.list().iter().map(|alarm| alarm.id).collect();
        assert_eq!(ids, vec![kept]);
        // only the alarm file is left behind, no staging files
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn alarm_file_uses_plain_fields() {
        let dir = tempfile::tempdir().unwrap();
        let file = AlarmFile::new(dir.path().join("alarms.toml"));
        std::fs::write(
            file.path(),
            "[[alarms]]\nid = 9\nhour = 23\nminute = 59\nsecond = 59\n",
        )
        .unwrap();
        let store = file.load().unwrap();
        assert_eq!(store.get(9).unwrap().time, hms(23, 59, 59));
    }

    #[test]
    fn alarm_file_rejects_out_of_range_times() {
        let dir = tempfile::tempdir().unwrap();
        let file = AlarmFile::new(dir.path().join("alarms.toml"));
        std::fs::write(
            file.path(),
            "[[alarms]]\nid = 1\nhour = 24\nminute = 0\nsecond = 0\n",
        )
        .unwrap();
        assert!(matches!(file.load(), Err(Error::InvalidTimeFormat(_))));
    }
}
