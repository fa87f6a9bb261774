use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub type AlarmId = u64;

/// format used for alarm times everywhere they are shown or sent
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// represents an alarm
/// rings every day at `time`, `last_fired` keeps it from ringing twice on one date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    pub id: AlarmId,
    pub time: NaiveTime,
    pub last_fired: Option<NaiveDate>,
}

impl Alarm {
    #[must_use]
    pub const fn new(id: AlarmId, time: NaiveTime) -> Self {
        Self {
            id,
            time,
            last_fired: None,
        }
    }

    /// true if the alarm is set for the same second of the day as `at`
    /// (sub-second precision of `at` is ignored)
    #[must_use]
    pub fn is_due_at(&self, at: NaiveTime) -> bool {
        self.time.hour() == at.hour()
            && self.time.minute() == at.minute()
            && self.time.second() == at.second()
    }

    #[must_use]
    pub fn fired_on(&self, date: NaiveDate) -> bool {
        self.last_fired == Some(date)
    }
}

/// the shape an alarm takes when handed to a presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmView {
    pub id: AlarmId,
    pub time: String,
}

impl From<&Alarm> for AlarmView {
    fn from(alarm: &Alarm) -> Self {
        Self {
            id: alarm.id,
            time: format_time(alarm.time),
        }
    }
}

/// Parses a strict `HH:MM:SS` string (two digits per field, 24 hour clock).
///
/// # Errors
/// [`Error::InvalidTimeFormat`] if the string is malformed or a field is out of range.
pub fn parse_time(input: &str) -> Result<NaiveTime> {
    let invalid = || Error::InvalidTimeFormat(input.to_string());
    let mut fields = input.split(':');
    let (Some(hour), Some(minute), Some(second), None) = (
        two_digits(fields.next()),
        two_digits(fields.next()),
        two_digits(fields.next()),
        fields.next(),
    ) else {
        return Err(invalid());
    };
    NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(invalid)
}

#[must_use]
pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn two_digits(field: Option<&str>) -> Option<u32> {
    let field = field?;
    if field.len() != 2 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}
