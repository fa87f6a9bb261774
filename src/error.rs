use thiserror::Error;

use crate::alarm::AlarmId;

/// Errors produced by the alarm engine, its persistence and the daemon protocol.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid time `{0}`, expected HH:MM:SS")]
    InvalidTimeFormat(String),

    #[error("alarm {0} not found")]
    AlarmNotFound(AlarmId),

    #[error("alarm id {0} appears more than once")]
    DuplicateAlarmId(AlarmId),

    #[error("couldn't read the clock: {0}")]
    Clock(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("couldn't parse toml: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("couldn't serialize toml: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("couldn't find a home directory for config and data files")]
    NoConfigDir,
}

impl Error {
    /// Short stable name used when an error crosses the socket.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTimeFormat(_) => "InvalidTimeFormat",
            Self::AlarmNotFound(_) => "AlarmNotFound",
            Self::DuplicateAlarmId(_) => "DuplicateAlarmId",
            Self::Clock(_) => "Clock",
            Self::Io(_) => "Io",
            Self::TomlDe(_) | Self::TomlSer(_) => "Toml",
            Self::Protocol(_) => "Protocol",
            Self::NoConfigDir => "NoConfigDir",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
